use chrono::Local;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::sync::Arc;

/// Label format used when a feed delivers no timestamp of its own
/// (local time of day, e.g. `"14:03:27"`).
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%H:%M:%S";

/// Label attached to a sample by the feed or by the caller at capture time.
///
/// Labels are carried verbatim. They are neither required to be unique nor
/// used for ordering: the buffer orders strictly by arrival.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    /// Numeric tick supplied by the source.
    Tick(u64),
    /// Wall-clock (or any other) string label.
    Label(String),
}

impl Timestamp {
    /// Capture-time label in local time, formatted with a chrono `strftime`
    /// pattern. Falls back to [`DEFAULT_TIMESTAMP_FORMAT`] if `format` is invalid.
    pub fn now(format: &str) -> Self {
        let now = Local::now();
        let mut label = String::new();
        if write!(label, "{}", now.format(format)).is_err() {
            label.clear();
            let _ = write!(label, "{}", now.format(DEFAULT_TIMESTAMP_FORMAT));
        }
        Self::Label(label)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tick(tick) => write!(f, "{tick}"),
            Self::Label(label) => f.write_str(label),
        }
    }
}

impl From<u64> for Timestamp {
    fn from(tick: u64) -> Self {
        Self::Tick(tick)
    }
}

impl From<&str> for Timestamp {
    fn from(label: &str) -> Self {
        Self::Label(label.to_string())
    }
}

impl From<String> for Timestamp {
    fn from(label: String) -> Self {
        Self::Label(label)
    }
}

/// One undecoded delivery from the live feed: a label plus whatever fields
/// the source sent, values still in their wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub timestamp: Timestamp,
    pub fields: Map<String, Value>,
}

impl RawSample {
    pub fn new(timestamp: impl Into<Timestamp>) -> Self {
        Self {
            timestamp: timestamp.into(),
            fields: Map::new(),
        }
    }

    pub fn from_fields(timestamp: impl Into<Timestamp>, fields: Map<String, Value>) -> Self {
        Self {
            timestamp: timestamp.into(),
            fields,
        }
    }

    /// Builder-style field insertion, mostly handy in tests.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Look up the raw value for metric `name`.
    ///
    /// An exact key match wins; otherwise the first key equal to `name`
    /// ignoring ASCII case is used (feeds disagree on `Current` vs `current`).
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).or_else(|| {
            self.fields
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value)
        })
    }
}

/// Coerce a raw wire value to a finite `f64`, degrading to `0.0`.
///
/// Numbers pass through. Strings are read from their longest leading
/// decimal prefix (`"12.5 A"` → `12.5`). Anything else, including NaN and
/// infinities, becomes `0.0`.
pub fn coerce(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => parse_leading_float(s),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn parse_leading_float(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_digits = count_digits(&bytes[end..]);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = count_digits(&bytes[end + 1..]);
        if int_digits + frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits + frac_digits == 0 {
        return None;
    }

    // Exponent only counts if at least one digit follows it.
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_digits = count_digits(&bytes[exp..]);
        if exp_digits > 0 {
            end = exp + exp_digits;
        }
    }

    s[..end].parse().ok()
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

/// The fixed, ordered set of metric names a buffer tracks.
///
/// Cheap to clone; every [`Metrics`] value produced by a buffer shares it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSet {
    names: Arc<[String]>,
}

impl MetricSet {
    /// Build a set from `names`, keeping the first occurrence of duplicates.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        Self {
            names: unique.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.names.iter().map(String::as_str)
    }
}

/// Normalized metric values: exactly one finite `f64` per known metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    set: MetricSet,
    values: Box<[f64]>,
}

impl Metrics {
    /// All-zero values over `set` (what gauges show before the first sample).
    pub fn zeroed(set: &MetricSet) -> Self {
        Self {
            set: set.clone(),
            values: vec![0.0; set.len()].into(),
        }
    }

    /// Pick every known metric out of `raw`, coercing each value.
    /// Raw fields outside `set` are ignored.
    pub fn normalize(set: &MetricSet, raw: &RawSample) -> Self {
        Self {
            set: set.clone(),
            values: set.iter().map(|name| coerce(raw.field(name))).collect(),
        }
    }

    pub fn metric_set(&self) -> &MetricSet {
        &self.set
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.set.index_of(name).map(|i| self.values[i])
    }

    pub(crate) fn value_at(&self, index: usize) -> f64 {
        self.values[index]
    }

    /// `(name, value)` pairs in metric-set order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.set.iter().zip(self.values.iter().copied())
    }

    pub fn to_map(&self) -> BTreeMap<String, f64> {
        self.iter().map(|(name, v)| (name.to_string(), v)).collect()
    }
}

impl Serialize for Metrics {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}
