use crate::error::{Result, TwinError};
use crate::sample::{MetricSet, Metrics, RawSample, Timestamp};
use std::collections::VecDeque;
use std::iter::FusedIterator;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Slots kept per view unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 50;

/// One accepted sample, stored verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub timestamp: Timestamp,
    pub metrics: Metrics,
}

/// Fixed-capacity, arrival-ordered history of normalized samples.
///
/// When full, the oldest entry by *arrival* is evicted before a new one is
/// appended. Timestamps are never compared, so out-of-order or duplicate
/// labels from the feed cannot disturb eviction.
#[derive(Debug)]
pub struct RollingTelemetryBuffer {
    capacity: usize,
    metrics: MetricSet,
    entries: VecDeque<Arc<HistoryEntry>>,
    zero: Metrics,
}

impl RollingTelemetryBuffer {
    /// Create an empty buffer tracking `metrics`.
    pub fn new(capacity: usize, metrics: MetricSet) -> Result<Self> {
        if capacity == 0 {
            return Err(TwinError::InvalidCapacity { capacity });
        }
        Ok(Self {
            capacity,
            zero: Metrics::zeroed(&metrics),
            metrics,
            entries: VecDeque::with_capacity(capacity),
        })
    }

    pub fn with_default_capacity(metrics: MetricSet) -> Result<Self> {
        Self::new(DEFAULT_CAPACITY, metrics)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn metrics(&self) -> &MetricSet {
        &self.metrics
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Normalize `raw` and append it, evicting the oldest entry if full.
    ///
    /// Never fails: malformed values degrade to `0.0`.
    pub fn ingest(&mut self, raw: &RawSample) {
        let entry = HistoryEntry {
            timestamp: raw.timestamp.clone(),
            metrics: Metrics::normalize(&self.metrics, raw),
        };
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(Arc::new(entry));
    }

    /// Values of the most recent sample, or all zeros before the first one.
    pub fn snapshot(&self) -> &Metrics {
        self.entries
            .back()
            .map_or(&self.zero, |entry| &entry.metrics)
    }

    /// Ordered `(timestamp, value)` history of `metric` as of this call.
    pub fn history(&self, metric: &str) -> Result<History> {
        let index = self
            .metrics
            .index_of(metric)
            .ok_or_else(|| TwinError::UnknownMetric(metric.to_string()))?;
        Ok(History {
            metric: metric.to_string(),
            index,
            entries: self.entries.iter().cloned().collect(),
        })
    }

    /// Stored entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> + '_ {
        self.entries.iter().map(Arc::as_ref)
    }
}

/// Frozen view of one metric's history.
///
/// Holds shared references to the entries that were present when it was
/// taken; later ingests never change it. Iterate as often as needed.
#[derive(Debug, Clone)]
pub struct History {
    metric: String,
    index: usize,
    entries: Arc<[Arc<HistoryEntry>]>,
}

impl History {
    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> HistoryIter<'_> {
        HistoryIter {
            index: self.index,
            inner: self.entries.iter(),
        }
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.iter().map(|(_, v)| v)
    }

    pub fn timestamps(&self) -> impl Iterator<Item = &Timestamp> + '_ {
        self.iter().map(|(ts, _)| ts)
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = (&'a Timestamp, f64);
    type IntoIter = HistoryIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct HistoryIter<'a> {
    index: usize,
    inner: std::slice::Iter<'a, Arc<HistoryEntry>>,
}

impl<'a> Iterator for HistoryIter<'a> {
    type Item = (&'a Timestamp, f64);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|entry| (&entry.timestamp, entry.metrics.value_at(self.index)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for HistoryIter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner
            .next_back()
            .map(|entry| (&entry.timestamp, entry.metrics.value_at(self.index)))
    }
}

impl ExactSizeIterator for HistoryIter<'_> {}
impl FusedIterator for HistoryIter<'_> {}

/// A buffer behind a single lock, for when ingestion and reads may run on
/// different threads. Every operation takes the lock once and never holds it
/// across an await point.
#[derive(Debug, Clone)]
pub struct SharedBuffer {
    inner: Arc<Mutex<RollingTelemetryBuffer>>,
}

impl SharedBuffer {
    pub fn new(buffer: RollingTelemetryBuffer) -> Self {
        Self {
            inner: Arc::new(Mutex::new(buffer)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RollingTelemetryBuffer> {
        // No operation can leave the buffer half-updated, so a poisoned lock
        // still guards a consistent value.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn ingest(&self, raw: &RawSample) {
        self.lock().ingest(raw);
    }

    pub fn snapshot(&self) -> Metrics {
        self.lock().snapshot().clone()
    }

    pub fn history(&self, metric: &str) -> Result<History> {
        self.lock().history(metric)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    pub fn metrics(&self) -> MetricSet {
        self.lock().metrics().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn buffer(capacity: usize, names: &[&str]) -> RollingTelemetryBuffer {
        RollingTelemetryBuffer::new(capacity, MetricSet::new(names.iter().copied())).unwrap()
    }

    fn sample(ts: u64, x: f64) -> RawSample {
        RawSample::new(ts).with_field("x", x)
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = RollingTelemetryBuffer::new(0, MetricSet::new(["x"])).unwrap_err();
        assert!(matches!(err, TwinError::InvalidCapacity { capacity: 0 }));
    }

    #[test]
    fn capacity_never_exceeded() {
        let mut buf = buffer(4, &["x"]);
        for i in 0..20 {
            buf.ingest(&sample(i, i as f64));
            assert!(buf.len() <= buf.capacity());
        }
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn fifo_eviction_keeps_last_capacity_in_order() {
        let mut buf = buffer(5, &["x"]);
        for i in 0..8 {
            buf.ingest(&sample(i, i as f64 * 10.0));
        }
        let history = buf.history("x").unwrap();
        let values: Vec<f64> = history.values().collect();
        assert_eq!(values, [30.0, 40.0, 50.0, 60.0, 70.0]);
        let stamps: Vec<String> = history.timestamps().map(ToString::to_string).collect();
        assert_eq!(stamps, ["3", "4", "5", "6", "7"]);
    }

    #[test]
    fn eviction_ignores_timestamp_order() {
        let mut buf = buffer(2, &["x"]);
        buf.ingest(&RawSample::new("10:00:05").with_field("x", 1));
        buf.ingest(&RawSample::new("10:00:01").with_field("x", 2));
        buf.ingest(&RawSample::new("10:00:01").with_field("x", 3));

        let history = buf.history("x").unwrap();
        let pairs: Vec<(String, f64)> = history.iter().map(|(t, v)| (t.to_string(), v)).collect();
        assert_eq!(
            pairs,
            [("10:00:01".to_string(), 2.0), ("10:00:01".to_string(), 3.0)]
        );
    }

    #[test]
    fn snapshot_tracks_latest_ingest() {
        let mut buf = buffer(3, &["current", "torque"]);
        let raw = RawSample::new("t").with_field("current", "7.5").with_field("torque", 2);
        buf.ingest(&raw);
        assert_eq!(buf.snapshot(), &Metrics::normalize(buf.metrics(), &raw));
        assert_eq!(buf.entries().last().map(|e| &e.metrics), Some(buf.snapshot()));
    }

    #[test]
    fn empty_buffer_defaults() {
        let buf = RollingTelemetryBuffer::with_default_capacity(MetricSet::new([
            "current", "torque", "speed",
        ]))
        .unwrap();
        assert_eq!(buf.capacity(), DEFAULT_CAPACITY);
        assert!(buf.snapshot().iter().all(|(_, v)| v == 0.0));
        assert_eq!(buf.snapshot().to_map().len(), 3);
        assert!(buf.history("torque").unwrap().is_empty());
    }

    #[test]
    fn unknown_metric_is_rejected_without_side_effects() {
        let mut buf = buffer(3, &["x"]);
        buf.ingest(&sample(1, 1.0));
        let err = buf.history("doesNotExist").unwrap_err();
        assert!(matches!(err, TwinError::UnknownMetric(ref m) if m == "doesNotExist"));
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.snapshot().get("x"), Some(1.0));
    }

    #[test]
    fn history_is_isolated_from_later_ingests() {
        let mut buf = buffer(2, &["x"]);
        buf.ingest(&sample(1, 1.0));
        buf.ingest(&sample(2, 2.0));
        let history = buf.history("x").unwrap();

        buf.ingest(&sample(3, 3.0));
        buf.ingest(&sample(4, 4.0));

        assert_eq!(history.len(), 2);
        assert_eq!(history.values().collect::<Vec<_>>(), [1.0, 2.0]);
        // restartable
        assert_eq!(history.iter().count(), 2);
        assert_eq!(history.iter().next_back().map(|(_, v)| v), Some(2.0));
    }

    #[test]
    fn end_to_end_capacity_three() {
        let mut buf = buffer(3, &["x"]);
        for (ts, x) in [("t1", 1), ("t2", 2), ("t3", 3), ("t4", 4)] {
            buf.ingest(&RawSample::new(ts).with_field("x", x));
        }
        let history = buf.history("x").unwrap();
        let pairs: Vec<(String, f64)> = (&history)
            .into_iter()
            .map(|(t, v)| (t.to_string(), v))
            .collect();
        assert_eq!(
            pairs,
            [
                ("t2".to_string(), 2.0),
                ("t3".to_string(), 3.0),
                ("t4".to_string(), 4.0)
            ]
        );
        assert_eq!(
            buf.snapshot().to_map(),
            BTreeMap::from([("x".to_string(), 4.0)])
        );
    }

    #[test]
    fn shared_buffer_serializes_concurrent_ingest() {
        let shared = SharedBuffer::new(buffer(10, &["x"]));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        shared.ingest(&sample(t * 100 + i, i as f64));
                        assert!(shared.len() <= 10);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(shared.len(), 10);
        assert_eq!(shared.history("x").unwrap().len(), 10);
    }

    #[tokio::test]
    async fn shared_buffer_history_taken_before_background_ingest_is_frozen() {
        let shared = SharedBuffer::new(buffer(3, &["x"]));
        shared.ingest(&sample(0, 0.5));
        let before = shared.history("x").unwrap();

        let writer = shared.clone();
        tokio::spawn(async move {
            for i in 1..=5 {
                writer.ingest(&sample(i, i as f64));
            }
        })
        .await
        .unwrap();

        assert_eq!(before.values().collect::<Vec<_>>(), [0.5]);
        assert_eq!(shared.snapshot().get("x"), Some(5.0));
    }
}
