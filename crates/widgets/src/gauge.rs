use serde::Serialize;
use std::fmt;
use twin_config::MetricConfig;
use twin_core::Metrics;

/// One dial on a view: which metric it shows and on what scale.
#[derive(Debug, Clone, PartialEq)]
pub struct Gauge {
    pub metric: String,
    pub title: String,
    pub unit: String,
    /// Full-scale value.
    pub max: f64,
}

impl Gauge {
    pub fn from_config(config: &MetricConfig) -> Self {
        Self {
            metric: config.name.clone(),
            title: config.display_label(),
            unit: config.unit.clone(),
            max: config.max,
        }
    }

    /// Current reading taken from a buffer snapshot.
    pub fn reading(&self, snapshot: &Metrics) -> GaugeReading {
        let value = snapshot.get(&self.metric).unwrap_or(0.0);
        GaugeReading {
            title: self.title.clone(),
            value,
            display: format_value(value),
            unit: self.unit.clone(),
            fraction: fraction(value, self.max),
        }
    }
}

/// What a renderer needs to draw one gauge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaugeReading {
    pub title: String,
    pub value: f64,
    /// Value with two decimals, as printed under the dial.
    pub display: String,
    pub unit: String,
    /// Needle position in `[0, 1]`.
    pub fraction: f64,
}

impl fmt::Display for GaugeReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit.is_empty() {
            write!(f, "{}: {}", self.title, self.display)
        } else {
            write!(f, "{}: {} {}", self.title, self.display, self.unit)
        }
    }
}

pub fn format_value(value: f64) -> String {
    format!("{value:.2}")
}

/// `value / max`, clamped to the dial. A non-positive scale pins the needle at zero.
pub fn fraction(value: f64, max: f64) -> f64 {
    if !max.is_finite() || max <= 0.0 {
        return 0.0;
    }
    (value / max).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use twin_core::{MetricSet, RawSample};

    fn torque() -> Gauge {
        Gauge::from_config(&MetricConfig::new("torque", "Nm", 100.0))
    }

    #[test]
    fn reading_from_snapshot() {
        let set = MetricSet::new(["torque"]);
        let raw = RawSample::new("t").with_field("Torque", "42.456");
        let snapshot = Metrics::normalize(&set, &raw);
        let reading = torque().reading(&snapshot);

        assert_eq!(reading.title, "Torque");
        assert_eq!(reading.display, "42.46");
        assert!((reading.fraction - 0.42456).abs() < 1e-9);
        assert_eq!(reading.to_string(), "Torque: 42.46 Nm");
    }

    #[test]
    fn zeroed_snapshot_reads_zero() {
        let reading = torque().reading(&Metrics::zeroed(&MetricSet::new(["torque"])));
        assert_eq!(reading.display, "0.00");
        assert_eq!(reading.fraction, 0.0);
    }

    #[test]
    fn fraction_is_clamped() {
        assert_eq!(fraction(500.0, 100.0), 1.0);
        assert_eq!(fraction(-3.0, 100.0), 0.0);
        assert_eq!(fraction(5.0, 0.0), 0.0);
        assert_eq!(fraction(5.0, f64::NAN), 0.0);
    }

    #[test]
    fn unitless_gauge_display() {
        let gauge = Gauge::from_config(&MetricConfig::new("position", "", 360.0));
        let snapshot = Metrics::normalize(
            &MetricSet::new(["position"]),
            &RawSample::new("t").with_field("position", 90),
        );
        let reading = gauge.reading(&snapshot);
        assert_eq!(reading.to_string(), "Position: 90.00");
        assert_eq!(reading.fraction, 0.25);
    }
}
