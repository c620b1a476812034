use serde::Serialize;
use twin_core::History;

/// Series for the "plot this metric over time" chart: one category label
/// per sample, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineChart {
    pub title: String,
    pub metric: String,
    pub categories: Vec<String>,
    pub data: Vec<f64>,
}

impl LineChart {
    pub fn from_history(history: &History) -> Self {
        let (categories, data) = history
            .iter()
            .map(|(timestamp, value)| (timestamp.to_string(), value))
            .unzip();
        Self {
            title: format!("Log Data for {}", history.metric()),
            metric: history.metric().to_string(),
            categories,
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// `(min, max)` of the plotted values, for axis scaling.
    pub fn range(&self) -> Option<(f64, f64)> {
        self.data.iter().copied().fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    /// One-line text form used in logs.
    pub fn summary(&self) -> String {
        match (self.range(), self.data.last(), self.categories.last()) {
            (Some((lo, hi)), Some(last), Some(at)) => format!(
                "{}: {} points, min {lo:.2}, max {hi:.2}, last {last:.2} @ {at}",
                self.title,
                self.len()
            ),
            _ => format!("{}: no data yet", self.title),
        }
    }
}
