//! Plain-text rendering of a frame, one line per widget.

use crate::{GaugeReading, LineChart};

const BAR_WIDTH: usize = 20;

/// Gauge needle as a text bar: `fraction` of `width` cells filled.
pub fn bar(fraction: f64, width: usize) -> String {
    let filled = (fraction.clamp(0.0, 1.0) * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

/// Gauges with their bars, titles aligned, then the chart summary if a
/// chart is shown.
pub fn render_lines(gauges: &[GaugeReading], chart: Option<&LineChart>) -> Vec<String> {
    let width = gauges
        .iter()
        .map(|g| g.title.chars().count())
        .max()
        .unwrap_or(0);

    let mut lines: Vec<String> = gauges
        .iter()
        .map(|g| {
            let line = format!(
                "{:<width$}  {} {} {}",
                g.title,
                bar(g.fraction, BAR_WIDTH),
                g.display,
                g.unit
            );
            line.trim_end().to_string()
        })
        .collect();

    if let Some(chart) = chart {
        lines.push(chart.summary());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use twin_config::MetricConfig;
    use twin_core::{MetricSet, Metrics, RawSample, RollingTelemetryBuffer};
    use crate::Gauge;

    #[test]
    fn bar_fills_proportionally() {
        assert_eq!(bar(0.0, 4), "[----]");
        assert_eq!(bar(0.5, 4), "[##--]");
        assert_eq!(bar(1.0, 4), "[####]");
        assert_eq!(bar(7.0, 4), "[####]");
        assert_eq!(bar(f64::NAN, 4).len(), 6);
    }

    #[test]
    fn gauges_align_and_chart_follows() {
        let set = MetricSet::new(["speed", "position"]);
        let sample = RawSample::new("t1").with_field("speed", 500).with_field("position", 90);
        let snapshot = Metrics::normalize(&set, &sample);
        let gauges: Vec<_> = [
            MetricConfig::new("speed", "RPM", 1000.0),
            MetricConfig::new("position", "", 360.0),
        ]
        .iter()
        .map(|m| Gauge::from_config(m).reading(&snapshot))
        .collect();

        let mut buffer = RollingTelemetryBuffer::new(2, set).unwrap();
        buffer.ingest(&sample);
        let chart = LineChart::from_history(&buffer.history("speed").unwrap());

        assert_eq!(
            render_lines(&gauges, Some(&chart)),
            [
                "Speed     [##########----------] 500.00 RPM",
                "Position  [#####---------------] 90.00",
                "Log Data for speed: 1 points, min 500.00, max 500.00, last 500.00 @ t1",
            ]
        );
    }

    #[test]
    fn nothing_to_render() {
        assert!(render_lines(&[], None).is_empty());
    }
}
