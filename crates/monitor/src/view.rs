use std::fmt;
use tracing::{debug, info, warn};
use twin_config::ViewConfig;
use twin_core::{FeedEvent, Result, RollingTelemetryBuffer, SharedBuffer, TwinError};
use twin_feed::{FeedClient, FeedSubscription};
use twin_widgets::{render_lines, Gauge, GaugeReading, LineChart};

/// A mounted view: one rolling buffer plus the feed subscription that fills it.
///
/// Both live exactly as long as the view. Dropping it closes the feed.
#[derive(Debug)]
pub struct View {
    config: ViewConfig,
    buffer: SharedBuffer,
    gauges: Vec<Gauge>,
    plot: Option<String>,
    connected: bool,
    feed: FeedSubscription,
}

impl View {
    /// Create the buffer and open the configured feed.
    pub fn mount(config: &ViewConfig, timestamp_format: &str) -> Result<Self> {
        // Buffer first: a bad capacity must not leave a feed running.
        let buffer = RollingTelemetryBuffer::new(config.capacity, config.metric_set())?;
        let feed = FeedClient::new(&config.feed, timestamp_format)?.spawn();
        info!(
            "Mounted view '{}' ({} metrics, {} slots) on {}",
            config.name,
            buffer.metrics().len(),
            buffer.capacity(),
            config.feed.url
        );
        Ok(Self::assemble(config, buffer, feed))
    }

    /// Mount on an existing subscription instead of opening the configured feed.
    pub fn mount_with(config: &ViewConfig, feed: FeedSubscription) -> Result<Self> {
        let buffer = RollingTelemetryBuffer::new(config.capacity, config.metric_set())?;
        Ok(Self::assemble(config, buffer, feed))
    }

    fn assemble(
        config: &ViewConfig,
        buffer: RollingTelemetryBuffer,
        feed: FeedSubscription,
    ) -> Self {
        let mut view = Self {
            config: config.clone(),
            buffer: SharedBuffer::new(buffer),
            gauges: config.metrics.iter().map(Gauge::from_config).collect(),
            plot: None,
            connected: false,
            feed,
        };
        if let Some(metric) = &config.plot {
            if let Err(e) = view.select_plot(Some(metric.clone())) {
                warn!("View '{}': cannot plot: {e}", config.name);
            }
        }
        view
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    /// Handle for a renderer running elsewhere.
    pub fn buffer(&self) -> SharedBuffer {
        self.buffer.clone()
    }

    pub fn plot(&self) -> Option<&str> {
        self.plot.as_deref()
    }

    /// Choose which metric the history chart shows (`None` hides it).
    pub fn select_plot(&mut self, metric: Option<String>) -> Result<()> {
        if let Some(name) = &metric {
            if !self.buffer.metrics().contains(name) {
                return Err(TwinError::UnknownMetric(name.clone()));
            }
        }
        self.plot = metric;
        Ok(())
    }

    /// Next event from the feed; `None` once the feed is gone for good.
    pub async fn next_event(&mut self) -> Option<FeedEvent> {
        self.feed.recv().await
    }

    pub fn handle(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Connected => {
                self.connected = true;
                info!("View '{}': feed connected", self.name());
            }
            FeedEvent::Sample(sample) => {
                debug!("View '{}': sample @ {}", self.name(), sample.timestamp);
                self.buffer.ingest(&sample);
            }
            FeedEvent::Malformed(raw) => {
                warn!("View '{}': skipping undecodable payload: {raw}", self.name());
            }
            FeedEvent::Disconnected(reason) => {
                self.connected = false;
                warn!(
                    "View '{}': feed disconnected ({reason}); keeping last readings",
                    self.name()
                );
            }
        }
    }

    /// Read the buffer once for every gauge and, if selected, the chart.
    pub fn render(&self) -> Frame {
        let snapshot = self.buffer.snapshot();
        let chart = self
            .plot
            .as_deref()
            .and_then(|metric| match self.buffer.history(metric) {
                Ok(history) => Some(LineChart::from_history(&history)),
                Err(e) => {
                    warn!("View '{}': {e}", self.name());
                    None
                }
            });

        Frame {
            title: self.config.title.clone(),
            connected: self.connected,
            samples: self.buffer.len(),
            gauges: self.gauges.iter().map(|g| g.reading(&snapshot)).collect(),
            chart,
        }
    }
}

impl Drop for View {
    fn drop(&mut self) {
        info!("Unmounting view '{}'", self.config.name);
    }
}

/// Everything a renderer needs for one refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub title: String,
    pub connected: bool,
    /// Entries currently held in the buffer.
    pub samples: usize,
    pub gauges: Vec<GaugeReading>,
    pub chart: Option<LineChart>,
}

impl Frame {
    fn header(&self) -> String {
        let status = if self.connected { "live" } else { "offline" };
        format!("[{}] ({status}, {} samples)", self.title, self.samples)
    }

    /// Header, one line per gauge, then the chart summary.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![self.header()];
        lines.extend(render_lines(&self.gauges, self.chart.as_ref()));
        lines
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header())?;
        for gauge in &self.gauges {
            write!(f, " | {gauge}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use twin_config::MetricConfig;
    use twin_core::RawSample;

    fn config() -> ViewConfig {
        ViewConfig {
            name: "axis".into(),
            title: "Axis".into(),
            capacity: 2,
            plot: Some("speed".into()),
            metrics: vec![
                MetricConfig::new("speed", "RPM", 1000.0),
                MetricConfig::new("position", "", 360.0),
            ],
            ..ViewConfig::default()
        }
    }

    fn hand_fed(config: &ViewConfig) -> (mpsc::Sender<FeedEvent>, View) {
        let (tx, rx) = mpsc::channel(8);
        let view = View::mount_with(config, FeedSubscription::from_channel(rx)).unwrap();
        (tx, view)
    }

    fn sample(ts: &str, speed: &str) -> FeedEvent {
        FeedEvent::Sample(RawSample::new(ts).with_field("Speed", speed))
    }

    #[test]
    fn zero_capacity_fails_to_mount() {
        let mut cfg = config();
        cfg.capacity = 0;
        let (_tx, rx) = mpsc::channel(1);
        let err = View::mount_with(&cfg, FeedSubscription::from_channel(rx)).unwrap_err();
        assert!(matches!(err, TwinError::InvalidCapacity { .. }));
    }

    #[test]
    fn fresh_view_renders_zeros() {
        let (_tx, view) = hand_fed(&config());
        let frame = view.render();
        assert!(!frame.connected);
        assert_eq!(frame.samples, 0);
        assert!(frame.gauges.iter().all(|g| g.display == "0.00"));
        assert!(frame.chart.as_ref().is_some_and(LineChart::is_empty));
        assert_eq!(
            frame.to_string(),
            "[Axis] (offline, 0 samples) | Speed: 0.00 RPM | Position: 0.00"
        );
    }

    #[test]
    fn frame_lines_list_gauges_then_chart() {
        let (_tx, mut view) = hand_fed(&config());
        view.handle(FeedEvent::Connected);
        view.handle(sample("t1", "250"));

        let lines = view.render().lines();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "[Axis] (live, 1 samples)");
        assert!(lines[1].starts_with("Speed     [#####"));
        assert!(lines[1].ends_with("250.00 RPM"));
        assert!(lines[3].starts_with("Log Data for speed: 1 points"));
    }

    #[test]
    fn samples_flow_into_gauges_and_chart() {
        let (_tx, mut view) = hand_fed(&config());
        view.handle(FeedEvent::Connected);
        view.handle(sample("t1", "100"));
        view.handle(FeedEvent::Malformed("garbage".into()));
        view.handle(sample("t2", "200"));
        view.handle(sample("t3", "x"));

        let frame = view.render();
        assert!(frame.connected);
        assert_eq!(frame.samples, 2);
        assert_eq!(frame.gauges[0].display, "0.00");
        let chart = frame.chart.unwrap();
        assert_eq!(chart.categories, ["t2", "t3"]);
        assert_eq!(chart.data, [200.0, 0.0]);
    }

    #[test]
    fn disconnect_keeps_last_readings() {
        let (_tx, mut view) = hand_fed(&config());
        view.handle(sample("t1", "750"));
        view.handle(FeedEvent::Disconnected("reset".into()));

        let frame = view.render();
        assert!(!frame.connected);
        assert_eq!(frame.gauges[0].display, "750.00");
        assert_eq!(frame.gauges[0].fraction, 0.75);
    }

    #[test]
    fn unknown_plot_is_rejected_and_previous_kept() {
        let (_tx, mut view) = hand_fed(&config());
        let err = view.select_plot(Some("doesNotExist".into())).unwrap_err();
        assert!(matches!(err, TwinError::UnknownMetric(_)));
        assert_eq!(view.plot(), Some("speed"));

        view.select_plot(None).unwrap();
        assert!(view.render().chart.is_none());
    }

    #[test]
    fn configured_unknown_plot_mounts_without_chart() {
        let mut cfg = config();
        cfg.plot = Some("vibration".into());
        let (_tx, view) = hand_fed(&cfg);
        assert_eq!(view.plot(), None);
    }

    #[tokio::test]
    async fn next_event_reads_the_feed() {
        let (tx, mut view) = hand_fed(&config());
        tx.send(FeedEvent::Connected).await.unwrap();
        assert_eq!(view.next_event().await, Some(FeedEvent::Connected));
        drop(tx);
        assert_eq!(view.next_event().await, None);
    }

    #[tokio::test]
    async fn unmounting_closes_the_feed_connection() {
        use std::time::Duration;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;
        use tokio::sync::oneshot;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (closed_tx, closed_rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf).await;
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\n\r\n")
                .await
                .unwrap();
            while matches!(stream.read(&mut buf).await, Ok(n) if n > 0) {}
            let _ = closed_tx.send(());
        });

        let mut cfg = config();
        cfg.feed.url = format!("http://{addr}/stream");
        let mut view = View::mount(&cfg, "%H:%M:%S").unwrap();
        assert_eq!(view.next_event().await, Some(FeedEvent::Connected));

        drop(view);
        tokio::time::timeout(Duration::from_secs(5), closed_rx)
            .await
            .expect("feed connection outlived its view")
            .unwrap();
    }

    #[tokio::test]
    async fn buffer_handle_sees_ingests() {
        let (_tx, mut view) = hand_fed(&config());
        let shared = view.buffer();
        view.handle(sample("t1", "5"));
        assert_eq!(shared.snapshot().get("speed"), Some(5.0));
    }
}
