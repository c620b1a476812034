use crate::sample::RawSample;

/// Everything a live feed can report to the view that owns it.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Transport is up (SSE stream opened or first poll answered).
    Connected,
    /// A decoded delivery, ready for ingestion.
    Sample(RawSample),
    /// A delivery that could not be decoded; carries the raw payload for logging.
    Malformed(String),
    /// Transport dropped; the feed will retry on its own.
    Disconnected(String),
}

/// Which of the overview's feeds an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverviewSource {
    /// Table at this position in the overview config.
    Table(usize),
    /// Machine status endpoint.
    Status,
}

/// All messages that can flow through the monitor's event loop.
///
/// Sources:
/// - Feed subscription  → `Feed`
/// - Overview feeds     → `Overview`
/// - Render timer       → `Render`
/// - Config watcher     → `ConfigReloaded`
/// - Ctrl-C             → `Shutdown`
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Feed(FeedEvent),
    Overview(OverviewSource, FeedEvent),
    /// Time to refresh gauges and the history chart.
    Render,
    /// Config file changed on disk; triggers a reload and maybe a remount.
    ConfigReloaded,
    /// Graceful shutdown requested.
    Shutdown,
}
