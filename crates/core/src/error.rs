use thiserror::Error;

/// Top-level error type used across the entire application.
#[derive(Debug, Error)]
pub enum TwinError {
    /// A rolling buffer was asked for zero slots.
    #[error("invalid capacity {capacity}: a telemetry buffer needs at least one slot")]
    InvalidCapacity { capacity: usize },

    /// History was requested for a metric the buffer does not track.
    #[error("unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("feed error: {0}")]
    Feed(String),

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

pub type Result<T, E = TwinError> = std::result::Result<T, E>;
