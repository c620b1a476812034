pub mod buffer;
pub mod error;
pub mod event;
pub mod sample;

pub use buffer::{History, HistoryEntry, RollingTelemetryBuffer, SharedBuffer, DEFAULT_CAPACITY};
pub use error::{Result, TwinError};
pub use event::{FeedEvent, Message, OverviewSource};
pub use sample::{MetricSet, Metrics, RawSample, Timestamp, DEFAULT_TIMESTAMP_FORMAT};
