//! Presentation data for the monitor: gauge readings from a snapshot,
//! line-chart series from a history, and the overview's tables and status
//! lamp. `text` turns them into lines for the log; other drawing is left to
//! the renderer.

pub mod chart;
pub mod gauge;
pub mod status;
pub mod table;
pub mod text;

pub use chart::LineChart;
pub use gauge::{format_value, Gauge, GaugeReading};
pub use status::MachineStatus;
pub use table::{DataTable, TableCell, TableRow, NO_READING};
pub use text::render_lines;
