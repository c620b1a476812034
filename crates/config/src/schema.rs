use serde::{Deserialize, Serialize};
use twin_core::{MetricSet, TwinError, DEFAULT_CAPACITY, DEFAULT_TIMESTAMP_FORMAT};

/// Root configuration structure parsed from `twin.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Settings shared by every view.
    pub global: GlobalConfig,
    /// Views that can be mounted, one feed and one buffer each.
    pub views: Vec<ViewConfig>,
    /// Machine overview screen, mounted under its own name.
    pub overview: OverviewConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            global: GlobalConfig::default(),
            views: vec![ViewConfig::spindle(), ViewConfig::feed_drive()],
            overview: OverviewConfig::default(),
        }
    }
}

impl DashboardConfig {
    /// Look up a view by name.
    pub fn view(&self, name: &str) -> twin_core::Result<&ViewConfig> {
        self.views.iter().find(|v| v.name == name).ok_or_else(|| {
            let known: Vec<&str> = self.views.iter().map(|v| v.name.as_str()).collect();
            TwinError::Config(format!(
                "no view named '{name}' (configured: {})",
                known.join(", ")
            ))
        })
    }
}

/// Global settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// View mounted at startup when none is given on the command line.
    pub view: String,
    /// How often gauges and the history chart are refreshed.
    pub render_interval_ms: u64,
    /// chrono `strftime` pattern for capture-time labels.
    pub timestamp_format: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            view: "feed-drive".to_string(),
            render_interval_ms: 1_000,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }
}

/// One monitored component (spindle, feed-drive axis, …).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub name: String,
    /// Heading shown above the gauges.
    pub title: String,
    /// Rolling history length.
    pub capacity: usize,
    /// Metric plotted over time, if any.
    pub plot: Option<String>,
    pub feed: FeedConfig,
    pub metrics: Vec<MetricConfig>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            title: String::new(),
            capacity: DEFAULT_CAPACITY,
            plot: None,
            feed: FeedConfig::default(),
            metrics: Vec::new(),
        }
    }
}

impl ViewConfig {
    /// Polled spindle readings.
    pub fn spindle() -> Self {
        Self {
            name: "spindle".to_string(),
            title: "Real-Time Spindle Readings".to_string(),
            feed: FeedConfig {
                url: "https://cmti-edge.online/smddc/machinedate.php".to_string(),
                mode: FeedMode::Poll,
                ..FeedConfig::default()
            },
            metrics: vec![
                MetricConfig::new("current", "A", 100.0),
                MetricConfig::new("torque", "Nm", 100.0),
                MetricConfig::new("power", "kW", 200.0),
                MetricConfig::new("voltage", "V", 240.0),
                MetricConfig::new("temperature", "°C", 120.0),
                MetricConfig::new("speed", "RPM", 5_000.0),
            ],
            ..Self::default()
        }
    }

    /// Streamed feed-drive axis readings.
    pub fn feed_drive() -> Self {
        Self {
            name: "feed-drive".to_string(),
            title: "Real-Time FeedDrive Readings".to_string(),
            feed: FeedConfig {
                url: "https://cmti-edge.online/OPCUA/FeedDrive.php".to_string(),
                mode: FeedMode::Sse,
                ..FeedConfig::default()
            },
            metrics: vec![
                MetricConfig::new("current", "A", 100.0),
                MetricConfig::new("torque", "Nm", 100.0),
                MetricConfig::new("power", "kW", 200.0),
                MetricConfig::new("voltage", "V", 240.0),
                MetricConfig::new("temperature", "°C", 120.0),
                MetricConfig::new("position", "", 360.0),
                MetricConfig::new("speed", "RPM", 5_000.0),
            ],
            ..Self::default()
        }
    }

    /// The names this view's buffer tracks, in display order.
    pub fn metric_set(&self) -> MetricSet {
        MetricSet::new(self.metrics.iter().map(|m| m.name.as_str()))
    }
}

/// Where a view's samples come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub url: String,
    pub mode: FeedMode,
    /// Poll period (poll mode only).
    pub interval_ms: u64,
    /// Per-request timeout. Applies to the connect phase in SSE mode.
    pub timeout_ms: u64,
    /// Delay before reconnecting after the transport drops.
    pub reconnect_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            mode: FeedMode::Sse,
            interval_ms: 5_000,
            timeout_ms: 10_000,
            reconnect_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeedMode {
    /// Server-sent events, one JSON object per `data:` message.
    #[default]
    Sse,
    /// Periodic GET returning one JSON object.
    Poll,
}

/// The home screen: machine status plus one table of latest readings per
/// sensor group. Tables are polled, never buffered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverviewConfig {
    /// Name that selects the overview instead of a view.
    pub name: String,
    pub title: String,
    /// Poll period shared by every table and the status source.
    pub interval_ms: u64,
    pub timeout_ms: u64,
    /// Endpoint answering `{"status": "on" | "ideal" | "off"}`.
    /// Without one the machine is shown as off.
    pub status_url: Option<String>,
    pub tables: Vec<TableConfig>,
}

impl Default for OverviewConfig {
    fn default() -> Self {
        let temp = ["X+", "X-", "Xb", "Y", "Yb"];
        let vib = ["Front X", "Front Y", "Rear Y", "Rear X"];
        Self {
            name: "home".to_string(),
            title: "Digital Twin of Induction Motor and Feed Drive Axis".to_string(),
            interval_ms: 5_000,
            timeout_ms: 10_000,
            status_url: None,
            tables: vec![
                TableConfig::new("Spindle", TEMPERATURE, "spindle-temperature-data", &temp),
                TableConfig::new("Spindle", VIBRATION, "spindle-vibration-data", &vib),
                TableConfig::new("Feed Drive", TEMPERATURE, "feed-drive-temperature-data", &temp),
                TableConfig::new("Feed Drive", VIBRATION, "feed-drive-vibration-data", &vib),
            ],
        }
    }
}

impl OverviewConfig {
    /// Poll settings for one of the overview's endpoints.
    pub fn feed(&self, url: &str) -> FeedConfig {
        FeedConfig {
            url: url.to_string(),
            mode: FeedMode::Poll,
            interval_ms: self.interval_ms,
            timeout_ms: self.timeout_ms,
            reconnect_ms: self.interval_ms,
        }
    }
}

/// One table on the overview: a row of sensor readings from one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Card the table sits on, e.g. `"Spindle"`.
    pub component: String,
    pub title: String,
    pub url: String,
    /// Column headers; each reads the payload key given by [`column_key`].
    pub columns: Vec<String>,
}

impl TableConfig {
    fn new(component: &str, title: &str, endpoint: &str, columns: &[&str]) -> Self {
        Self {
            component: component.to_string(),
            title: title.to_string(),
            url: format!("{DEFAULT_API_BASE}/{endpoint}"),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Payload keys in column order.
    pub fn metric_set(&self) -> MetricSet {
        MetricSet::new(self.columns.iter().map(|c| column_key(c)))
    }
}

const DEFAULT_API_BASE: &str = "http://localhost:3000/api";
const TEMPERATURE: &str = "Temperature Data (°C)";
const VIBRATION: &str = "Vibration Data (mm/sec)";

/// Payload key for a column header: lowercased, first space removed
/// (`"Front X"` → `"frontx"`, `"X+"` → `"x+"`).
pub fn column_key(header: &str) -> String {
    header.to_lowercase().replacen(' ', "", 1)
}

/// One gauge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricConfig {
    /// Metric name as tracked by the buffer, e.g. `"torque"`.
    pub name: String,
    /// Display label; defaults to the capitalised name.
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub unit: String,
    /// Upper end of the gauge scale.
    #[serde(default = "default_max")]
    pub max: f64,
}

fn default_max() -> f64 {
    100.0
}

impl MetricConfig {
    pub fn new(name: impl Into<String>, unit: impl Into<String>, max: f64) -> Self {
        Self {
            name: name.into(),
            label: None,
            unit: unit.into(),
            max,
        }
    }

    pub fn display_label(&self) -> String {
        if let Some(label) = &self.label {
            return label.clone();
        }
        let mut chars = self.name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}
