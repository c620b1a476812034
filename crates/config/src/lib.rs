pub mod schema;
pub mod watcher;

pub use schema::{
    column_key, DashboardConfig, FeedConfig, FeedMode, GlobalConfig, MetricConfig, OverviewConfig,
    TableConfig, ViewConfig,
};
pub use watcher::ConfigWatcher;

use chrono::format::{Item, StrftimeItems};
use std::path::{Path, PathBuf};
use twin_core::{Result, TwinError};

/// Load configuration from a TOML file.  Returns `DashboardConfig::default()`
/// if the file doesn't exist so the monitor always has sensible defaults.
pub fn load(path: impl AsRef<Path>) -> Result<DashboardConfig> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::warn!(
            "Config file not found at '{}'; using defaults.",
            path.display()
        );
        return Ok(DashboardConfig::default());
    }

    let raw = std::fs::read_to_string(path)
        .map_err(|e| TwinError::Config(format!("cannot read '{}': {e}", path.display())))?;

    parse(&raw)
}

/// Parse and validate a TOML document.
pub fn parse(raw: &str) -> Result<DashboardConfig> {
    let config: DashboardConfig =
        toml::from_str(raw).map_err(|e| TwinError::Config(format!("TOML parse error: {e}")))?;
    validate(&config)?;
    Ok(config)
}

/// Reject settings that would make the monitor spin or mislabel samples.
/// Buffer capacity is checked when a view mounts.
pub fn validate(config: &DashboardConfig) -> Result<()> {
    if config.global.render_interval_ms == 0 {
        return Err(TwinError::Config("render_interval_ms must be > 0".into()));
    }
    if StrftimeItems::new(&config.global.timestamp_format).any(|item| matches!(item, Item::Error)) {
        return Err(TwinError::Config(format!(
            "invalid timestamp_format '{}'",
            config.global.timestamp_format
        )));
    }
    for (i, view) in config.views.iter().enumerate() {
        if view.name == config.overview.name {
            return Err(TwinError::Config(format!(
                "view '{}' clashes with the overview's name",
                view.name
            )));
        }
        if config.views[..i].iter().any(|v| v.name == view.name) {
            return Err(TwinError::Config(format!("view '{}' is defined twice", view.name)));
        }
        if view.feed.url.is_empty() {
            return Err(TwinError::Config(format!("view '{}' has no feed url", view.name)));
        }
        if view.feed.interval_ms == 0 || view.feed.reconnect_ms == 0 {
            return Err(TwinError::Config(format!(
                "view '{}': feed intervals must be > 0",
                view.name
            )));
        }
    }
    let overview = &config.overview;
    if overview.interval_ms == 0 {
        return Err(TwinError::Config("overview interval_ms must be > 0".into()));
    }
    if let Some(table) = overview.tables.iter().find(|t| t.url.is_empty()) {
        return Err(TwinError::Config(format!(
            "overview table '{} {}' has no url",
            table.component, table.title
        )));
    }
    Ok(())
}

/// Return the config path: `$TWIN_CONFIG` if set, otherwise
/// `$XDG_CONFIG_HOME/twin/twin.toml` (falling back to `~/.config`).
pub fn default_path() -> PathBuf {
    if let Ok(path) = std::env::var("TWIN_CONFIG") {
        return PathBuf::from(path);
    }
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("twin").join("twin.toml")
}
