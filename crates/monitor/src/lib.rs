//! Live telemetry monitor for the machine-tool digital twin.
//!
//! Mounts one screen, either a component view or the machine overview, and
//! drives it from a single event loop:
//! - feed subscriptions (SSE stream or HTTP poll) → samples into the screen
//! - render timer → gauge readings, the history chart or overview tables
//! - config file watcher → live reload, remounting the screen if it changed
//! - Ctrl-C → orderly unmount

pub mod overview;
pub mod view;

pub use overview::{Overview, OverviewFrame};
pub use view::{Frame, View};

use std::future::Future;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use twin_config::{default_path, load as load_config, ConfigWatcher, DashboardConfig};
use twin_core::{Message, Result};

// ── Entry point ───────────────────────────────────────────────────────────────

/// Run the monitor until Ctrl-C. `view` overrides the configured view name.
pub fn run(view: Option<String>) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let monitor = Monitor::start(default_path(), view)?;
        monitor.run().await
    })
}

// ── Screens ───────────────────────────────────────────────────────────────────

/// Whatever is mounted: a component view or the overview.
#[derive(Debug)]
pub enum Screen {
    View(View),
    Overview(Overview),
}

impl Screen {
    /// Mount the screen called `name`; the overview's name wins over views.
    pub fn mount(config: &DashboardConfig, name: &str) -> Result<Self> {
        let format = &config.global.timestamp_format;
        if name == config.overview.name {
            return Overview::mount(&config.overview, format).map(Self::Overview);
        }
        View::mount(config.view(name)?, format).map(Self::View)
    }

    pub fn name(&self) -> &str {
        match self {
            Self::View(view) => view.name(),
            Self::Overview(overview) => overview.name(),
        }
    }

    /// Whether `config` describes something other than what is mounted.
    fn is_stale(&self, config: &DashboardConfig) -> bool {
        match self {
            Self::View(view) => config.view(view.name()).map_or(true, |v| v != view.config()),
            Self::Overview(overview) => config.overview != *overview.config(),
        }
    }

    async fn next_event(&mut self) -> Option<Message> {
        match self {
            Self::View(view) => view.next_event().await.map(Message::Feed),
            Self::Overview(overview) => {
                let (source, event) = overview.next_event().await?;
                Some(Message::Overview(source, event))
            }
        }
    }

    fn lines(&self) -> Vec<String> {
        match self {
            Self::View(view) => view.render().lines(),
            Self::Overview(overview) => overview.render().lines(),
        }
    }
}

// ── State ─────────────────────────────────────────────────────────────────────

pub struct Monitor {
    config_path: PathBuf,
    config: DashboardConfig,
    /// Name of the mounted screen; survives reloads.
    screen_name: String,
    screen: Screen,
    ticker: Interval,
}

impl Monitor {
    /// Load config and mount the requested screen. Must be called inside a
    /// tokio runtime.
    pub fn start(config_path: impl AsRef<Path>, view: Option<String>) -> Result<Self> {
        let config_path = config_path.as_ref().to_path_buf();
        let config = load_config(&config_path)?;
        let screen_name = view.unwrap_or_else(|| config.global.view.clone());
        let screen = Screen::mount(&config, &screen_name)?;
        let ticker = render_ticker(config.global.render_interval_ms);

        Ok(Self {
            config_path,
            config,
            screen_name,
            screen,
            ticker,
        })
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    /// The mounted component view, unless the overview is showing.
    pub fn view(&self) -> Option<&View> {
        match &self.screen {
            Screen::View(view) => Some(view),
            Screen::Overview(_) => None,
        }
    }

    pub async fn run(self) -> Result<()> {
        self.run_until(tokio::signal::ctrl_c()).await
    }

    /// Run the event loop until `shutdown` resolves or the feed stops.
    pub async fn run_until<F: Future>(mut self, shutdown: F) -> Result<()> {
        let (_watcher, mut reloads) = ConfigWatcher::spawn(&self.config_path);
        tokio::pin!(shutdown);

        loop {
            let message = tokio::select! {
                message = self.screen.next_event() => message.unwrap_or_else(|| {
                    error!("Feed for '{}' stopped", self.screen_name);
                    Message::Shutdown
                }),
                _ = self.ticker.tick() => Message::Render,
                Some(()) = reloads.recv() => Message::ConfigReloaded,
                _ = &mut shutdown => Message::Shutdown,
            };

            if self.update(message).is_break() {
                break;
            }
        }

        info!("Monitor stopped");
        Ok(())
    }

    // ── Update ────────────────────────────────────────────────────────────────

    pub fn update(&mut self, message: Message) -> ControlFlow<()> {
        match message {
            Message::Feed(event) => match &mut self.screen {
                Screen::View(view) => view.handle(event),
                Screen::Overview(_) => debug!("Overview mounted; dropping view event"),
            },
            Message::Overview(source, event) => match &mut self.screen {
                Screen::Overview(overview) => overview.handle(source, event),
                Screen::View(_) => debug!("View mounted; dropping overview event"),
            },
            Message::Render => {
                for line in self.screen.lines() {
                    info!("{line}");
                }
            }
            Message::ConfigReloaded => self.reload(),
            Message::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn reload(&mut self) {
        let config = match load_config(&self.config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("Config reload failed: {e}; keeping current config");
                return;
            }
        };

        let format_changed = config.global.timestamp_format != self.config.global.timestamp_format;
        if format_changed || self.screen.is_stale(&config) {
            match Screen::mount(&config, &self.screen_name) {
                // Old screen (and its feeds) is dropped here.
                Ok(screen) => self.screen = screen,
                Err(e) => {
                    warn!(
                        "Config reload: cannot remount '{}': {e}; keeping current one",
                        self.screen_name
                    );
                    return;
                }
            }
        }

        if config.global.render_interval_ms != self.config.global.render_interval_ms {
            self.ticker = render_ticker(config.global.render_interval_ms);
        }

        info!("Config reloaded");
        self.config = config;
    }
}

fn render_ticker(interval_ms: u64) -> Interval {
    let mut ticker = time::interval(Duration::from_millis(interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}
