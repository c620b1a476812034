use futures::future::{self, BoxFuture, FutureExt};
use std::fmt;
use tracing::{debug, info, warn};
use twin_config::OverviewConfig;
use twin_core::{FeedEvent, Metrics, OverviewSource, Result, TwinError};
use twin_feed::{FeedClient, FeedSubscription};
use twin_widgets::{DataTable, MachineStatus, TableRow};

/// The mounted home screen: one polled table per sensor group and the
/// machine status lamp. Only the latest reading of each table is kept.
#[derive(Debug)]
pub struct Overview {
    config: OverviewConfig,
    tables: Vec<Panel>,
    status_feed: Option<FeedSubscription>,
    status: MachineStatus,
}

#[derive(Debug)]
struct Panel {
    table: DataTable,
    latest: Option<Metrics>,
    connected: bool,
    feed: FeedSubscription,
}

impl Overview {
    /// Start polling every table endpoint and, if configured, the status one.
    pub fn mount(config: &OverviewConfig, timestamp_format: &str) -> Result<Self> {
        let mut feeds = Vec::with_capacity(config.tables.len());
        for table in &config.tables {
            feeds.push(FeedClient::new(&config.feed(&table.url), timestamp_format)?.spawn());
        }
        let status = match &config.status_url {
            Some(url) => Some(FeedClient::new(&config.feed(url), timestamp_format)?.spawn()),
            None => None,
        };
        info!(
            "Mounted overview '{}' ({} tables, polling every {}ms)",
            config.name,
            config.tables.len(),
            config.interval_ms
        );
        Self::mount_with(config, feeds, status)
    }

    /// Mount on existing subscriptions, one per configured table.
    pub fn mount_with(
        config: &OverviewConfig,
        feeds: Vec<FeedSubscription>,
        status_feed: Option<FeedSubscription>,
    ) -> Result<Self> {
        if feeds.len() != config.tables.len() {
            return Err(TwinError::Config(format!(
                "overview has {} tables but {} feeds",
                config.tables.len(),
                feeds.len()
            )));
        }
        let tables = config
            .tables
            .iter()
            .zip(feeds)
            .map(|(table, feed)| Panel {
                table: DataTable::from_config(table),
                latest: None,
                connected: false,
                feed,
            })
            .collect();

        Ok(Self {
            config: config.clone(),
            tables,
            status_feed,
            status: MachineStatus::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &OverviewConfig {
        &self.config
    }

    pub fn status(&self) -> MachineStatus {
        self.status
    }

    /// Next event from whichever feed answers first. Pends forever if
    /// nothing is configured; `None` once every feed has stopped.
    pub async fn next_event(&mut self) -> Option<(OverviewSource, FeedEvent)> {
        let Self {
            tables,
            status_feed,
            ..
        } = self;

        let mut pending: Vec<BoxFuture<'_, (OverviewSource, Option<FeedEvent>)>> = tables
            .iter_mut()
            .enumerate()
            .map(|(i, panel)| {
                async move { (OverviewSource::Table(i), panel.feed.recv().await) }.boxed()
            })
            .collect();
        if let Some(feed) = status_feed {
            pending.push(async move { (OverviewSource::Status, feed.recv().await) }.boxed());
        }
        if pending.is_empty() {
            return future::pending().await;
        }

        while !pending.is_empty() {
            let ((source, event), _, rest) = future::select_all(pending).await;
            match event {
                Some(event) => return Some((source, event)),
                None => {
                    warn!("Overview feed {source:?} stopped");
                    pending = rest;
                }
            }
        }
        None
    }

    pub fn handle(&mut self, source: OverviewSource, event: FeedEvent) {
        match source {
            OverviewSource::Table(index) => match self.tables.get_mut(index) {
                Some(panel) => panel.handle(event),
                None => warn!("Overview: event for unknown table {index}"),
            },
            OverviewSource::Status => self.handle_status(event),
        }
    }

    fn handle_status(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Sample(sample) => {
                match sample.field("status").and_then(|v| v.as_str()) {
                    Some(raw) => self.status = MachineStatus::parse(raw),
                    None => warn!("Overview: status payload has no 'status' string"),
                }
            }
            FeedEvent::Disconnected(reason) => {
                warn!("Overview: status feed lost ({reason}); showing machine as off");
                self.status = MachineStatus::Off;
            }
            FeedEvent::Malformed(raw) => warn!("Overview: undecodable status payload: {raw}"),
            FeedEvent::Connected => debug!("Overview: status feed connected"),
        }
    }

    pub fn render(&self) -> OverviewFrame {
        OverviewFrame {
            title: self.config.title.clone(),
            status: self.status,
            live_tables: self.tables.iter().filter(|panel| panel.connected).count(),
            rows: self
                .tables
                .iter()
                .map(|panel| panel.table.row(panel.latest.as_ref()))
                .collect(),
        }
    }
}

impl Panel {
    fn handle(&mut self, event: FeedEvent) {
        let (component, title) = (&self.table.component, &self.table.title);
        match event {
            FeedEvent::Connected => {
                self.connected = true;
                info!("Overview '{component} / {title}': feed connected");
            }
            FeedEvent::Sample(sample) => {
                self.latest = Some(Metrics::normalize(self.table.metric_set(), &sample));
            }
            FeedEvent::Malformed(raw) => {
                warn!("Overview '{component} / {title}': skipping undecodable payload: {raw}");
            }
            FeedEvent::Disconnected(reason) => {
                self.connected = false;
                warn!(
                    "Overview '{component} / {title}': feed lost ({reason}); \
                     keeping last readings"
                );
            }
        }
    }
}

impl Drop for Overview {
    fn drop(&mut self) {
        info!("Unmounting overview '{}'", self.config.name);
    }
}

/// One refresh of the overview.
#[derive(Debug, Clone, PartialEq)]
pub struct OverviewFrame {
    pub title: String,
    pub status: MachineStatus,
    /// Tables whose endpoint is currently answering.
    pub live_tables: usize,
    pub rows: Vec<TableRow>,
}

impl OverviewFrame {
    pub fn lines(&self) -> Vec<String> {
        std::iter::once(self.to_string())
            .chain(self.rows.iter().map(TableRow::to_string))
            .collect()
    }
}

impl fmt::Display for OverviewFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}), {}/{} tables live",
            self.title,
            self.status,
            self.status.color(),
            self.live_tables,
            self.rows.len()
        )
    }
}
