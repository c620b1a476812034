use crate::events::{decode_payload, SseDecoder};
use futures::StreamExt;
use reqwest::header::ACCEPT;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use twin_config::{FeedConfig, FeedMode};
use twin_core::{FeedEvent, Result, Timestamp, TwinError};

/// HTTP client for one live feed.
///
/// SSE feeds are streamed and decoded message by message; poll feeds are
/// fetched every `interval_ms`. Either way the transport reconnects on its
/// own and never gives up while someone is listening.
#[derive(Debug, Clone)]
pub struct FeedClient {
    url: String,
    mode: FeedMode,
    interval: Duration,
    reconnect: Duration,
    timestamp_format: String,
    http: reqwest::Client,
}

impl FeedClient {
    pub fn new(config: &FeedConfig, timestamp_format: impl Into<String>) -> Result<Self> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let builder =
            reqwest::Client::builder().user_agent(concat!("twin/", env!("CARGO_PKG_VERSION")));
        // A whole-request timeout would cut a healthy event stream.
        let builder = match config.mode {
            FeedMode::Sse => builder.connect_timeout(timeout),
            FeedMode::Poll => builder.timeout(timeout),
        };
        let http = builder
            .build()
            .map_err(|e| TwinError::Feed(format!("http client: {e}")))?;

        Ok(Self {
            url: config.url.clone(),
            mode: config.mode,
            interval: Duration::from_millis(config.interval_ms),
            reconnect: Duration::from_millis(config.reconnect_ms),
            timestamp_format: timestamp_format.into(),
            http,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Spawn the background task and hand back the subscription that owns it.
    pub fn spawn(self) -> FeedSubscription {
        let (tx, rx) = mpsc::channel(64);
        let task = match self.mode {
            FeedMode::Sse => tokio::spawn(self.stream_loop(tx)),
            FeedMode::Poll => tokio::spawn(self.poll_loop(tx)),
        };
        FeedSubscription {
            rx,
            task: Some(task),
        }
    }

    fn stamp(&self) -> Timestamp {
        Timestamp::now(&self.timestamp_format)
    }

    async fn stream_loop(self, tx: mpsc::Sender<FeedEvent>) {
        loop {
            let reason = match self.stream_once(&tx).await {
                ControlFlow::Continue(reason) => reason,
                ControlFlow::Break(()) => return, // receiver dropped
            };
            warn!(
                "Feed '{}' lost: {reason}; reconnecting in {}ms",
                self.url,
                self.reconnect.as_millis()
            );
            if tx.send(FeedEvent::Disconnected(reason)).await.is_err() {
                return;
            }
            time::sleep(self.reconnect).await;
        }
    }

    /// One SSE connection. `Continue` carries the reason it ended.
    async fn stream_once(&self, tx: &mpsc::Sender<FeedEvent>) -> ControlFlow<(), String> {
        let response = match self
            .http
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
        {
            Ok(response) => response,
            Err(e) => return ControlFlow::Continue(format!("connect: {e}")),
        };

        info!("Connected to SSE feed {}", self.url);
        if tx.send(FeedEvent::Connected).await.is_err() {
            return ControlFlow::Break(());
        }

        let mut decoder = SseDecoder::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => return ControlFlow::Continue(format!("read: {e}")),
            };
            let messages = match decoder.push(&chunk) {
                Ok(messages) => messages,
                Err(e) => return ControlFlow::Continue(e.to_string()),
            };
            for message in messages {
                if !message.is_message() {
                    let name = message.event.as_deref().unwrap_or_default();
                    debug!("Feed '{}': skipping '{name}' event", self.url);
                    continue;
                }
                let event = decode_payload(&message.data, self.stamp());
                if tx.send(event).await.is_err() {
                    return ControlFlow::Break(());
                }
            }
        }

        ControlFlow::Continue("stream closed by server".to_string())
    }

    async fn poll_loop(self, tx: mpsc::Sender<FeedEvent>) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut connected = false;

        loop {
            ticker.tick().await; // first tick fires immediately

            let event = match self.poll_once().await {
                Ok(body) => {
                    if !connected {
                        connected = true;
                        info!("Polling feed {} every {}ms", self.url, self.interval.as_millis());
                        if tx.send(FeedEvent::Connected).await.is_err() {
                            return;
                        }
                    }
                    decode_payload(&body, self.stamp())
                }
                Err(e) if connected => {
                    connected = false;
                    warn!("Poll of '{}' failed: {e}", self.url);
                    FeedEvent::Disconnected(e.to_string())
                }
                Err(e) => {
                    debug!("Poll of '{}' still failing: {e}", self.url);
                    continue;
                }
            };

            if tx.send(event).await.is_err() {
                return;
            }
        }
    }

    async fn poll_once(&self) -> Result<String> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| TwinError::Feed(format!("request: {e}")))?;

        response
            .text()
            .await
            .map_err(|e| TwinError::Feed(format!("body: {e}")))
    }
}

/// A live feed subscription.
///
/// Owns the transport task: dropping the subscription closes the connection,
/// whichever way the owner exits.
#[derive(Debug)]
pub struct FeedSubscription {
    rx: mpsc::Receiver<FeedEvent>,
    task: Option<JoinHandle<()>>,
}

impl FeedSubscription {
    /// A subscription fed by hand instead of by a transport task.
    pub fn from_channel(rx: mpsc::Receiver<FeedEvent>) -> Self {
        Self { rx, task: None }
    }

    /// Next event, or `None` once the feed has stopped for good.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        let event = self.rx.recv().await;
        if event.is_none() {
            if let Some(task) = &self.task {
                if task.is_finished() {
                    error!("Feed task exited unexpectedly");
                }
            }
        }
        event
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
