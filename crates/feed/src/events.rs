use serde_json::Value;
use twin_core::{FeedEvent, Result, Timestamp, TwinError};

/// Most bytes an unfinished line plus the pending event's data may hold.
pub const MAX_EVENT_BYTES: usize = 1 << 20;

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseMessage {
    /// `event:` field; `None` means the default `message` type.
    pub event: Option<String>,
    pub id: Option<String>,
    /// All `data:` lines of the event joined with `\n`.
    pub data: String,
}

impl SseMessage {
    /// Whether this is a plain `message` event, the only kind carrying readings.
    /// Named events (`heartbeat`, `ping`, …) are transport chatter.
    pub fn is_message(&self) -> bool {
        self.event.as_deref().map_or(true, |name| name == "message")
    }
}

/// Incremental `text/event-stream` decoder.
///
/// Feed it body chunks as they arrive; it buffers partial lines across chunk
/// boundaries and yields an [`SseMessage`] each time a blank line closes an
/// event that carried data.
///
/// A stream that goes [`MAX_EVENT_BYTES`] without completing an event is
/// rejected rather than buffered forever.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    event: Option<String>,
    id: Option<String>,
    data: Vec<String>,
    data_bytes: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk of the body and return every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseMessage>> {
        self.pending.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop(); // '\n'
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(message) = self.feed_line(&line) {
                out.push(message);
            }
        }

        if self.pending.len() + self.data_bytes > MAX_EVENT_BYTES {
            let buffered = self.pending.len() + self.data_bytes;
            *self = Self::default();
            return Err(TwinError::Feed(format!(
                "event exceeds {MAX_EVENT_BYTES} bytes ({buffered} buffered)"
            )));
        }
        Ok(out)
    }

    fn feed_line(&mut self, line: &str) -> Option<SseMessage> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None; // comment / keep-alive
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => {
                self.data_bytes += value.len();
                self.data.push(value.to_string());
            }
            "event" => self.event = Some(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            _ => {} // `retry` and unknown fields are ignored
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseMessage> {
        let event = self.event.take();
        self.data_bytes = 0;
        if self.data.is_empty() {
            return None;
        }
        Some(SseMessage {
            event,
            id: self.id.clone(),
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

/// Turn one JSON payload into a [`FeedEvent`].
///
/// A JSON object becomes a sample stamped with `timestamp`; anything else is
/// reported as [`FeedEvent::Malformed`] so the stream can carry on.
pub fn decode_payload(payload: &str, timestamp: Timestamp) -> FeedEvent {
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(fields)) => {
            FeedEvent::Sample(twin_core::RawSample::from_fields(timestamp, fields))
        }
        _ => FeedEvent::Malformed(payload.to_string()),
    }
}
