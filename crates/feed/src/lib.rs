pub mod client;
pub mod events;

pub use client::{FeedClient, FeedSubscription};
pub use events::{decode_payload, SseDecoder, SseMessage, MAX_EVENT_BYTES};
