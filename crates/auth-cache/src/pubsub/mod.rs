//! Redis Pub/Sub module.
//!
//! Domain events leave the process through a single channel; subscribers
//! filter on the event `type` tag.

mod publisher;

pub use publisher::{RedisEventPublisher, EVENTS_CHANNEL};
