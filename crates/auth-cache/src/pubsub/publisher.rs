//! Redis Pub/Sub publisher for domain events.

use async_trait::async_trait;

use auth_core::{DomainError, DomainEvent, EventSink, RepoResult};

use crate::pool::RedisPool;

/// Channel every domain event is published on
pub const EVENTS_CHANNEL: &str = "auth:events";

/// Publishes domain events as JSON on a Redis channel
#[derive(Clone)]
pub struct RedisEventPublisher {
    pool: RedisPool,
    channel: String,
}

impl RedisEventPublisher {
    /// Create a publisher on the default `auth:events` channel
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self {
            pool,
            channel: EVENTS_CHANNEL.to_string(),
        }
    }

    /// Publish on a different channel
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    fn payload(event: &DomainEvent) -> RepoResult<String> {
        serde_json::to_string(event).map_err(|e| DomainError::InternalError(e.to_string()))
    }
}

#[async_trait]
impl EventSink for RedisEventPublisher {
    async fn publish(&self, event: &DomainEvent) -> RepoResult<()> {
        let payload = Self::payload(event)?;
        let receivers = self.pool.publish(&self.channel, &payload).await?;

        tracing::debug!(
            channel = %self.channel,
            event_type = event.event_type(),
            receivers = receivers,
            "Published event"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::RedisPoolConfig;
    use auth_core::UserEvent;

    #[test]
    fn test_payload_carries_type_tag() {
        let event = DomainEvent::UserCreated(UserEvent::new("u1", "SYSTEM"));
        let payload: serde_json::Value =
            serde_json::from_str(&RedisEventPublisher::payload(&event).unwrap()).unwrap();
        assert_eq!(payload["type"], "USER_CREATED");
        assert_eq!(payload["user_uid"], "u1");
    }

    #[tokio::test]
    async fn test_channel_override() {
        // Building a pool does not connect
        let pool = RedisPool::new(RedisPoolConfig::default()).unwrap();
        let publisher = RedisEventPublisher::new(pool);
        assert_eq!(publisher.channel(), EVENTS_CHANNEL);
        assert_eq!(publisher.with_channel("other").channel(), "other");
    }
}
