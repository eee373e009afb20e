//! Event sinks - where domain events go after a successful write

use async_trait::async_trait;
use parking_lot::Mutex;

use super::domain_event::DomainEvent;
use crate::traits::RepoResult;

/// Event bus port
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> RepoResult<()>;
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

#[async_trait]
impl EventSink for NoopEventSink {
    async fn publish(&self, _event: &DomainEvent) -> RepoResult<()> {
        Ok(())
    }
}

/// Keeps every published event in memory
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events, oldest first
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().clone()
    }

    pub fn event_types(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(DomainEvent::event_type).collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn publish(&self, event: &DomainEvent) -> RepoResult<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RoleEvent;

    #[tokio::test]
    async fn test_recording_sink() {
        let sink = RecordingEventSink::new();
        sink.publish(&DomainEvent::RoleCreated(RoleEvent::new("r1", "SYSTEM")))
            .await
            .unwrap();
        sink.publish(&DomainEvent::RoleDeleted(RoleEvent::new("r1", "SYSTEM")))
            .await
            .unwrap();

        assert_eq!(sink.event_types(), vec!["ROLE_CREATED", "ROLE_DELETED"]);
        sink.clear();
        assert!(sink.events().is_empty());
    }
}
