//! Domain events - events emitted when identity state changes
//!
//! These events are used for:
//! - Cache invalidation in other processes
//! - Audit logging
//! - Notifying subscribers about relationship changes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// All possible domain events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainEvent {
    // =========================================================================
    // User Events
    // =========================================================================
    UserCreated(UserEvent),
    UserSaved(UserEvent),
    UserDeleted(UserEvent),

    // =========================================================================
    // Role Events
    // =========================================================================
    RoleCreated(RoleEvent),
    RoleSaved(RoleEvent),
    RoleDeleted(RoleEvent),

    // =========================================================================
    // Relationship Events
    // =========================================================================
    FollowAdded(RelationEvent),
    FollowRemoved(RelationEvent),
    UserBlocked(RelationEvent),
    UserUnblocked(RelationEvent),
}

impl DomainEvent {
    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::UserCreated(_) => "USER_CREATED",
            Self::UserSaved(_) => "USER_SAVED",
            Self::UserDeleted(_) => "USER_DELETED",
            Self::RoleCreated(_) => "ROLE_CREATED",
            Self::RoleSaved(_) => "ROLE_SAVED",
            Self::RoleDeleted(_) => "ROLE_DELETED",
            Self::FollowAdded(_) => "FOLLOW_ADDED",
            Self::FollowRemoved(_) => "FOLLOW_REMOVED",
            Self::UserBlocked(_) => "USER_BLOCKED",
            Self::UserUnblocked(_) => "USER_UNBLOCKED",
        }
    }

    /// Get the timestamp of the event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::UserCreated(e) | Self::UserSaved(e) | Self::UserDeleted(e) => e.timestamp,
            Self::RoleCreated(e) | Self::RoleSaved(e) | Self::RoleDeleted(e) => e.timestamp,
            Self::FollowAdded(e)
            | Self::FollowRemoved(e)
            | Self::UserBlocked(e)
            | Self::UserUnblocked(e) => e.timestamp,
        }
    }

    /// Uid of the identity that caused the event
    pub fn actor_uid(&self) -> &str {
        match self {
            Self::UserCreated(e) | Self::UserSaved(e) | Self::UserDeleted(e) => &e.actor_uid,
            Self::RoleCreated(e) | Self::RoleSaved(e) | Self::RoleDeleted(e) => &e.actor_uid,
            Self::FollowAdded(e)
            | Self::FollowRemoved(e)
            | Self::UserBlocked(e)
            | Self::UserUnblocked(e) => &e.actor_uid,
        }
    }
}

// ============================================================================
// Event Structs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEvent {
    pub user_uid: String,
    pub actor_uid: String,
    pub timestamp: DateTime<Utc>,
}

impl UserEvent {
    pub fn new(user_uid: impl Into<String>, actor_uid: impl Into<String>) -> Self {
        Self {
            user_uid: user_uid.into(),
            actor_uid: actor_uid.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleEvent {
    pub role_uid: String,
    pub actor_uid: String,
    pub timestamp: DateTime<Utc>,
}

impl RoleEvent {
    pub fn new(role_uid: impl Into<String>, actor_uid: impl Into<String>) -> Self {
        Self {
            role_uid: role_uid.into(),
            actor_uid: actor_uid.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A directed edge between two users (follower -> follows, blocker -> blocked)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationEvent {
    pub from_uid: String,
    pub to_uid: String,
    pub actor_uid: String,
    pub timestamp: DateTime<Utc>,
}

impl RelationEvent {
    pub fn new(
        from_uid: impl Into<String>,
        to_uid: impl Into<String>,
        actor_uid: impl Into<String>,
    ) -> Self {
        Self {
            from_uid: from_uid.into(),
            to_uid: to_uid.into(),
            actor_uid: actor_uid.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_tag() {
        let event = DomainEvent::UserCreated(UserEvent::new("abc", "SYSTEM"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "USER_CREATED");
        assert_eq!(json["user_uid"], "abc");

        let back: DomainEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_accessors() {
        let event = DomainEvent::FollowAdded(RelationEvent::new("a", "b", "a"));
        assert_eq!(event.event_type(), "FOLLOW_ADDED");
        assert_eq!(event.actor_uid(), "a");
    }
}
