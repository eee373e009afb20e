//! Stored reference formats
//!
//! Reference fields persist identities as strings. Three shapes coexist in
//! stored data and all of them must stay readable:
//! - legacy bare uid: `65a1b2c3d4e5f60718293a4b`
//! - current composite: `user:65a1b2c3d4e5f60718293a4b`
//! - document link: `{"$ref": "users", "$id": "65a1b2c3d4e5f60718293a4b"}`
//!
//! New writes always use the composite form.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::error::{DomainError, DomainResult};

/// Canonical uid of the anonymous placeholder identity
pub const ANONYMOUS_UID: &str = "ANONYMOUS";

/// Canonical uid of the system placeholder identity
pub const SYSTEM_UID: &str = "SYSTEM";

/// Kind of entity a reference points to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    User,
    Role,
}

impl EntityKind {
    /// Prefix used by the composite stored form
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Role => "role",
        }
    }

    /// Collection the entity lives in
    pub const fn collection(self) -> &'static str {
        match self {
            Self::User => "users",
            Self::Role => "roles",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "user" => Some(Self::User),
            "role" => Some(Self::Role),
            _ => None,
        }
    }

    /// Accepts both collection names and model names
    pub fn from_collection(collection: &str) -> Option<Self> {
        match collection {
            "users" | "user" => Some(Self::User),
            "roles" | "role" => Some(Self::Role),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Raw document link (`{"$ref": ..., "$id": ...}`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentLink {
    pub collection: String,
    pub id: String,
}

impl DocumentLink {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Parse a link value; `None` when the value is not link-shaped
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let collection = map.get("$ref")?.as_str()?;
        let id = match map.get("$id")? {
            Value::String(s) => s.clone(),
            Value::Object(inner) => inner.get("$oid")?.as_str()?.to_string(),
            _ => return None,
        };
        Some(Self::new(collection, id))
    }

    pub fn to_value(&self) -> Value {
        json!({ "$ref": self.collection, "$id": self.id })
    }

    /// Entity kind the link's collection belongs to
    pub fn kind(&self) -> Option<EntityKind> {
        EntityKind::from_collection(&self.collection)
    }
}

/// A parsed stored reference string
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoredRef {
    /// `None` for the legacy bare-uid form
    pub kind: Option<EntityKind>,
    pub uid: String,
}

impl StoredRef {
    /// Parse any string shape. An unknown prefix means the whole string is a
    /// legacy uid.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        if raw.is_empty() {
            return Err(DomainError::invalid_value("reference", "empty reference"));
        }

        if let Some((prefix, uid)) = raw.split_once(':') {
            if let Some(kind) = EntityKind::from_prefix(prefix) {
                if uid.is_empty() {
                    return Err(DomainError::invalid_value(
                        "reference",
                        format!("empty uid after '{prefix}:'"),
                    ));
                }
                return Ok(Self {
                    kind: Some(kind),
                    uid: uid.to_string(),
                });
            }
        }

        Ok(Self {
            kind: None,
            uid: raw.to_string(),
        })
    }

    /// Render the current (composite) stored form
    pub fn composite(kind: EntityKind, uid: &str) -> String {
        format!("{}:{uid}", kind.prefix())
    }

    /// Check the reference points to `kind`; legacy refs are accepted as-is
    pub fn expect_kind(self, kind: EntityKind) -> DomainResult<Self> {
        match self.kind {
            Some(found) if found != kind => Err(DomainError::TypeMismatch(format!(
                "{kind} reference expected, got {found} reference"
            ))),
            _ => Ok(self),
        }
    }

    /// Every stored shape a reference to `uid` may take, current form first
    pub fn stored_forms(kind: EntityKind, uid: &str) -> [String; 2] {
        [Self::composite(kind, uid), uid.to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_composite() {
        let r = StoredRef::parse("user:65a1b2c3d4e5f60718293a4b").unwrap();
        assert_eq!(r.kind, Some(EntityKind::User));
        assert_eq!(r.uid, "65a1b2c3d4e5f60718293a4b");
    }

    #[test]
    fn test_parse_legacy_uid() {
        let r = StoredRef::parse("65a1b2c3d4e5f60718293a4b").unwrap();
        assert_eq!(r.kind, None);
        assert_eq!(r.uid, "65a1b2c3d4e5f60718293a4b");
    }

    #[test]
    fn test_unknown_prefix_is_part_of_legacy_uid() {
        let r = StoredRef::parse("group:42").unwrap();
        assert_eq!(r.kind, None);
        assert_eq!(r.uid, "group:42");
    }

    #[test]
    fn test_parse_empty_is_invalid() {
        assert!(StoredRef::parse("").unwrap_err().is_validation());
        assert!(StoredRef::parse("role:").unwrap_err().is_validation());
    }

    #[test]
    fn test_expect_kind() {
        let role = StoredRef::parse("role:abc").unwrap();
        assert!(matches!(
            role.clone().expect_kind(EntityKind::User),
            Err(DomainError::TypeMismatch(_))
        ));
        assert!(role.expect_kind(EntityKind::Role).is_ok());

        let legacy = StoredRef::parse("abc").unwrap();
        assert!(legacy.expect_kind(EntityKind::User).is_ok());
    }

    #[test]
    fn test_stored_forms() {
        assert_eq!(
            StoredRef::stored_forms(EntityKind::Role, "abc"),
            ["role:abc".to_string(), "abc".to_string()]
        );
    }

    #[test]
    fn test_document_link() {
        let link = DocumentLink::from_value(&json!({"$ref": "users", "$id": "abc"})).unwrap();
        assert_eq!(link.kind(), Some(EntityKind::User));
        assert_eq!(link.id, "abc");
        assert_eq!(DocumentLink::from_value(&link.to_value()), Some(link));

        let oid = json!({"$ref": "role", "$id": {"$oid": "def"}});
        assert_eq!(
            DocumentLink::from_value(&oid),
            Some(DocumentLink::new("role", "def"))
        );

        assert_eq!(DocumentLink::from_value(&json!("abc")), None);
        assert_eq!(DocumentLink::from_value(&json!({"$ref": "users"})), None);
    }
}
