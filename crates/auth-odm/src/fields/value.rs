//! Values crossing the field API in both directions

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use auth_core::{Attachment, DocumentLink, DomainError, DomainResult, UserStatus};

use crate::models::{Role, User};

/// What a field is set to, added to, or searched by
#[derive(Debug, Clone)]
pub enum FieldInput {
    /// Plain JSON; for reference fields a string is an identifier and an
    /// object is a document link
    Value(Value),
    User(User),
    Role(Role),
    Attachment(Attachment),
    List(Vec<FieldInput>),
    /// Map entries whose keys may themselves be references
    Pairs(Vec<(FieldInput, FieldInput)>),
}

impl FieldInput {
    pub fn null() -> Self {
        Self::Value(Value::Null)
    }

    /// Null, an empty string, or an empty container
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Value(Value::Null) => true,
            Self::Value(Value::String(s)) => s.is_empty(),
            Self::Value(Value::Array(items)) => items.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Pairs(pairs) => pairs.is_empty(),
            _ => false,
        }
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Self::Value(Value::Null) => "null",
            Self::Value(Value::Bool(_)) => "bool",
            Self::Value(Value::Number(_)) => "number",
            Self::Value(Value::String(_)) => "string",
            Self::Value(Value::Array(_)) | Self::List(_) => "list",
            Self::Value(Value::Object(_)) | Self::Pairs(_) => "map",
            Self::User(_) => "user",
            Self::Role(_) => "role",
            Self::Attachment(_) => "attachment",
        }
    }

    /// Split a list-shaped input into its elements; null is an empty list
    pub(crate) fn into_items(self, field: &str) -> DomainResult<Vec<FieldInput>> {
        match self {
            Self::Value(Value::Null) => Ok(Vec::new()),
            Self::Value(Value::Array(items)) => Ok(items.into_iter().map(Self::Value).collect()),
            Self::List(items) => Ok(items),
            other => Err(DomainError::TypeMismatch(format!(
                "field '{field}': list expected, got {}",
                other.type_name()
            ))),
        }
    }

    /// Split a map-shaped input into entries; null is an empty map
    pub(crate) fn into_entries(self, field: &str) -> DomainResult<Vec<(FieldInput, FieldInput)>> {
        match self {
            Self::Value(Value::Null) => Ok(Vec::new()),
            // A document link is a single reference, not a map
            Self::Value(Value::Object(map)) if !map.contains_key("$ref") => Ok(map
                .into_iter()
                .map(|(k, v)| (Self::Value(Value::String(k)), Self::Value(v)))
                .collect()),
            Self::Pairs(pairs) => Ok(pairs),
            other => Err(DomainError::TypeMismatch(format!(
                "field '{field}': map expected, got {}",
                other.type_name()
            ))),
        }
    }

    /// The plain JSON behind this input, if it has one
    pub(crate) fn into_plain(self, field: &str) -> DomainResult<Value> {
        match self {
            Self::Value(value) => Ok(value),
            Self::List(items) => items
                .into_iter()
                .map(|item| item.into_plain(field))
                .collect::<DomainResult<Vec<_>>>()
                .map(Value::Array),
            Self::Pairs(pairs) => {
                let mut map = Map::new();
                for (key, value) in pairs {
                    let Self::Value(Value::String(key)) = key else {
                        return Err(DomainError::TypeMismatch(format!(
                            "field '{field}': map keys must be strings"
                        )));
                    };
                    map.insert(key, value.into_plain(field)?);
                }
                Ok(Value::Object(map))
            }
            other => Err(DomainError::TypeMismatch(format!(
                "field '{field}': plain value expected, got {}",
                other.type_name()
            ))),
        }
    }
}

impl From<Value> for FieldInput {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<&str> for FieldInput {
    fn from(value: &str) -> Self {
        Self::Value(Value::String(value.to_string()))
    }
}

impl From<String> for FieldInput {
    fn from(value: String) -> Self {
        Self::Value(Value::String(value))
    }
}

impl From<bool> for FieldInput {
    fn from(value: bool) -> Self {
        Self::Value(Value::Bool(value))
    }
}

impl From<i64> for FieldInput {
    fn from(value: i64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<DateTime<Utc>> for FieldInput {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Value(Value::String(format_datetime(&value)))
    }
}

impl From<UserStatus> for FieldInput {
    fn from(value: UserStatus) -> Self {
        Self::from(value.code())
    }
}

impl From<DocumentLink> for FieldInput {
    fn from(value: DocumentLink) -> Self {
        Self::Value(value.to_value())
    }
}

impl From<User> for FieldInput {
    fn from(value: User) -> Self {
        Self::User(value)
    }
}

impl From<&User> for FieldInput {
    fn from(value: &User) -> Self {
        Self::User(value.clone())
    }
}

impl From<Role> for FieldInput {
    fn from(value: Role) -> Self {
        Self::Role(value)
    }
}

impl From<&Role> for FieldInput {
    fn from(value: &Role) -> Self {
        Self::Role(value.clone())
    }
}

impl From<Attachment> for FieldInput {
    fn from(value: Attachment) -> Self {
        Self::Attachment(value)
    }
}

impl<T: Into<FieldInput>> From<Vec<T>> for FieldInput {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FieldInput>> From<Option<T>> for FieldInput {
    fn from(value: Option<T>) -> Self {
        value.map_or_else(Self::null, Into::into)
    }
}

/// A decoded field value
#[derive(Debug, Clone)]
pub enum FieldValue {
    Null,
    Value(Value),
    DateTime(DateTime<Utc>),
    User(User),
    Role(Role),
    Users(Vec<User>),
    Roles(Vec<Role>),
    /// Plain keys mapped to users
    UsersByKey(Vec<(String, User)>),
    /// Users mapped to plain values
    UserValues(Vec<(User, Value)>),
    Attachment(Attachment),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::Value(Value::Null))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Value(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Value(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Value(v) => v.as_i64(),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn into_user(self) -> Option<User> {
        match self {
            Self::User(user) => Some(user),
            _ => None,
        }
    }

    pub fn into_role(self) -> Option<Role> {
        match self {
            Self::Role(role) => Some(role),
            _ => None,
        }
    }

    pub fn into_users(self) -> Vec<User> {
        match self {
            Self::Users(users) => users,
            Self::User(user) => vec![user],
            _ => Vec::new(),
        }
    }

    pub fn into_roles(self) -> Vec<Role> {
        match self {
            Self::Roles(roles) => roles,
            Self::Role(role) => vec![role],
            _ => Vec::new(),
        }
    }

    pub fn into_attachment(self) -> Option<Attachment> {
        match self {
            Self::Attachment(attachment) => Some(attachment),
            _ => None,
        }
    }
}

/// Fixed-width UTC RFC 3339, so stored timestamps sort chronologically
pub(crate) fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_datetime(field: &str, raw: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DomainError::invalid_value(field, format!("not an RFC 3339 timestamp: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_empty() {
        assert!(FieldInput::null().is_empty());
        assert!(FieldInput::from("").is_empty());
        assert!(FieldInput::from(Vec::<String>::new()).is_empty());
        assert!(!FieldInput::from("x").is_empty());
        assert!(!FieldInput::from(false).is_empty());
    }

    #[test]
    fn test_into_items() {
        let items = FieldInput::from(json!(["a", "b"])).into_items("roles").unwrap();
        assert_eq!(items.len(), 2);
        assert!(FieldInput::null().into_items("roles").unwrap().is_empty());

        let err = FieldInput::from("admin").into_items("roles").unwrap_err();
        assert!(matches!(err, DomainError::TypeMismatch(ref m) if m.contains("list expected")));
    }

    #[test]
    fn test_into_entries_rejects_links_and_scalars() {
        let entries = FieldInput::from(json!({"a": 1})).into_entries("options").unwrap();
        assert_eq!(entries.len(), 1);

        let link = FieldInput::from(DocumentLink::new("users", "x"));
        assert!(link.into_entries("owners").is_err());
        assert!(FieldInput::from(3_i64).into_entries("owners").is_err());
    }

    #[test]
    fn test_into_plain() {
        let input = FieldInput::Pairs(vec![("theme".into(), "dark".into())]);
        assert_eq!(input.into_plain("options").unwrap(), json!({"theme": "dark"}));

        let input = FieldInput::Pairs(vec![(true.into(), "dark".into())]);
        assert!(input.into_plain("options").is_err());
    }

    #[test]
    fn test_datetime_format_round_trip() {
        let now = Utc::now();
        let formatted = format_datetime(&now);
        assert!(formatted.ends_with('Z'));
        let parsed = parse_datetime("at", &formatted).unwrap();
        assert_eq!(format_datetime(&parsed), formatted);
        assert!(parse_datetime("at", "yesterday").unwrap_err().is_validation());
    }
}
