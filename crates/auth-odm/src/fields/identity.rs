//! Codecs for the identity fields of a user record

use async_trait::async_trait;
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;

use auth_common::AuthSettings;
use auth_core::{DomainError, DomainResult, UserStatus};

use super::{type_mismatch, FieldCodec, FieldInput, FieldValue, Slot};
use crate::storage::OdmStorage;

/// Stores only a one-way hash of the password
///
/// An empty value on a new record gets a random password; an empty value on
/// an existing record keeps the stored hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordCodec;

#[async_trait]
impl FieldCodec for PasswordCodec {
    async fn encode(
        &self,
        storage: &OdmStorage,
        slot: Slot<'_>,
        input: FieldInput,
    ) -> DomainResult<Value> {
        match input {
            FieldInput::Value(Value::String(password)) if !password.is_empty() => {
                storage.passwords().hash(&password).map(Value::String)
            }
            FieldInput::Value(Value::Null | Value::String(_)) => {
                if slot.is_new || slot.current.is_null() {
                    storage.passwords().hash_random().map(Value::String)
                } else {
                    Ok(slot.current.clone())
                }
            }
            other => Err(type_mismatch(slot.field, "string", &other)),
        }
    }

    async fn decode(&self, _storage: &OdmStorage, stored: &Value) -> DomainResult<FieldValue> {
        Ok(FieldValue::Value(stored.clone()))
    }

    fn finder_values(&self, field: &str, _input: FieldInput) -> DomainResult<Vec<Value>> {
        Err(DomainError::InvalidArgument(format!(
            "field '{field}' cannot be searched"
        )))
    }
}

/// Account status from the closed `UserStatus` set
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusCodec;

#[async_trait]
impl FieldCodec for StatusCodec {
    async fn encode(
        &self,
        _storage: &OdmStorage,
        slot: Slot<'_>,
        input: FieldInput,
    ) -> DomainResult<Value> {
        match input {
            FieldInput::Value(Value::String(code)) => {
                let status = UserStatus::from_str(&code)?;
                Ok(Value::String(status.code().to_string()))
            }
            FieldInput::Value(Value::Null) => Err(DomainError::invalid_value(
                slot.field,
                "a status is required",
            )),
            other => Err(type_mismatch(slot.field, "status code", &other)),
        }
    }

    async fn decode(&self, _storage: &OdmStorage, stored: &Value) -> DomainResult<FieldValue> {
        Ok(FieldValue::Value(stored.clone()))
    }

    fn default_value(&self) -> Value {
        Value::String(UserStatus::default().code().to_string())
    }
}

/// Nickname made unique across users
///
/// The candidate is slugified and truncated to the base length; while another
/// user holds it, `-1`, `-2`, ... suffixes are tried in turn. The result never
/// exceeds the maximum length.
#[derive(Debug, Clone, Copy)]
pub struct NicknameCodec {
    base_length: usize,
    max_length: usize,
}

impl NicknameCodec {
    pub fn new(base_length: usize, max_length: usize) -> Self {
        Self {
            base_length: base_length.min(max_length),
            max_length,
        }
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(settings.nickname_base_length, settings.nickname_max_length)
    }

    /// Normalized base a nickname candidate starts from
    pub fn base(&self, raw: &str) -> String {
        let slug = slug::slugify(raw);
        // Slugs are ASCII, so byte and char lengths agree
        let truncated = &slug[..slug.len().min(self.base_length)];
        truncated.trim_end_matches('-').to_string()
    }

    /// First free nickname derived from `base`
    ///
    /// A nickname already held by `record_id` counts as free.
    pub async fn unique(
        &self,
        storage: &OdmStorage,
        base: &str,
        record_id: Option<&str>,
    ) -> DomainResult<String> {
        let mut candidate = base.to_string();
        let mut attempt = 0_u64;
        loop {
            if candidate.chars().count() > self.max_length {
                return Err(DomainError::invalid_value(
                    "nickname",
                    format!("'{candidate}' exceeds the limit of {}", self.max_length),
                ));
            }
            match storage.nickname_owner(&candidate).await? {
                None => break,
                Some(owner) if record_id == Some(owner.as_str()) => break,
                Some(_) => {
                    attempt += 1;
                    candidate = format!("{base}-{attempt}");
                }
            }
        }

        if attempt > 0 {
            debug!(attempts = attempt, "Nickname de-duplicated");
        }
        Ok(candidate)
    }
}

#[async_trait]
impl FieldCodec for NicknameCodec {
    async fn encode(
        &self,
        storage: &OdmStorage,
        slot: Slot<'_>,
        input: FieldInput,
    ) -> DomainResult<Value> {
        let raw = match input {
            FieldInput::Value(Value::Null) => return Ok(Value::Null),
            FieldInput::Value(Value::String(raw)) if raw.is_empty() => return Ok(Value::Null),
            FieldInput::Value(Value::String(raw)) => raw,
            other => return Err(type_mismatch(slot.field, "string", &other)),
        };

        let base = self.base(&raw);
        if base.is_empty() {
            return Err(DomainError::invalid_value(
                slot.field,
                "must contain at least one letter or digit",
            ));
        }

        self.unique(storage, &base, slot.record_id)
            .await
            .map(Value::String)
    }

    async fn decode(&self, _storage: &OdmStorage, stored: &Value) -> DomainResult<FieldValue> {
        Ok(FieldValue::Value(stored.clone()))
    }

    fn is_textual(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::memory_storage;
    use serde_json::json;

    fn slot<'a>(current: &'a Value, is_new: bool) -> Slot<'a> {
        Slot {
            field: "password",
            current,
            record_id: None,
            is_new,
        }
    }

    #[tokio::test]
    async fn test_password_is_hashed() {
        let storage = memory_storage();
        let null = Value::Null;

        let stored = PasswordCodec
            .encode(&storage, slot(&null, true), "secret".into())
            .await
            .unwrap();
        let hash = stored.as_str().unwrap();
        assert_ne!(hash, "secret");
        assert!(storage.passwords().verify("secret", hash).unwrap());
    }

    #[tokio::test]
    async fn test_empty_password() {
        let storage = memory_storage();
        let null = Value::Null;

        // New record: random password
        let random = PasswordCodec
            .encode(&storage, slot(&null, true), "".into())
            .await
            .unwrap();
        assert!(storage.passwords().is_hash(random.as_str().unwrap()));

        // Existing record: previous hash kept
        let kept = PasswordCodec
            .encode(&storage, slot(&random, false), FieldInput::null())
            .await
            .unwrap();
        assert_eq!(kept, random);
    }

    #[tokio::test]
    async fn test_status_closed_set() {
        let storage = memory_storage();
        let null = Value::Null;
        let slot = Slot {
            field: "status",
            current: &null,
            record_id: None,
            is_new: true,
        };

        assert_eq!(
            StatusCodec.encode(&storage, slot, "waiting".into()).await.unwrap(),
            json!("waiting")
        );
        assert_eq!(
            StatusCodec.encode(&storage, slot, UserStatus::Disabled.into()).await.unwrap(),
            json!("disabled")
        );
        let err = StatusCodec
            .encode(&storage, slot, "banned".into())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidValue { .. }));
    }

    #[test]
    fn test_nickname_base() {
        let codec = NicknameCodec::new(32, 64);
        assert_eq!(codec.base("Alice Smith"), "alice-smith");
        assert_eq!(codec.base("Crème Brûlée"), "creme-brulee");
        assert_eq!(codec.base(&"x".repeat(40)).len(), 32);
        assert_eq!(codec.base("!!!"), "");
        assert_eq!(codec.base("ab cd").len(), 5);
        assert!(!NicknameCodec::new(3, 64).base("ab cd").ends_with('-'));
    }

    #[test]
    fn test_nickname_base_bounded_after_transliteration() {
        let codec = NicknameCodec::new(32, 64);
        let sharp = codec.base(&"ß".repeat(32));
        assert!(!sharp.is_empty());
        assert!(sharp.len() <= 32);
        assert!(codec.base(&"中".repeat(32)).len() <= 32);

        // The base never outgrows the maximum
        assert!(NicknameCodec::new(80, 16).base(&"x".repeat(100)).len() <= 16);
    }

    #[tokio::test]
    async fn test_nickname_without_collisions_is_kept() {
        let storage = memory_storage();
        let null = Value::Null;
        let slot = Slot {
            field: "nickname",
            current: &null,
            record_id: None,
            is_new: true,
        };

        let stored = NicknameCodec::new(32, 64)
            .encode(&storage, slot, "Bob".into())
            .await
            .unwrap();
        assert_eq!(stored, json!("bob"));

        let err = NicknameCodec::new(32, 64)
            .encode(&storage, slot, "...".into())
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}
