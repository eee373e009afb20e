//! Object ID - 96-bit storage-assigned document reference
//!
//! Structure (big-endian, rendered as 24 lowercase hex characters):
//! - Bytes 0-3:  Timestamp (seconds since Unix epoch)
//! - Bytes 4-8:  Per-generator random value
//! - Bytes 9-11: Counter (wraps at 2^24)

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Storage-assigned document reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Create an ObjectId from raw bytes
    #[inline]
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes
    #[inline]
    pub const fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// Extract timestamp (seconds since Unix epoch)
    #[inline]
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// Convert timestamp to DateTime<Utc>
    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        use chrono::{TimeZone, Utc};
        Utc.timestamp_opt(i64::from(self.timestamp()), 0)
            .single()
            .unwrap_or_default()
    }

    /// Parse from the 24-character hex representation
    pub fn parse(s: &str) -> Result<Self, ObjectIdParseError> {
        if s.len() != 24 {
            return Err(ObjectIdParseError::InvalidLength(s.len()));
        }
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| ObjectIdParseError::InvalidHex)?;
        Ok(Self(bytes))
    }
}

/// Error when parsing an ObjectId from string
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ObjectIdParseError {
    #[error("object id must be 24 hex characters, got {0}")]
    InvalidLength(usize),

    #[error("object id contains non-hex characters")]
    InvalidHex,
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl std::str::FromStr for ObjectId {
    type Err = ObjectIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectId::parse(s)
    }
}

impl Serialize for ObjectId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ObjectId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Thread-safe ObjectId generator
///
/// Uniqueness across processes relies on the random component; within a
/// process the counter guarantees 2^24 distinct ids per second.
pub struct ObjectIdGenerator {
    random: [u8; 5],
    counter: AtomicU32,
}

impl ObjectIdGenerator {
    /// Create a new generator with a fresh random component
    pub fn new() -> Self {
        Self {
            random: rand::random(),
            counter: AtomicU32::new(rand::random::<u32>() & 0x00FF_FFFF),
        }
    }

    /// Generate a new unique ObjectId
    pub fn generate(&self) -> ObjectId {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        let count = self.counter.fetch_add(1, Ordering::Relaxed) & 0x00FF_FFFF;

        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&self.random);
        bytes[9..12].copy_from_slice(&count.to_be_bytes()[1..4]);
        ObjectId(bytes)
    }
}

impl Default for ObjectIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
