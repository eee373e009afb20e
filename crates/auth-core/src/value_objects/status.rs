//! User status - the closed set of account states

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

/// Account status of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Waiting,
    Disabled,
}

impl UserStatus {
    /// Every status, in display order
    pub const fn all() -> [UserStatus; 3] {
        [Self::Active, Self::Waiting, Self::Disabled]
    }

    /// Stored code
    pub const fn code(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Waiting => "waiting",
            Self::Disabled => "disabled",
        }
    }

    /// Human-readable label
    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Waiting => "Waiting",
            Self::Disabled => "Disabled",
        }
    }

    /// Ordered `(code, label)` pairs
    pub fn options() -> Vec<(&'static str, &'static str)> {
        Self::all().iter().map(|s| (s.code(), s.label())).collect()
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for UserStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|status| status.code() == s)
            .ok_or_else(|| DomainError::invalid_value("status", format!("unknown status '{s}'")))
    }
}
