//! Domain errors - error types for the domain layer

use thiserror::Error;

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Not Found Errors
    // =========================================================================
    /// The lookup key is deliberately not carried: callers must not learn which
    /// identifier format was tried.
    #[error("User not found")]
    UserNotFound,

    #[error("Role not found: {0}")]
    RoleNotFound(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid value for field '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    // =========================================================================
    // Policy Errors
    // =========================================================================
    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    #[error("Deletion forbidden: {0}")]
    ForbidDeletion(String),

    // =========================================================================
    // Conflict Errors
    // =========================================================================
    #[error("Duplicate key in '{collection}' for index '{index}'")]
    DuplicateKey { collection: String, index: String },

    // =========================================================================
    // Infrastructure Errors (wrapped)
    // =========================================================================
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Create an invalid value error for a field
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a generic not found error
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Get an error code string for API responses
    pub fn code(&self) -> &'static str {
        match self {
            // Not Found
            Self::UserNotFound => "UNKNOWN_USER",
            Self::RoleNotFound(_) => "UNKNOWN_ROLE",
            Self::NotFound { .. } => "NOT_FOUND",

            // Validation
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::InvalidValue { .. } => "INVALID_VALUE",
            Self::TypeMismatch(_) => "TYPE_MISMATCH",

            // Policy
            Self::PolicyViolation(_) => "POLICY_VIOLATION",
            Self::ForbidDeletion(_) => "FORBID_DELETION",

            // Conflict
            Self::DuplicateKey { .. } => "DUPLICATE_KEY",

            // Infrastructure
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::CacheError(_) => "CACHE_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UserNotFound | Self::RoleNotFound(_) | Self::NotFound { .. }
        )
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::InvalidValue { .. } | Self::TypeMismatch(_)
        )
    }

    /// Check if this is a policy error
    pub fn is_policy(&self) -> bool {
        matches!(self, Self::PolicyViolation(_) | Self::ForbidDeletion(_))
    }

    /// Check if this is a conflict error
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }
}
