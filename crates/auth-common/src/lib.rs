//! # auth-common
//!
//! Shared utilities including configuration, password hashing, and telemetry.

pub mod config;
pub mod security;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    AppConfig, AppSettings, AuthSettings, ConfigError, DatabaseConfig, Environment, RedisConfig,
    StorageBackend,
};
pub use security::{hash_password, random_password, random_token, verify_password, PasswordService};
pub use telemetry::{
    init_tracing, init_tracing_with_config, try_init_tracing, try_init_tracing_with_config,
    TracingConfig, TracingError,
};
