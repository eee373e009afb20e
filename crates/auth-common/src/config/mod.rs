//! Configuration structs

mod app_config;

pub use app_config::{
    AppConfig, AppSettings, AuthSettings, ConfigError, DatabaseConfig, Environment, RedisConfig,
    StorageBackend,
};
