//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file when
//! present).

use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub storage: StorageBackend,
    /// Required when `storage` is `postgres`
    pub database: Option<DatabaseConfig>,
    /// Enables the finder cache and event publishing when set
    pub redis: Option<RedisConfig>,
    pub auth: AuthSettings,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default)]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" => Ok(Self::Development),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Which document store backs the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(format!("unknown storage backend '{other}'")),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: u32,
}

/// Identity model settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthSettings {
    pub login_max_length: usize,
    pub nickname_max_length: usize,
    /// Nickname candidates are truncated to this many characters before
    /// de-duplication suffixes are appended
    pub nickname_base_length: usize,
    pub name_max_length: usize,
    pub position_max_length: usize,
    pub description_max_length: usize,
    pub phone_max_length: usize,
    pub address_max_length: usize,
    /// Provision a Gravatar picture for users without one
    pub gravatar_fallback: bool,
    pub gravatar_size: u32,
    /// Default finder cache TTL in seconds
    pub finder_cache_ttl: u64,
    /// Roles created by the provisioning binary
    pub default_roles: Vec<String>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            login_max_length: 64,
            nickname_max_length: 64,
            nickname_base_length: 32,
            name_max_length: 64,
            position_max_length: 64,
            description_max_length: 1024,
            phone_max_length: 32,
            address_max_length: 64,
            gravatar_fallback: true,
            gravatar_size: 512,
            finder_cache_ttl: 60,
            default_roles: ["anonymous", "user", "admin", "dev"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "auth-odm".to_string()
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn default_redis_max_connections() -> u32 {
    10
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or
    /// a variable holds an unparsable value
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);
        let defaults = AuthSettings::default();

        let storage: StorageBackend = vars.parse_or("STORAGE_BACKEND", StorageBackend::default())?;

        let database = match vars.get("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: vars
                    .parse_or("DATABASE_MAX_CONNECTIONS", default_max_connections())?,
                min_connections: vars
                    .parse_or("DATABASE_MIN_CONNECTIONS", default_min_connections())?,
            }),
            None if storage == StorageBackend::Postgres => {
                return Err(ConfigError::MissingVar("DATABASE_URL"))
            }
            None => None,
        };

        let redis = match vars.get("REDIS_URL") {
            Some(url) => Some(RedisConfig {
                url,
                max_connections: vars
                    .parse_or("REDIS_MAX_CONNECTIONS", default_redis_max_connections())?,
            }),
            None => None,
        };

        Ok(Self {
            app: AppSettings {
                name: vars.get("APP_NAME").unwrap_or_else(default_app_name),
                env: vars.parse_or("APP_ENV", Environment::default())?,
            },
            storage,
            database,
            redis,
            auth: AuthSettings {
                login_max_length: vars
                    .parse_or("AUTH_LOGIN_MAX_LENGTH", defaults.login_max_length)?,
                nickname_max_length: vars
                    .parse_or("AUTH_NICKNAME_MAX_LENGTH", defaults.nickname_max_length)?,
                nickname_base_length: vars
                    .parse_or("AUTH_NICKNAME_BASE_LENGTH", defaults.nickname_base_length)?,
                name_max_length: vars.parse_or("AUTH_NAME_MAX_LENGTH", defaults.name_max_length)?,
                position_max_length: vars
                    .parse_or("AUTH_POSITION_MAX_LENGTH", defaults.position_max_length)?,
                description_max_length: vars
                    .parse_or("AUTH_DESCRIPTION_MAX_LENGTH", defaults.description_max_length)?,
                phone_max_length: vars
                    .parse_or("AUTH_PHONE_MAX_LENGTH", defaults.phone_max_length)?,
                address_max_length: vars
                    .parse_or("AUTH_ADDRESS_MAX_LENGTH", defaults.address_max_length)?,
                gravatar_fallback: vars
                    .parse_or("AUTH_GRAVATAR_FALLBACK", defaults.gravatar_fallback)?,
                gravatar_size: vars.parse_or("AUTH_GRAVATAR_SIZE", defaults.gravatar_size)?,
                finder_cache_ttl: vars
                    .parse_or("AUTH_FINDER_CACHE_TTL", defaults.finder_cache_ttl)?,
                default_roles: vars
                    .get("AUTH_DEFAULT_ROLES")
                    .map(|s| {
                        s.split(',')
                            .map(str::trim)
                            .filter(|r| !r.is_empty())
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or(defaults.default_roles),
            },
        })
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.is_empty())
    }

    fn parse_or<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            Some(raw) => raw
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidValue(name, e.to_string())),
            None => Ok(default),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
