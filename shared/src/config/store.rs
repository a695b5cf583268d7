//! Store connection configuration.
//!
//! Values come from environment variables with sensible defaults; the CLI
//! layers its flags on top.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use validator::Validate;

/// Default path of the DuckDB database file, relative to the working
/// directory.
pub const DEFAULT_DB_PATH: &str = "../mo11y/mo11y.duckdb";
/// Default store URL.
pub const DEFAULT_URL: &str = "http://localhost:8123";
/// Default database name.
pub const DEFAULT_DATABASE: &str = "mo11y";
/// Default user.
pub const DEFAULT_USER: &str = "default";
/// Default bound on one section's store round trip, in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable holds an unusable value.
    #[error("Invalid value for {var}: '{value}'")]
    InvalidValue {
        /// The variable name.
        var: &'static str,
        /// The rejected value.
        value: String,
    },

    /// Validation failed with details.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Which store implementation to read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// A local DuckDB database file, opened read-only.
    #[default]
    DuckDb,
    /// A `ClickHouse` server reached over HTTP.
    ClickHouse,
}

impl StoreBackend {
    /// The name accepted by `MO11Y_STORE` and `--store`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DuckDb => "duckdb",
            Self::ClickHouse => "clickhouse",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "duckdb" => Ok(Self::DuckDb),
            "clickhouse" => Ok(Self::ClickHouse),
            _ => Err(ConfigError::InvalidValue {
                var: "MO11Y_STORE",
                value: s.to_string(),
            }),
        }
    }
}

/// Connection settings for the telemetry store.
///
/// # Environment Variables
///
/// - `MO11Y_STORE`: `duckdb` or `clickhouse` (default: "duckdb")
/// - `MO11Y_DB_PATH`: DuckDB file (default: "../mo11y/mo11y.duckdb")
/// - `MO11Y_DB_URL`: Store URL (default: <http://localhost:8123>)
/// - `MO11Y_DB_NAME`: Database name (default: "mo11y")
/// - `MO11Y_DB_USER`: Database user (default: "default")
/// - `MO11Y_DB_PASSWORD`: Database password (default: empty)
/// - `MO11Y_QUERY_TIMEOUT_SECS`: Per-section query bound (default: 30)
///
/// # Example
///
/// ```
/// use shared::config::StoreConfig;
///
/// let config = StoreConfig::default().with_database("telemetry");
/// assert!(config.validate_config().is_ok());
/// assert_eq!(config.query_timeout().as_secs(), 30);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct StoreConfig {
    /// Store implementation.
    pub backend: StoreBackend,

    /// DuckDB database file.
    pub db_path: PathBuf,

    /// `ClickHouse` URL.
    #[validate(url(message = "Store URL must be a valid URL"))]
    pub url: String,

    /// Database name.
    #[validate(length(min = 1, message = "Database name cannot be empty"))]
    pub database: String,

    /// Username for authentication.
    pub user: String,

    /// Password for authentication.
    pub password: String,

    /// Bound on one section's store round trip, in seconds.
    #[validate(range(min = 1, message = "Query timeout must be at least one second"))]
    pub query_timeout_secs: u64,
}

impl StoreConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `MO11Y_STORE` names an unknown store or
    /// `MO11Y_QUERY_TIMEOUT_SECS` is not a whole number of seconds.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or timeout variable cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let query_timeout_secs = match lookup("MO11Y_QUERY_TIMEOUT_SECS") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    var: "MO11Y_QUERY_TIMEOUT_SECS",
                    value,
                })?,
            None => defaults.query_timeout_secs,
        };

        let backend = match lookup("MO11Y_STORE") {
            Some(value) => value.parse()?,
            None => defaults.backend,
        };

        Ok(Self {
            backend,
            db_path: lookup("MO11Y_DB_PATH").map_or(defaults.db_path, PathBuf::from),
            url: lookup("MO11Y_DB_URL").unwrap_or(defaults.url),
            database: lookup("MO11Y_DB_NAME").unwrap_or(defaults.database),
            user: lookup("MO11Y_DB_USER").unwrap_or(defaults.user),
            password: lookup("MO11Y_DB_PASSWORD").unwrap_or(defaults.password),
            query_timeout_secs,
        })
    }

    /// Sets the store implementation.
    #[must_use]
    pub fn with_backend(mut self, backend: StoreBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Sets the DuckDB database file.
    #[must_use]
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// Sets the store URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Sets the database name.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Sets the per-section query bound.
    #[must_use]
    pub fn with_query_timeout_secs(mut self, secs: u64) -> Self {
        self.query_timeout_secs = secs;
        self
    }

    /// Returns the per-section query bound.
    #[must_use]
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed, the database name is empty
    /// or the timeout is zero.
    pub fn validate_config(&self) -> Result<(), ConfigError> {
        self.validate()?;
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            url: DEFAULT_URL.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            user: DEFAULT_USER.to_string(),
            password: String::new(),
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }
}
