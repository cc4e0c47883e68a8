//! Application settings: defaults, file overrides and environment overrides.

use serde::{Deserialize, Serialize};

use crate::models::connection::{
    DEFAULT_AUTH_DATABASE, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_HOST, DEFAULT_MAX_POOL_SIZE,
    DEFAULT_PORT, DEFAULT_SERVER_SELECTION_TIMEOUT_MS,
};
use crate::models::{ConnectionInfo, DEFAULT_HISTORY_CAPACITY, DEFAULT_QUERY_LIMIT};

/// Complete application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection defaults offered to new connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_host")]
    pub default_host: String,
    #[serde(default = "default_port")]
    pub default_port: u16,
    #[serde(default = "default_auth_db")]
    pub default_auth_db: String,
    #[serde(default = "default_timeout_ms")]
    pub connection_timeout_ms: u64,
    /// Advisory only: the driver exposes no per-socket timeout.
    #[serde(default = "default_timeout_ms")]
    pub socket_timeout_ms: u64,
    #[serde(default = "default_server_selection_timeout_ms")]
    pub server_selection_timeout_ms: u64,
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,
    #[serde(default = "default_max_pooled_endpoints")]
    pub max_pooled_endpoints: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            default_host: default_host(),
            default_port: default_port(),
            default_auth_db: default_auth_db(),
            connection_timeout_ms: default_timeout_ms(),
            socket_timeout_ms: default_timeout_ms(),
            server_selection_timeout_ms: default_server_selection_timeout_ms(),
            max_pool_size: default_max_pool_size(),
            max_pooled_endpoints: default_max_pooled_endpoints(),
        }
    }
}

impl DatabaseConfig {
    /// A connection pre-filled with these defaults.
    pub fn default_connection(&self) -> ConnectionInfo {
        let mut info = ConnectionInfo::new(&self.default_host, self.default_port)
            .with_auth_database(&self.default_auth_db);
        info.connect_timeout_ms = self.connection_timeout_ms;
        info.server_selection_timeout_ms = self.server_selection_timeout_ms;
        info.max_pool_size = self.max_pool_size;
        info
    }
}

/// Query execution limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_limit")]
    pub default_limit: i64,
    #[serde(default = "default_max_limit")]
    pub max_limit: i64,
    #[serde(default)]
    pub default_skip: u64,
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
    #[serde(default = "default_max_query_history")]
    pub max_query_history: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            default_skip: 0,
            query_timeout_ms: default_query_timeout_ms(),
            max_query_history: default_max_query_history(),
        }
    }
}

impl QueryConfig {
    /// Cap a requested limit at `max_limit`. Negative limits pass through so
    /// query validation can reject them.
    pub fn clamp_limit(&self, limit: i64) -> i64 {
        limit.min(self.max_limit.max(0))
    }
}

/// Log verbosity, named the way users write it in config files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

impl LoggingConfig {
    /// `env_logger` filter for the configured level. Unknown levels map to `info`.
    pub fn filter(&self) -> &'static str {
        match self.level.to_ascii_uppercase().as_str() {
            "TRACE" => "trace",
            "DEBUG" => "debug",
            "WARN" | "WARNING" => "warn",
            "ERROR" | "CRITICAL" => "error",
            "OFF" => "off",
            _ => "info",
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_auth_db() -> String {
    DEFAULT_AUTH_DATABASE.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_server_selection_timeout_ms() -> u64 {
    DEFAULT_SERVER_SELECTION_TIMEOUT_MS
}

fn default_max_pool_size() -> u32 {
    DEFAULT_MAX_POOL_SIZE
}

fn default_max_pooled_endpoints() -> usize {
    crate::connection::DEFAULT_POOL_CAPACITY
}

fn default_limit() -> i64 {
    DEFAULT_QUERY_LIMIT
}

fn default_max_limit() -> i64 {
    1000
}

fn default_query_timeout_ms() -> u64 {
    30_000
}

fn default_max_query_history() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

fn default_log_level() -> String {
    "INFO".to_string()
}

// =========================================================================
// Overrides
// =========================================================================

/// Partial configuration as read from `config.json`. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverrides {
    #[serde(default)]
    pub database: Option<DatabaseOverrides>,
    #[serde(default)]
    pub query: Option<QueryOverrides>,
    #[serde(default)]
    pub logging: Option<LoggingOverrides>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseOverrides {
    pub default_host: Option<String>,
    pub default_port: Option<u16>,
    pub default_auth_db: Option<String>,
    pub connection_timeout_ms: Option<u64>,
    pub socket_timeout_ms: Option<u64>,
    pub server_selection_timeout_ms: Option<u64>,
    pub max_pool_size: Option<u32>,
    pub max_pooled_endpoints: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryOverrides {
    pub default_limit: Option<i64>,
    pub max_limit: Option<i64>,
    pub default_skip: Option<u64>,
    pub query_timeout_ms: Option<u64>,
    pub max_query_history: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingOverrides {
    pub level: Option<String>,
}

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

impl DatabaseConfig {
    pub fn merge(&mut self, overrides: DatabaseOverrides) {
        set(&mut self.default_host, overrides.default_host);
        set(&mut self.default_port, overrides.default_port);
        set(&mut self.default_auth_db, overrides.default_auth_db);
        set(&mut self.connection_timeout_ms, overrides.connection_timeout_ms);
        set(&mut self.socket_timeout_ms, overrides.socket_timeout_ms);
        set(&mut self.server_selection_timeout_ms, overrides.server_selection_timeout_ms);
        set(&mut self.max_pool_size, overrides.max_pool_size);
        set(&mut self.max_pooled_endpoints, overrides.max_pooled_endpoints);
    }
}

impl QueryConfig {
    pub fn merge(&mut self, overrides: QueryOverrides) {
        set(&mut self.default_limit, overrides.default_limit);
        set(&mut self.max_limit, overrides.max_limit);
        set(&mut self.default_skip, overrides.default_skip);
        set(&mut self.query_timeout_ms, overrides.query_timeout_ms);
        set(&mut self.max_query_history, overrides.max_query_history);
    }
}

impl LoggingConfig {
    pub fn merge(&mut self, overrides: LoggingOverrides) {
        set(&mut self.level, overrides.level);
    }
}

impl AppConfig {
    pub fn merge(&mut self, overrides: ConfigOverrides) {
        if let Some(database) = overrides.database {
            self.database.merge(database);
        }
        if let Some(query) = overrides.query {
            self.query.merge(query);
        }
        if let Some(logging) = overrides.logging {
            self.logging.merge(logging);
        }
    }

    /// Apply `MONGO_HOST`, `MONGO_PORT`, `MONGO_AUTH_DB` and `LOG_LEVEL` from
    /// the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Like [`apply_env`](Self::apply_env) with a custom variable lookup.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let present = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if let Some(host) = present("MONGO_HOST") {
            self.database.default_host = host;
        }
        if let Some(port) = present("MONGO_PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.database.default_port = port,
                Err(err) => log::warn!("Ignoring invalid MONGO_PORT {port:?}: {err}"),
            }
        }
        if let Some(auth_db) = present("MONGO_AUTH_DB") {
            self.database.default_auth_db = auth_db;
        }
        if let Some(level) = present("LOG_LEVEL") {
            self.logging.level = level.to_ascii_uppercase();
        }
    }
}
