// Connection configuration models

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 27017;
pub const DEFAULT_AUTH_DATABASE: &str = "admin";
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_SERVER_SELECTION_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_MAX_POOL_SIZE: u32 = 50;

/// Parameters for reaching one MongoDB endpoint.
///
/// The password never leaves the process: it is skipped by serde and redacted
/// from `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    #[serde(default)]
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(skip)]
    pub password: Option<String>,
    pub auth_database: String,
    #[serde(default)]
    pub auth_enabled: bool,
    #[serde(default)]
    pub tls_enabled: bool,
    #[serde(default)]
    pub tls_ca_file: Option<PathBuf>,
    pub connect_timeout_ms: u64,
    pub server_selection_timeout_ms: u64,
    pub max_pool_size: u32,
}

impl Default for ConnectionInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            username: None,
            password: None,
            auth_database: DEFAULT_AUTH_DATABASE.to_string(),
            auth_enabled: false,
            tls_enabled: false,
            tls_ca_file: None,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            server_selection_timeout_ms: DEFAULT_SERVER_SELECTION_TIMEOUT_MS,
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
        }
    }
}

impl ConnectionInfo {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port, ..Self::default() }
    }

    /// Enable authentication with the given credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self.auth_enabled = true;
        self
    }

    pub fn with_auth_database(mut self, auth_database: impl Into<String>) -> Self {
        self.auth_database = auth_database.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Pool key identifying this endpoint.
    pub fn endpoint_key(&self) -> EndpointKey {
        EndpointKey {
            host: self.host.clone(),
            port: self.port,
            auth_database: self.auth_database.clone(),
        }
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() { self.address() } else { self.name.clone() }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn server_selection_timeout(&self) -> Duration {
        Duration::from_millis(self.server_selection_timeout_ms)
    }

    pub fn to_recent(&self) -> RecentConnection {
        RecentConnection {
            name: self.display_name(),
            host: self.host.clone(),
            port: self.port,
            auth_enabled: self.auth_enabled,
            username: self.username.clone(),
            auth_database: self.auth_database.clone(),
        }
    }
}

impl fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "*****"))
            .field("auth_database", &self.auth_database)
            .field("auth_enabled", &self.auth_enabled)
            .field("tls_enabled", &self.tls_enabled)
            .field("tls_ca_file", &self.tls_ca_file)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("server_selection_timeout_ms", &self.server_selection_timeout_ms)
            .field("max_pool_size", &self.max_pool_size)
            .finish()
    }
}

/// Identity of a pooled endpoint: host, port and authentication database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointKey {
    pub host: String,
    pub port: u16,
    pub auth_database: String,
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.host, self.port, self.auth_database)
    }
}

/// Recently used connection, persisted without secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentConnection {
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub auth_enabled: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default = "default_auth_database")]
    pub auth_database: String,
}

fn default_auth_database() -> String {
    DEFAULT_AUTH_DATABASE.to_string()
}

impl RecentConnection {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Recent entries are deduplicated by host and port only.
    pub fn same_endpoint(&self, other: &RecentConnection) -> bool {
        self.host == other.host && self.port == other.port
    }

    /// Rebuild connection parameters. The password must be supplied again.
    pub fn to_connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            name: self.name.clone(),
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            auth_database: self.auth_database.clone(),
            auth_enabled: self.auth_enabled,
            ..ConnectionInfo::default()
        }
    }
}

/// Connection lifecycle state shared by the session and the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
    Timeout,
}

impl ConnectionStatus {
    pub fn label(self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
            ConnectionStatus::Timeout => "timeout",
        }
    }

    pub fn is_connected(self) -> bool {
        self == ConnectionStatus::Connected
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
