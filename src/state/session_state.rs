//! Application-level state owned by the SessionController.

use std::time::Duration;

use chrono::{DateTime, Utc};
use mongodb::bson::Document;
use serde::Serialize;

use crate::models::{ConnectionInfo, ConnectionStatus, DEFAULT_QUERY_LIMIT, QueryKind, QuerySpec};
use crate::state::events::ErrorContext;

/// Interval used when auto-refresh is enabled without an explicit one.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Parameters of the last document load, replayed by auto-refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadRequest {
    pub database: String,
    pub collection: String,
    pub limit: i64,
    pub skip: u64,
    pub filter: Document,
}

impl LoadRequest {
    /// A fresh, unexecuted find spec for this load.
    pub fn to_query_spec(&self) -> QuerySpec {
        QuerySpec::new(&self.database, &self.collection, QueryKind::Find, self.filter.clone())
            .with_limit(self.limit)
            .with_skip(self.skip)
    }
}

/// Snapshot of the controller's view of the session.
///
/// Fields are read-only outside the state module; transitions happen through
/// controller methods.
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub(super) status: ConnectionStatus,
    pub(super) current_connection: Option<ConnectionInfo>,
    pub(super) current_database: Option<String>,
    pub(super) current_collection: Option<String>,
    pub(super) auto_refresh: bool,
    pub(super) refresh_interval: Duration,
    pub(super) query_limit: i64,
    pub(super) query_skip: u64,
    pub(super) last_query: Option<QuerySpec>,
    pub(super) last_load: Option<LoadRequest>,
    pub(super) last_error_at: Option<DateTime<Utc>>,
    /// Stamp of the newest connect request. Results carrying an older stamp
    /// are stale.
    #[serde(skip)]
    pub(super) connect_attempt: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            current_connection: None,
            current_database: None,
            current_collection: None,
            auto_refresh: false,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            query_limit: DEFAULT_QUERY_LIMIT,
            query_skip: 0,
            last_query: None,
            last_load: None,
            last_error_at: None,
            connect_attempt: 0,
        }
    }
}

impl SessionState {
    pub(super) fn with_query_defaults(limit: i64, skip: u64) -> Self {
        Self { query_limit: limit, query_skip: skip, ..Self::default() }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }

    pub fn current_connection(&self) -> Option<&ConnectionInfo> {
        self.current_connection.as_ref()
    }

    pub fn current_database(&self) -> Option<&str> {
        self.current_database.as_deref()
    }

    pub fn current_collection(&self) -> Option<&str> {
        self.current_collection.as_deref()
    }

    /// Both a database and a collection are selected.
    pub fn has_selection(&self) -> bool {
        self.current_database.is_some() && self.current_collection.is_some()
    }

    pub fn auto_refresh(&self) -> bool {
        self.auto_refresh
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    pub fn query_limit(&self) -> i64 {
        self.query_limit
    }

    pub fn query_skip(&self) -> u64 {
        self.query_skip
    }

    pub fn last_query(&self) -> Option<&QuerySpec> {
        self.last_query.as_ref()
    }

    pub fn last_load(&self) -> Option<&LoadRequest> {
        self.last_load.as_ref()
    }

    pub fn last_error_at(&self) -> Option<DateTime<Utc>> {
        self.last_error_at
    }

    pub(super) fn error_context(&self) -> ErrorContext {
        ErrorContext {
            database: self.current_database.clone(),
            collection: self.current_collection.clone(),
            connection_status: self.status,
        }
    }

    pub(super) fn select(&mut self, database: &str, collection: Option<&str>) {
        self.current_database = Some(database.to_string());
        self.current_collection = collection.map(str::to_string);
    }

    /// Start a new connect attempt, invalidating any in flight.
    pub(super) fn next_connect_attempt(&mut self) -> u64 {
        self.connect_attempt += 1;
        self.connect_attempt
    }

    pub(super) fn is_current_attempt(&self, attempt: u64) -> bool {
        self.connect_attempt == attempt && self.status == ConnectionStatus::Connecting
    }

    pub(super) fn clear_connection(&mut self) {
        self.connect_attempt += 1;
        self.status = ConnectionStatus::Disconnected;
        self.current_connection = None;
        self.current_database = None;
        self.current_collection = None;
        self.last_load = None;
    }
}
