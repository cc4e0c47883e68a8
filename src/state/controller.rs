//! SessionController: the boundary the UI talks to.
//!
//! Requests are checked against the cached [`SessionState`] on the caller's
//! thread and then queued; all database work happens on the operation worker.
//! Results come back through [`SessionEvent`]s in completion order.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak, mpsc};
use std::time::Duration;

use mongodb::bson::{Bson, Document, doc};
use parking_lot::Mutex;

use crate::bson::{parse_pipeline, parse_query_document};
use crate::connection::{
    ConnectionPool, Connector, DataAccessSession, MongoConnector, SessionHistory,
};
use crate::error::{Error, ErrorCategory, Result};
use crate::export::{self, ExportFormat};
use crate::helpers::{validate_connection_info, validate_query};
use crate::models::{
    CollectionInfo, ConnectionInfo, ConnectionStatus, DatabaseInfo, DocumentStats,
    PerformanceRecord, QueryKind, QueryResult, QuerySpec, RecentConnection,
};
use crate::schema::SchemaProfiler;
use crate::state::config::{ConfigManager, MAX_RECENT_CONNECTIONS};
use crate::state::events::{ErrorInfo, EventBus, SessionEvent};
use crate::state::queue::{OperationOutcome, OperationQueue, QueueHandle};
use crate::state::refresh::AutoRefreshTimer;
use crate::state::session_state::{DEFAULT_REFRESH_INTERVAL, LoadRequest, SessionState};
use crate::state::settings::{AppConfig, DatabaseConfig, QueryConfig};

/// Persists the recent-connections list. Called on the worker thread.
pub type SaveRecentFn = Box<dyn Fn(&[RecentConnection]) -> anyhow::Result<()> + Send + Sync>;

/// Everything the controller needs from the outside world at startup.
pub struct ControllerContext {
    pub database: DatabaseConfig,
    pub query: QueryConfig,
    pub recent_connections: Vec<RecentConnection>,
    save_recent: Option<SaveRecentFn>,
}

impl Default for ControllerContext {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl ControllerContext {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            database: config.database.clone(),
            query: config.query.clone(),
            recent_connections: Vec::new(),
            save_recent: None,
        }
    }

    /// Config, recent connections and a save callback backed by `manager`.
    pub fn from_manager(manager: &ConfigManager) -> Self {
        let config = manager.load_config();
        let recent = manager.load_recent_connections().unwrap_or_else(|err| {
            log::warn!("Failed to load recent connections: {err:#}");
            Vec::new()
        });
        let manager = manager.clone();
        Self::from_config(&config)
            .with_recent_connections(recent)
            .with_save_callback(move |recent| manager.save_recent_connections(recent))
    }

    pub fn with_recent_connections(mut self, recent: Vec<RecentConnection>) -> Self {
        self.recent_connections = recent;
        self
    }

    pub fn with_save_callback<F>(mut self, save: F) -> Self
    where
        F: Fn(&[RecentConnection]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.save_recent = Some(Box::new(save));
        self
    }
}

/// Result of one queued controller operation.
#[derive(Debug)]
pub enum OperationResult {
    Connected { info: ConnectionInfo, attempt: u64 },
    Disconnected,
    ConnectionTested { info: ConnectionInfo, ok: bool },
    Databases(Vec<DatabaseInfo>),
    Collections { database: String, collections: Vec<CollectionInfo> },
    Documents { request: LoadRequest, documents: Vec<Document>, stats: DocumentStats },
    Query { spec: QuerySpec, result: QueryResult, stats: Option<DocumentStats> },
    DocumentUpdated { database: String, collection: String, id: String, matched: bool },
    Exported { path: PathBuf, format: ExportFormat, records: u64 },
    RefreshSkipped,
}

type Queue = QueueHandle<OperationResult>;

struct ControllerInner {
    state: Mutex<SessionState>,
    session: Arc<Mutex<DataAccessSession>>,
    history: Arc<SessionHistory>,
    pool: Arc<ConnectionPool>,
    connector: Arc<dyn Connector>,
    events: EventBus,
    recent: Mutex<Vec<RecentConnection>>,
    save_recent: Option<SaveRecentFn>,
    query_config: QueryConfig,
    refresh: Mutex<Option<AutoRefreshTimer>>,
    /// Attempt stamp of the connect job that ran last on the worker.
    connect_job: AtomicU64,
}

/// Orchestrates connection, browsing, queries, edits, export and auto-refresh
/// for one user session.
pub struct SessionController {
    inner: Arc<ControllerInner>,
    queue: OperationQueue<OperationResult>,
    closed: bool,
}

impl SessionController {
    pub fn new(connector: Arc<dyn Connector>, context: ControllerContext) -> Result<Self> {
        let ControllerContext { database, query, mut recent_connections, save_recent } = context;
        recent_connections.truncate(MAX_RECENT_CONNECTIONS);

        let pool = Arc::new(ConnectionPool::new(connector.clone(), database.max_pooled_endpoints));
        let history = Arc::new(SessionHistory::new(query.max_query_history));
        let session =
            Arc::new(Mutex::new(DataAccessSession::with_history(pool.clone(), history.clone())));

        let inner = Arc::new(ControllerInner {
            state: Mutex::new(SessionState::with_query_defaults(
                query.clamp_limit(query.default_limit),
                query.default_skip,
            )),
            session,
            history,
            pool,
            connector,
            events: EventBus::new(),
            recent: Mutex::new(recent_connections),
            save_recent,
            query_config: query,
            refresh: Mutex::new(None),
            connect_job: AtomicU64::new(0),
        });

        let queue = OperationQueue::new({
            let inner = inner.clone();
            move |outcome, queue: &Queue| inner.handle_outcome(outcome, queue)
        })?;

        Ok(Self { inner, queue, closed: false })
    }

    /// Controller backed by the MongoDB driver.
    pub fn with_mongo(context: ControllerContext) -> Result<Self> {
        let connector = MongoConnector::new()?;
        Self::new(Arc::new(connector), context)
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> mpsc::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.inner.state.lock().clone()
    }

    pub fn recent_connections(&self) -> Vec<RecentConnection> {
        self.inner.recent.lock().clone()
    }

    pub fn query_history(&self) -> Vec<QuerySpec> {
        self.inner.history.queries()
    }

    pub fn performance_metrics(&self) -> Vec<PerformanceRecord> {
        self.inner.history.performance()
    }

    pub fn clear_history(&self) {
        self.inner.history.clear();
        log::info!("Query history and performance metrics cleared");
    }

    /// Name of the operation the worker is running, if any.
    pub fn current_operation(&self) -> Option<String> {
        self.queue.current_operation()
    }

    /// Block until every queued operation has been handled. Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.queue.wait_idle(timeout)
    }

    // =========================================================================
    // Connection
    // =========================================================================

    pub fn connect(&self, info: ConnectionInfo) -> Result<()> {
        if let Err(err) = validate_connection_info(&info) {
            self.inner.report("Connection failed", &err);
            return Err(err);
        }

        let attempt = {
            let mut state = self.inner.state.lock();
            state.status = ConnectionStatus::Connecting;
            state.next_connect_attempt()
        };
        self.inner.events.emit(SessionEvent::ConnectionStatusChanged(ConnectionStatus::Connecting));
        log::info!("Connecting to {}", info.display_name());

        let inner = self.inner.clone();
        self.queue.submit("connect", move || {
            inner.connect_job.store(attempt, Ordering::SeqCst);
            inner.session.lock().try_connect(&info)?;
            Ok(OperationResult::Connected { info, attempt })
        });
        Ok(())
    }

    /// Drop pending work, forget the selection and release the session handle.
    /// The state changes immediately; the pooled handle stays open for reuse.
    pub fn disconnect(&self) {
        let cleared = self.queue.clear_pending();
        if cleared > 0 {
            log::debug!("Dropped {cleared} pending operations on disconnect");
        }
        self.inner.stop_auto_refresh();
        self.inner.state.lock().clear_connection();
        let status = ConnectionStatus::Disconnected;
        self.inner.events.emit(SessionEvent::ConnectionStatusChanged(status));

        let session = self.inner.session.clone();
        self.queue.submit("disconnect", move || {
            session.lock().disconnect();
            Ok(OperationResult::Disconnected)
        });
        log::info!("Disconnected from database");
    }

    /// Try `info` on a throwaway pool without touching the current session.
    /// The outcome arrives as [`SessionEvent::ConnectionTested`].
    pub fn test_connection(&self, info: ConnectionInfo) -> Result<()> {
        if let Err(err) = validate_connection_info(&info) {
            self.inner.report("Connection test failed", &err);
            return Err(err);
        }

        let connector = self.inner.connector.clone();
        self.queue.submit("test_connection", move || {
            let pool = Arc::new(ConnectionPool::new(connector, 1));
            let mut session = DataAccessSession::new(pool.clone());
            let ok = match session.try_connect(&info) {
                Ok(()) => true,
                Err(err) => {
                    log::error!("Connection test failed: {err}");
                    false
                }
            };
            session.disconnect();
            pool.close_all();
            Ok(OperationResult::ConnectionTested { info, ok })
        });
        Ok(())
    }

    // =========================================================================
    // Browsing
    // =========================================================================

    pub fn load_databases(&self) -> Result<()> {
        self.inner.require_connected("Load databases failed")?;
        self.inner.enqueue_load_databases(&self.queue.handle());
        Ok(())
    }

    pub fn load_collections(&self, database: &str) -> Result<()> {
        self.inner.require_connected("Load collections failed")?;
        self.inner.state.lock().select(database, None);

        let session = self.inner.session.clone();
        let database = database.to_string();
        self.queue.submit("load_collections", move || {
            let collections = session.lock().list_collections(&database)?;
            Ok(OperationResult::Collections { database, collections })
        });
        Ok(())
    }

    /// Load documents for the selected collection. `None` arguments fall back
    /// to the configured defaults.
    pub fn load_documents(
        &self,
        database: &str,
        collection: &str,
        limit: Option<i64>,
        skip: Option<u64>,
        filter: Option<Document>,
    ) -> Result<()> {
        self.inner.require_connected("Load documents failed")?;

        let request = {
            let state = self.inner.state.lock();
            LoadRequest {
                database: database.to_string(),
                collection: collection.to_string(),
                limit: self.inner.query_config.clamp_limit(limit.unwrap_or(state.query_limit)),
                skip: skip.unwrap_or(state.query_skip),
                filter: filter.unwrap_or_default(),
            }
        };

        if let Err(err) = validate_query(&request.to_query_spec()) {
            self.inner.report("Load documents failed", &err);
            return Err(err);
        }

        {
            let mut state = self.inner.state.lock();
            state.select(database, Some(collection));
            state.last_load = Some(request.clone());
        }

        self.inner.enqueue_load_documents(&self.queue.handle(), "load_documents", request);
        Ok(())
    }

    /// Re-run the last document load, if any.
    pub fn refresh_current_view(&self) -> Result<()> {
        self.inner.require_connected("Refresh failed")?;
        let Some(request) = self.inner.state.lock().last_load.clone() else {
            return Ok(());
        };
        self.inner.enqueue_load_documents(&self.queue.handle(), "load_documents", request);
        Ok(())
    }

    // =========================================================================
    // Queries and edits
    // =========================================================================

    pub fn execute_custom_query(
        &self,
        database: &str,
        collection: &str,
        query: Document,
        kind: QueryKind,
        limit: Option<i64>,
        skip: Option<u64>,
    ) -> Result<()> {
        self.inner.require_connected("Query execution failed")?;

        let mut spec = {
            let state = self.inner.state.lock();
            QuerySpec::new(database, collection, kind, query)
                .with_limit(limit.unwrap_or(state.query_limit))
                .with_skip(skip.unwrap_or(state.query_skip))
        };
        let max_limit = self.inner.query_config.max_limit;
        if spec.limit > max_limit {
            log::debug!("Clamping query limit {} to {max_limit}", spec.limit);
            spec.limit = max_limit;
        }

        if let Err(err) = validate_query(&spec) {
            self.inner.report("Query execution failed", &err);
            return Err(err);
        }

        let session = self.inner.session.clone();
        self.queue.submit("execute_query", move || {
            let result = session.lock().execute(&mut spec)?;
            let stats = match (&spec.kind, result.documents()) {
                (QueryKind::Find, Some(documents)) => Some(SchemaProfiler::profile(documents)),
                _ => None,
            };
            Ok(OperationResult::Query { spec, result, stats })
        });
        Ok(())
    }

    /// Parse `text` as JSON or JSON5 and run it as a `kind` query. An
    /// aggregate may be written as a bare array of stages.
    pub fn execute_query_text(
        &self,
        database: &str,
        collection: &str,
        text: &str,
        kind: QueryKind,
        limit: Option<i64>,
        skip: Option<u64>,
    ) -> Result<()> {
        let parsed = if kind == QueryKind::Aggregate && text.trim_start().starts_with('[') {
            parse_pipeline(text).map(|stages| doc! { "pipeline": stages })
        } else {
            parse_query_document(text)
        };
        let query = match parsed {
            Ok(query) => query,
            Err(err) => {
                self.inner.report("Query execution failed", &err);
                return Err(err);
            }
        };
        self.execute_custom_query(database, collection, query, kind, limit, skip)
    }

    pub fn update_document(
        &self,
        database: &str,
        collection: &str,
        id: &str,
        document: Document,
    ) -> Result<()> {
        self.inner.require_connected("Update document failed")?;

        let session = self.inner.session.clone();
        let (database, collection, id) =
            (database.to_string(), collection.to_string(), id.to_string());
        self.queue.submit("update_document", move || {
            let matched = session.lock().update_document(&database, &collection, &id, document)?;
            Ok(OperationResult::DocumentUpdated { database, collection, id, matched })
        });
        Ok(())
    }

    /// Write `data` to `path` on the worker. Does not need a connection.
    pub fn export_data(&self, format: ExportFormat, data: Bson, path: impl Into<PathBuf>) {
        let path = path.into();
        self.queue.submit("export_data", move || {
            let records = export::export_data(format, &data, &path)?;
            Ok(OperationResult::Exported { path, format, records })
        });
    }

    // =========================================================================
    // Auto-refresh
    // =========================================================================

    /// Enable or disable periodic reloading of the last document load.
    /// The timer only runs while connected; a zero interval means the default.
    pub fn set_auto_refresh(&self, enabled: bool, interval: Duration) -> Result<()> {
        let interval = if interval.is_zero() { DEFAULT_REFRESH_INTERVAL } else { interval };
        let connected = {
            let mut state = self.inner.state.lock();
            state.auto_refresh = enabled;
            state.refresh_interval = interval;
            state.is_connected()
        };

        if enabled && connected {
            self.inner.start_auto_refresh(&self.queue.handle(), interval)
        } else {
            self.inner.stop_auto_refresh();
            Ok(())
        }
    }

    /// Stop the timer, finish queued work and close every pooled handle.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.inner.stop_auto_refresh();
        self.queue.shutdown();
        // A connect handled during shutdown may have restarted the timer.
        self.inner.stop_auto_refresh();
        self.inner.pool.close_all();
        log::info!("Session controller closed");
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.close();
    }
}

impl ControllerInner {
    fn require_connected(&self, message: &str) -> Result<()> {
        if self.state.lock().is_connected() {
            return Ok(());
        }
        let err = Error::NotConnected;
        self.report(message, &err);
        Err(err)
    }

    /// Emit an [`SessionEvent::ErrorOccurred`] with the current selection.
    fn report(&self, message: &str, err: &Error) {
        self.report_message(format!("{message}: {err}"), err.category(), None);
    }

    fn report_message(&self, message: String, category: ErrorCategory, detail: Option<&str>) {
        let info = {
            let mut state = self.state.lock();
            let mut info = ErrorInfo::new(message, category, state.error_context());
            if let Some(detail) = detail {
                info = info.with_detail(detail);
            }
            state.last_error_at = Some(info.timestamp);
            info
        };
        log::error!("{} [{}]", info.message, info.category);
        self.events.emit(SessionEvent::ErrorOccurred(info));
    }

    fn enqueue_load_databases(&self, queue: &Queue) {
        let session = self.session.clone();
        queue.submit("load_databases", move || {
            let databases = session.lock().list_databases()?;
            Ok(OperationResult::Databases(databases))
        });
    }

    fn enqueue_load_documents(&self, queue: &Queue, name: &str, request: LoadRequest) {
        let session = self.session.clone();
        let skip_when_offline = name == "auto_refresh";
        queue.submit(name, move || {
            let mut session = session.lock();
            if skip_when_offline && !session.is_connected() {
                return Ok(OperationResult::RefreshSkipped);
            }
            let mut spec = request.to_query_spec();
            let documents = session.execute(&mut spec)?.into_documents().unwrap_or_default();
            let stats = SchemaProfiler::profile(&documents);
            Ok(OperationResult::Documents { request, documents, stats })
        });
    }

    // =========================================================================
    // Auto-refresh
    // =========================================================================

    fn start_auto_refresh(self: &Arc<Self>, queue: &Queue, interval: Duration) -> Result<()> {
        let weak: Weak<ControllerInner> = Arc::downgrade(self);
        let queue = queue.clone();
        let timer = AutoRefreshTimer::start(interval, move || {
            let Some(inner) = weak.upgrade() else {
                return false;
            };
            inner.auto_refresh_tick(&queue)
        })?;

        let previous = self.refresh.lock().replace(timer);
        drop(previous);
        Ok(())
    }

    fn stop_auto_refresh(&self) {
        let timer = self.refresh.lock().take();
        if let Some(mut timer) = timer {
            timer.stop();
            log::info!("Auto-refresh stopped");
        }
    }

    /// Returns `false` once auto-refresh has been switched off.
    fn auto_refresh_tick(&self, queue: &Queue) -> bool {
        let request = {
            let state = self.state.lock();
            if !state.auto_refresh {
                return false;
            }
            if !state.is_connected() || !state.has_selection() {
                return true;
            }
            state.last_load.clone()
        };
        let Some(request) = request else {
            return true;
        };
        if !queue.is_idle() {
            log::debug!("Skipping auto-refresh, worker is busy");
            return true;
        }
        self.enqueue_load_documents(queue, "auto_refresh", request);
        true
    }

    // =========================================================================
    // Outcomes (worker thread)
    // =========================================================================

    fn handle_outcome(self: &Arc<Self>, outcome: OperationOutcome<OperationResult>, queue: &Queue) {
        match outcome {
            OperationOutcome::Completed { result, .. } => self.handle_result(result, queue),
            OperationOutcome::Failed { name, message, category } => {
                self.handle_failure(&name, message, category)
            }
        }
    }

    fn handle_result(self: &Arc<Self>, result: OperationResult, queue: &Queue) {
        match result {
            OperationResult::Connected { info, attempt } => {
                self.on_connected(info, attempt, queue)
            }
            OperationResult::Disconnected => {}
            OperationResult::ConnectionTested { info, ok } => {
                let outcome = if ok { "ok" } else { "failed" };
                log::info!("Connection test for {}: {outcome}", info.display_name());
                self.events.emit(SessionEvent::ConnectionTested { info, ok });
            }
            OperationResult::Databases(databases) => {
                if self.still_connected() {
                    self.events.emit(SessionEvent::DatabasesLoaded(databases));
                }
            }
            OperationResult::Collections { database, collections } => {
                if self.still_connected() {
                    self.events.emit(SessionEvent::CollectionsLoaded { database, collections });
                }
            }
            OperationResult::Documents { request, documents, stats } => {
                if self.still_connected() {
                    self.events.emit(SessionEvent::DocumentsLoaded {
                        database: request.database,
                        collection: request.collection,
                        documents,
                        stats,
                    });
                }
            }
            OperationResult::Query { spec, result, stats } => {
                if !self.still_connected() {
                    return;
                }
                self.state.lock().last_query = Some(spec.clone());
                let (database, collection) = (spec.database.clone(), spec.collection.clone());
                self.events.emit(SessionEvent::QueryExecuted(spec));
                if let (Some(stats), Some(documents)) = (stats, result.into_documents()) {
                    self.events.emit(SessionEvent::DocumentsLoaded {
                        database,
                        collection,
                        documents,
                        stats,
                    });
                }
            }
            OperationResult::DocumentUpdated { database, collection, id, matched } => {
                if matched {
                    log::info!("Document updated successfully in {database}.{collection}");
                } else {
                    log::warn!(
                        "Document update matched nothing for _id {id} in {database}.{collection}"
                    );
                }
                self.events.emit(SessionEvent::DocumentUpdated {
                    database,
                    collection,
                    id,
                    matched,
                });
            }
            OperationResult::Exported { path, format, records } => {
                log::info!("Data export completed successfully");
                self.events.emit(SessionEvent::DataExported { path, format, records });
            }
            OperationResult::RefreshSkipped => {
                log::debug!("Auto-refresh skipped, connection is not live");
            }
        }
        self.sync_status();
    }

    fn handle_failure(&self, name: &str, message: String, category: ErrorCategory) {
        if name == "connect" {
            let attempt = self.connect_job.load(Ordering::SeqCst);
            if !self.state.lock().is_current_attempt(attempt) {
                log::debug!("Ignoring stale connect failure: {message}");
                return;
            }
            let status = if category == ErrorCategory::Timeout {
                ConnectionStatus::Timeout
            } else {
                ConnectionStatus::Error
            };
            {
                let mut state = self.state.lock();
                state.status = status;
                state.current_connection = None;
            }
            self.events.emit(SessionEvent::ConnectionStatusChanged(status));
        } else {
            self.sync_status();
        }
        self.report_message(message, category, Some(name));
    }

    fn on_connected(self: &Arc<Self>, info: ConnectionInfo, attempt: u64, queue: &Queue) {
        let (auto_refresh, interval) = {
            let mut state = self.state.lock();
            if !state.is_current_attempt(attempt) {
                log::debug!("Ignoring stale connect result for {}", info.display_name());
                return;
            }
            state.status = ConnectionStatus::Connected;
            state.current_connection = Some(info.clone());
            (state.auto_refresh, state.refresh_interval)
        };

        self.record_recent(&info);
        self.events.emit(SessionEvent::ConnectionStatusChanged(ConnectionStatus::Connected));
        log::info!("Connected to database successfully");

        self.enqueue_load_databases(queue);

        if auto_refresh && let Err(err) = self.start_auto_refresh(queue, interval) {
            self.report("Auto-refresh failed to start", &err);
        }
    }

    fn still_connected(&self) -> bool {
        let connected = self.state.lock().is_connected();
        if !connected {
            log::debug!("Dropping result that arrived after disconnect");
        }
        connected
    }

    /// Adopt a failure status the session found while probing its handle.
    fn sync_status(&self) {
        let session_status = self.session.lock().status();
        if !matches!(session_status, ConnectionStatus::Error | ConnectionStatus::Timeout) {
            return;
        }
        {
            let mut state = self.state.lock();
            if state.status != ConnectionStatus::Connected {
                return;
            }
            state.status = session_status;
        }
        log::warn!("Connection lost, status is now {session_status}");
        self.events.emit(SessionEvent::ConnectionStatusChanged(session_status));
    }

    fn record_recent(&self, info: &ConnectionInfo) {
        let entry = info.to_recent();
        let snapshot = {
            let mut recent = self.recent.lock();
            recent.retain(|existing| !existing.same_endpoint(&entry));
            recent.insert(0, entry);
            recent.truncate(MAX_RECENT_CONNECTIONS);
            recent.clone()
        };

        if let Some(save) = &self.save_recent
            && let Err(err) = save(&snapshot)
        {
            log::error!("Failed to save recent connections: {err:#}");
        }
    }
}
