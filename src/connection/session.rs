//! Stateful data-access session: one logical connection plus its histories.

use std::sync::Arc;
use std::time::Instant;

use mongodb::bson::{Document, doc};
use parking_lot::Mutex;

use crate::bson::{normalize_documents, normalize_value, resolve_document_id};
use crate::connection::handle::{Handle, ServerHandle};
use crate::connection::pool::ConnectionPool;
use crate::connection::types::FindDocumentsOptions;
use crate::error::{Error, Result};
use crate::models::{
    CollectionInfo, ConnectionInfo, ConnectionStatus, DEFAULT_HISTORY_CAPACITY, DatabaseInfo,
    HistoryBuffer, PerformanceRecord, QueryKind, QueryResult, QuerySpec,
};

/// Databases hidden from listings.
pub const SYSTEM_DATABASES: &[&str] = &["admin", "config", "local"];

/// Query and performance histories. Readers on other threads take a snapshot
/// without waiting for the session's in-flight network call.
pub struct SessionHistory {
    queries: Mutex<HistoryBuffer<QuerySpec>>,
    performance: Mutex<HistoryBuffer<PerformanceRecord>>,
}

impl SessionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            queries: Mutex::new(HistoryBuffer::new(capacity)),
            performance: Mutex::new(HistoryBuffer::new(capacity)),
        }
    }

    pub fn queries(&self) -> Vec<QuerySpec> {
        self.queries.lock().to_vec()
    }

    pub fn performance(&self) -> Vec<PerformanceRecord> {
        self.performance.lock().to_vec()
    }

    pub fn clear(&self) {
        self.queries.lock().clear();
        self.performance.lock().clear();
    }

    fn record_query(&self, spec: QuerySpec) {
        self.queries.lock().push(spec);
    }

    fn record_performance(&self, record: PerformanceRecord) {
        self.performance.lock().push(record);
    }
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

/// Owns the current handle, connection status and histories for one user session.
///
/// Not internally synchronized: the controller serializes access through the
/// operation worker.
pub struct DataAccessSession {
    pool: Arc<ConnectionPool>,
    handle: Option<Handle>,
    connection: Option<ConnectionInfo>,
    status: ConnectionStatus,
    history: Arc<SessionHistory>,
}

impl DataAccessSession {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self::with_history(pool, Arc::new(SessionHistory::default()))
    }

    pub fn with_history(pool: Arc<ConnectionPool>, history: Arc<SessionHistory>) -> Self {
        let status = ConnectionStatus::Disconnected;
        Self { pool, handle: None, connection: None, status, history }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn current_connection(&self) -> Option<&ConnectionInfo> {
        self.connection.as_ref()
    }

    pub fn history(&self) -> &Arc<SessionHistory> {
        &self.history
    }

    /// Connect through the pool. Returns whether the session is now connected.
    pub fn connect(&mut self, info: &ConnectionInfo) -> bool {
        self.try_connect(info).is_ok()
    }

    /// Like [`connect`](Self::connect) but keeps the failure for the caller.
    /// Timeouts leave the status at `Timeout`, every other failure at `Error`.
    pub fn try_connect(&mut self, info: &ConnectionInfo) -> Result<()> {
        let mut metrics = PerformanceRecord::start("connect");
        self.status = ConnectionStatus::Connecting;
        log::info!("Connecting to MongoDB at {}", info.address());

        match self.pool.acquire(info) {
            Ok(handle) => {
                self.handle = Some(handle);
                self.connection = Some(info.clone());
                self.status = ConnectionStatus::Connected;
                metrics.mark_completed();
                self.history.record_performance(metrics);
                log::info!("Successfully connected to MongoDB at {}", info.address());
                Ok(())
            }
            Err(err) => {
                self.handle = None;
                self.connection = None;
                self.status = if err.is_timeout() {
                    ConnectionStatus::Timeout
                } else {
                    ConnectionStatus::Error
                };
                metrics.mark_failed(err.to_string());
                self.history.record_performance(metrics);
                log::error!("Failed to connect to MongoDB at {}: {err}", info.address());
                Err(err)
            }
        }
    }

    /// Forget the current handle. The pooled handle stays open for reuse.
    pub fn disconnect(&mut self) {
        if let Some(info) = self.connection.take() {
            log::info!("Disconnected from MongoDB at {}", info.address());
        }
        self.handle = None;
        self.status = ConnectionStatus::Disconnected;
    }

    /// Probe the live handle. A failed probe moves the status to `Error`.
    pub fn is_connected(&mut self) -> bool {
        if self.status != ConnectionStatus::Connected {
            return false;
        }
        let Some(handle) = self.handle.as_ref() else {
            return false;
        };
        match handle.ping() {
            Ok(()) => true,
            Err(err) => {
                log::warn!("Connection check failed: {err}");
                self.status = ConnectionStatus::Error;
                false
            }
        }
    }

    fn live_handle(&mut self) -> Result<Handle> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        self.handle.clone().ok_or(Error::NotConnected)
    }

    /// User databases with statistics, sorted by name. System databases are hidden.
    pub fn list_databases(&mut self) -> Result<Vec<DatabaseInfo>> {
        let handle = self.live_handle()?;
        let mut metrics = PerformanceRecord::start("get_databases");

        let names = match handle.list_database_names() {
            Ok(names) => names,
            Err(err) => {
                log::error!("Failed to get databases: {err}");
                metrics.mark_failed(err.to_string());
                self.history.record_performance(metrics);
                return Err(err);
            }
        };

        let mut databases: Vec<DatabaseInfo> = names
            .into_iter()
            .filter(|name| !SYSTEM_DATABASES.contains(&name.as_str()))
            .map(|name| match handle.database_stats(&name) {
                Ok(stats) => DatabaseInfo::from_stats(name, &stats),
                Err(err) => {
                    log::warn!("Could not get stats for database {name}: {err}");
                    DatabaseInfo::new(name)
                }
            })
            .collect();
        databases.sort_by(|a, b| a.name.cmp(&b.name));

        metrics.mark_completed();
        self.history.record_performance(metrics);
        log::info!("Retrieved {} databases", databases.len());
        Ok(databases)
    }

    /// Collections of `database` with statistics and index names, sorted by name.
    pub fn list_collections(&mut self, database: &str) -> Result<Vec<CollectionInfo>> {
        let handle = self.live_handle()?;
        let mut metrics = PerformanceRecord::start("get_collections");

        let names = match handle.list_collection_names(database) {
            Ok(names) => names,
            Err(err) => {
                log::error!("Failed to get collections for {database}: {err}");
                metrics.mark_failed(err.to_string());
                self.history.record_performance(metrics);
                return Err(err);
            }
        };

        let mut collections: Vec<CollectionInfo> = names
            .into_iter()
            .map(|name| collection_info(handle.as_ref(), database, name))
            .collect();
        collections.sort_by(|a, b| a.name.cmp(&b.name));

        metrics.mark_completed();
        self.history.record_performance(metrics);
        log::info!("Retrieved {} collections from {database}", collections.len());
        Ok(collections)
    }

    /// Run `spec` and record its outcome on it, on success or failure.
    ///
    /// Successful runs are appended to the query history. Every ObjectId in the
    /// result is replaced with its hex string.
    pub fn execute(&mut self, spec: &mut QuerySpec) -> Result<QueryResult> {
        let handle = self.live_handle()?;
        let mut metrics = PerformanceRecord::start(format!("query_{}", spec.kind));
        let started = Instant::now();

        match dispatch(handle.as_ref(), spec) {
            Ok(result) => {
                let elapsed = started.elapsed();
                spec.record_success(elapsed, result.result_count());
                self.history.record_query(spec.clone());
                metrics.mark_completed();
                self.history.record_performance(metrics);
                log::info!(
                    "Query {} on {} executed successfully in {:.3}s",
                    spec.kind,
                    spec.namespace(),
                    elapsed.as_secs_f64()
                );
                Ok(result)
            }
            Err(err) => {
                spec.record_failure(started.elapsed(), err.to_string());
                metrics.mark_failed(err.to_string());
                self.history.record_performance(metrics);
                log::error!("Query execution failed on {}: {err}", spec.namespace());
                Err(err)
            }
        }
    }

    /// Replace the document whose `_id` is `id`. Returns whether one matched.
    ///
    /// `id` is tried as an ObjectId first and matched literally otherwise. Any
    /// `_id` inside `document` is ignored.
    pub fn update_document(
        &mut self,
        database: &str,
        collection: &str,
        id: &str,
        mut document: Document,
    ) -> Result<bool> {
        let handle = self.live_handle()?;
        let mut metrics = PerformanceRecord::start("update_document");
        document.remove("_id");
        let filter = doc! { "_id": resolve_document_id(id) };

        match handle.replace_one(database, collection, filter, document) {
            Ok(outcome) => {
                log::info!(
                    "Document update attempt - matched: {}, modified: {}",
                    outcome.matched,
                    outcome.modified
                );
                metrics.mark_completed();
                self.history.record_performance(metrics);
                Ok(outcome.matched > 0)
            }
            Err(err) => {
                log::error!("Failed to update document {id} in {database}.{collection}: {err}");
                metrics.mark_failed(err.to_string());
                self.history.record_performance(metrics);
                Err(Error::Operation(format!("Document update failed: {err}")))
            }
        }
    }

    pub fn query_history(&self) -> Vec<QuerySpec> {
        self.history.queries()
    }

    pub fn performance_metrics(&self) -> Vec<PerformanceRecord> {
        self.history.performance()
    }

    pub fn clear_history(&self) {
        self.history.clear();
        log::info!("Query history and performance metrics cleared");
    }
}

fn collection_info(handle: &dyn ServerHandle, database: &str, name: String) -> CollectionInfo {
    let stats = handle.collection_stats(database, &name);
    let indexes = handle.list_index_names(database, &name);
    match (stats, indexes) {
        (Ok(stats), Ok(indexes)) => CollectionInfo::from_stats(name, database, &stats, indexes),
        (Err(err), _) | (_, Err(err)) => {
            log::warn!("Could not get stats for collection {database}.{name}: {err}");
            CollectionInfo::new(name, database)
        }
    }
}

fn dispatch(handle: &dyn ServerHandle, spec: &QuerySpec) -> Result<QueryResult> {
    let (database, collection) = (spec.database.as_str(), spec.collection.as_str());
    match spec.kind {
        QueryKind::Find => {
            let options = FindDocumentsOptions {
                filter: Some(spec.query.clone()),
                sort: spec.sort.clone(),
                projection: spec.projection.clone(),
                skip: spec.skip,
                limit: spec.limit,
            };
            let mut documents = handle.find(database, collection, options)?;
            normalize_documents(&mut documents);
            Ok(QueryResult::Documents(documents))
        }
        QueryKind::Count => {
            let count = handle.count(database, collection, spec.query.clone())?;
            Ok(QueryResult::Count(count))
        }
        QueryKind::Distinct => {
            let (field, filter) = spec.distinct_target()?;
            let mut values = handle.distinct(database, collection, &field, filter)?;
            values.iter_mut().for_each(normalize_value);
            Ok(QueryResult::Values(values))
        }
        QueryKind::Aggregate => {
            let pipeline = spec.pipeline()?;
            let mut documents = handle.aggregate(database, collection, pipeline)?;
            normalize_documents(&mut documents);
            Ok(QueryResult::Documents(documents))
        }
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::{Bson, oid::ObjectId};

    use super::*;
    use crate::error::ErrorCategory;
    use crate::testing::{FakeConnector, FakeServer};

    fn session(server: &Arc<FakeServer>) -> DataAccessSession {
        let pool = Arc::new(ConnectionPool::new(FakeConnector::new(server.clone()), 10));
        DataAccessSession::new(pool)
    }

    fn connected(server: &Arc<FakeServer>) -> DataAccessSession {
        let mut session = session(server);
        assert!(session.connect(&ConnectionInfo::new("localhost", 27017)));
        session
    }

    #[test]
    fn connect_records_metrics_and_status() {
        let server = FakeServer::new();
        let mut session = session(&server);

        assert!(session.connect(&ConnectionInfo::new("localhost", 27017)));

        assert_eq!(session.status(), ConnectionStatus::Connected);
        let metrics = session.performance_metrics();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].operation, "connect");
        assert!(metrics[0].success);
    }

    #[test]
    fn failed_connect_distinguishes_timeouts() {
        let server = FakeServer::new();
        let mut session = session(&server);

        server.set_timing_out(true);
        assert!(!session.connect(&ConnectionInfo::new("localhost", 27017)));
        assert_eq!(session.status(), ConnectionStatus::Timeout);

        server.set_timing_out(false);
        server.set_down(true);
        assert!(!session.connect(&ConnectionInfo::new("localhost", 27017)));
        assert_eq!(session.status(), ConnectionStatus::Error);

        let metrics = session.performance_metrics();
        assert_eq!(metrics.len(), 2);
        assert!(metrics.iter().all(|record| !record.success && record.error.is_some()));
    }

    #[test]
    fn stale_connection_flips_to_error() {
        let server = FakeServer::new();
        let mut session = connected(&server);

        server.set_down(true);

        assert!(!session.is_connected());
        assert_eq!(session.status(), ConnectionStatus::Error);
        assert!(matches!(session.list_databases(), Err(Error::NotConnected)));
    }

    #[test]
    fn operations_require_connection() {
        let server = FakeServer::new();
        let mut session = session(&server);
        let mut spec = QuerySpec::find("shop", "orders", Document::new());

        let err = session.execute(&mut spec).unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Connection);
        assert!(!spec.is_executed());
        assert!(session.query_history().is_empty());
    }

    #[test]
    fn list_databases_hides_system_databases_and_sorts() {
        let server = FakeServer::new();
        server.insert("zoo", "animals", vec![doc! { "name": "otter" }]);
        server.insert("analytics", "events", vec![doc! { "kind": "click" }]);
        let mut session = connected(&server);

        let databases = session.list_databases().unwrap();

        let names: Vec<&str> = databases.iter().map(|db| db.name.as_str()).collect();
        assert_eq!(names, vec!["analytics", "zoo"]);
        assert_eq!(databases[0].size_on_disk, 4096);
    }

    #[test]
    fn stats_failures_fall_back_to_minimal_entries() {
        let server = FakeServer::new();
        server.insert("shop", "orders", vec![doc! { "a": 1 }]);
        server.insert("shop", "customers", vec![doc! { "b": 1 }]);
        server.deny_stats(true);
        let mut session = connected(&server);

        let databases = session.list_databases().unwrap();
        assert_eq!(databases, vec![DatabaseInfo::new("shop")]);

        let collections = session.list_collections("shop").unwrap();
        let names: Vec<&str> = collections.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["customers", "orders"]);
        assert_eq!(collections[0].document_count, 0);
    }

    #[test]
    fn list_collections_reads_stats_and_indexes() {
        let server = FakeServer::new();
        server.insert("shop", "orders", vec![doc! { "a": 1 }, doc! { "a": 2 }]);
        let mut session = connected(&server);

        let collections = session.list_collections("shop").unwrap();

        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].document_count, 2);
        assert_eq!(collections[0].indexes, vec!["_id_".to_string()]);
        assert_eq!(collections[0].index_count, 1);
    }

    #[test]
    fn find_normalizes_ids_and_records_history() {
        let server = FakeServer::new();
        let id = ObjectId::new();
        server.insert("shop", "orders", vec![doc! { "_id": id, "status": "open" }]);
        let mut session = connected(&server);
        let mut spec = QuerySpec::find("shop", "orders", doc! { "status": "open" });

        let result = session.execute(&mut spec).unwrap();

        let documents = result.documents().unwrap();
        assert_eq!(documents[0].get_str("_id").unwrap(), id.to_hex());
        assert_eq!(spec.result_count(), Some(1));
        assert!(spec.execution_time().is_some());
        assert_eq!(session.query_history(), vec![spec]);
    }

    #[test]
    fn count_on_empty_collection_has_no_result_count() {
        let server = FakeServer::new();
        let mut session = connected(&server);
        let mut spec = QuerySpec::new("shop", "empty", QueryKind::Count, Document::new());

        let result = session.execute(&mut spec).unwrap();

        assert_eq!(result, QueryResult::Count(0));
        assert!(spec.is_executed());
        assert_eq!(spec.result_count(), None);
    }

    #[test]
    fn distinct_defaults_to_id_and_normalizes() {
        let server = FakeServer::new();
        let (a, b) = (ObjectId::new(), ObjectId::new());
        server.insert("shop", "orders", vec![doc! { "_id": a }, doc! { "_id": b }]);
        let mut session = connected(&server);
        let mut spec = QuerySpec::new("shop", "orders", QueryKind::Distinct, Document::new());

        let result = session.execute(&mut spec).unwrap();

        assert_eq!(
            result,
            QueryResult::Values(vec![Bson::String(a.to_hex()), Bson::String(b.to_hex())])
        );
        assert_eq!(spec.result_count(), Some(2));
    }

    #[test]
    fn failed_query_records_error_and_skips_history() {
        let server = FakeServer::new();
        server.insert("shop", "orders", vec![doc! { "a": 1 }]);
        let mut session = connected(&server);
        let mut spec = QuerySpec::new(
            "shop",
            "orders",
            QueryKind::Aggregate,
            doc! { "pipeline": [ { "$bogus": {} } ] },
        );

        let err = session.execute(&mut spec).unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Operation);
        assert!(spec.error().is_some_and(|e| e.contains("$bogus")));
        assert!(session.query_history().is_empty());
        let last = session.performance_metrics().pop().unwrap();
        assert_eq!(last.operation, "query_aggregate");
        assert!(!last.success);
    }

    #[test]
    fn query_history_is_bounded() {
        let server = FakeServer::new();
        let pool = Arc::new(ConnectionPool::new(FakeConnector::new(server.clone()), 10));
        let mut session = DataAccessSession::with_history(pool, Arc::new(SessionHistory::new(3)));
        assert!(session.connect(&ConnectionInfo::new("localhost", 27017)));

        for _ in 0..5 {
            let mut spec = QuerySpec::new("shop", "orders", QueryKind::Count, Document::new());
            session.execute(&mut spec).unwrap();
        }

        assert_eq!(session.query_history().len(), 3);
        session.clear_history();
        assert!(session.query_history().is_empty());
        assert!(session.performance_metrics().is_empty());
    }

    #[test]
    fn update_document_matches_object_id_or_literal() {
        let server = FakeServer::new();
        let id = ObjectId::new();
        server.insert(
            "shop",
            "orders",
            vec![doc! { "_id": id, "qty": 1 }, doc! { "_id": "legacy-7", "qty": 1 }],
        );
        let mut session = connected(&server);

        let matched = session
            .update_document("shop", "orders", &id.to_hex(), doc! { "_id": "ignored", "qty": 5 })
            .unwrap();
        assert!(matched);

        let matched =
            session.update_document("shop", "orders", "legacy-7", doc! { "qty": 9 }).unwrap();
        assert!(matched);

        let stored = server.documents("shop", "orders");
        assert_eq!(stored[0], doc! { "_id": id, "qty": 5 });
        assert_eq!(stored[1], doc! { "_id": "legacy-7", "qty": 9 });

        let missing = ObjectId::new().to_hex();
        assert!(!session.update_document("shop", "orders", &missing, doc! {}).unwrap());
    }

    #[test]
    fn update_document_records_metrics() {
        let server = FakeServer::new();
        server.insert("shop", "orders", vec![doc! { "_id": "a", "qty": 1 }]);
        let mut session = connected(&server);

        session.update_document("shop", "orders", "a", doc! { "qty": 2 }).unwrap();
        session.update_document("shop", "orders", "zz", doc! { "qty": 2 }).unwrap();

        let updates: Vec<PerformanceRecord> = session
            .performance_metrics()
            .into_iter()
            .filter(|record| record.operation == "update_document")
            .collect();
        assert_eq!(updates.len(), 2);
        assert!(updates.iter().all(|record| record.success && record.finished_at.is_some()));
    }

    #[test]
    fn disconnect_keeps_pooled_handle() {
        let server = FakeServer::new();
        let connector = FakeConnector::new(server.clone());
        let pool = Arc::new(ConnectionPool::new(connector.clone(), 10));
        let mut session = DataAccessSession::new(pool.clone());
        let info = ConnectionInfo::new("localhost", 27017);
        assert!(session.connect(&info));

        session.disconnect();

        assert_eq!(session.status(), ConnectionStatus::Disconnected);
        assert!(session.current_connection().is_none());
        assert!(pool.contains(&info.endpoint_key()));
        assert!(session.connect(&info));
        assert_eq!(connector.opened(), 1);
    }
}
