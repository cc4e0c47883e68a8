//! Driver seam: the operations the data-access layer needs from a server
//! connection, independent of the driver that provides them.

use std::sync::Arc;

use mongodb::bson::{Bson, Document};

use crate::connection::types::{FindDocumentsOptions, ReplaceOutcome};
use crate::error::Result;
use crate::models::ConnectionInfo;

/// A live, shareable connection to one endpoint.
///
/// Every call blocks the calling thread until the server answers. Callers run
/// these on the operation worker, never on the UI thread.
pub trait ServerHandle: Send + Sync {
    /// Cheap liveness probe.
    fn ping(&self) -> Result<()>;

    fn list_database_names(&self) -> Result<Vec<String>>;

    /// Raw `dbStats` reply.
    fn database_stats(&self, database: &str) -> Result<Document>;

    fn list_collection_names(&self, database: &str) -> Result<Vec<String>>;

    /// Raw `collStats` reply.
    fn collection_stats(&self, database: &str, collection: &str) -> Result<Document>;

    fn list_index_names(&self, database: &str, collection: &str) -> Result<Vec<String>>;

    fn find(
        &self,
        database: &str,
        collection: &str,
        options: FindDocumentsOptions,
    ) -> Result<Vec<Document>>;

    fn count(&self, database: &str, collection: &str, filter: Document) -> Result<u64>;

    fn distinct(
        &self,
        database: &str,
        collection: &str,
        field: &str,
        filter: Document,
    ) -> Result<Vec<Bson>>;

    fn aggregate(
        &self,
        database: &str,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> Result<Vec<Document>>;

    fn replace_one(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        replacement: Document,
    ) -> Result<ReplaceOutcome>;

    /// Release driver resources. Further calls may fail.
    fn close(&self);
}

/// Shared handle type stored by the pool and the session.
pub type Handle = Arc<dyn ServerHandle>;

/// Opens new server handles. The pool owns one and calls it on cache misses.
pub trait Connector: Send + Sync {
    fn open(&self, info: &ConnectionInfo) -> Result<Handle>;
}
