//! Data-access core for a MongoDB explorer.
//!
//! A UI builds a [`SessionController`], subscribes to its [`SessionEvent`]s and
//! calls its request methods. Database work runs on a single background worker
//! against handles shared through a [`ConnectionPool`].

pub mod bson;
pub mod connection;
pub mod error;
pub mod export;
pub mod helpers;
pub mod logging;
pub mod models;
pub mod schema;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{ConnectionPool, Connector, DataAccessSession, MongoConnector, ServerHandle};
pub use error::{Error, ErrorCategory, Result};
pub use export::ExportFormat;
pub use models::{
    CollectionInfo, ConnectionInfo, ConnectionStatus, DatabaseInfo, DocumentStats, QueryKind,
    QueryResult, QuerySpec,
};
pub use schema::SchemaProfiler;
pub use state::{
    AppConfig, ConfigManager, ControllerContext, ErrorInfo, OperationQueue, SessionController,
    SessionEvent, SessionState,
};
