//! MongoDB connection management and operations.
//!
//! This module provides:
//! - `handle`: the `ServerHandle` / `Connector` seam the rest of the crate talks to
//! - `mongo`: the driver-backed implementation of that seam
//! - `ops`: driver operations (documents, aggregation, stats)
//! - `pool`: `ConnectionPool`, one shared handle per endpoint
//! - `session`: `DataAccessSession`, the stateful per-user data-access layer

pub mod handle;
pub mod mongo;
pub mod ops;
pub mod pool;
pub mod session;
pub mod types;

pub use handle::{Connector, Handle, ServerHandle};
pub use mongo::{MongoConnector, MongoHandle};
pub use pool::{ConnectionPool, DEFAULT_POOL_CAPACITY};
pub use session::{DataAccessSession, SYSTEM_DATABASES, SessionHistory};
pub use types::{FindDocumentsOptions, ReplaceOutcome};
