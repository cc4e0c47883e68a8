pub mod connection;
pub mod database;
pub mod metrics;
pub mod query;
pub mod stats;

pub use connection::{ConnectionInfo, ConnectionStatus, EndpointKey, RecentConnection};
pub use database::{CollectionInfo, DatabaseInfo};
pub use metrics::{DEFAULT_HISTORY_CAPACITY, HistoryBuffer, PerformanceRecord};
pub use query::{DEFAULT_QUERY_LIMIT, QueryKind, QueryOutcome, QueryResult, QuerySpec};
pub use stats::DocumentStats;
