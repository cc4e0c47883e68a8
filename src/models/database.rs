//! Database and collection summaries built from server statistics.

use mongodb::bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::helpers::{format_bytes, format_number};

/// Summary of one database. Fields stay zero when statistics are unavailable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub name: String,
    pub size_on_disk: u64,
    pub collection_count: u64,
    pub data_size: u64,
    pub storage_size: u64,
    pub index_count: u64,
    pub index_size: u64,
}

impl DatabaseInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Build from a `dbStats` reply.
    pub fn from_stats(name: impl Into<String>, stats: &Document) -> Self {
        Self {
            name: name.into(),
            size_on_disk: stat_u64(stats, "storageSize"),
            collection_count: stat_u64(stats, "collections"),
            data_size: stat_u64(stats, "dataSize"),
            storage_size: stat_u64(stats, "storageSize"),
            index_count: stat_u64(stats, "indexes"),
            index_size: stat_u64(stats, "indexSize"),
        }
    }

    pub fn formatted_size(&self) -> String {
        format_bytes(self.size_on_disk)
    }

    pub fn formatted_collection_count(&self) -> String {
        format_number(self.collection_count)
    }
}

/// Summary of one collection, including its index names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub database: String,
    pub document_count: u64,
    pub data_size: u64,
    pub storage_size: u64,
    pub index_count: u64,
    pub index_size: u64,
    pub avg_document_size: f64,
    pub capped: bool,
    pub max_size: Option<u64>,
    pub max_documents: Option<u64>,
    pub indexes: Vec<String>,
}

impl CollectionInfo {
    pub fn new(name: impl Into<String>, database: impl Into<String>) -> Self {
        Self { name: name.into(), database: database.into(), ..Self::default() }
    }

    /// Build from a `collStats` reply and the collection's index names.
    pub fn from_stats(
        name: impl Into<String>,
        database: impl Into<String>,
        stats: &Document,
        indexes: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            database: database.into(),
            document_count: stat_u64(stats, "count"),
            data_size: stat_u64(stats, "size"),
            storage_size: stat_u64(stats, "storageSize"),
            index_count: indexes.len() as u64,
            index_size: stat_u64(stats, "totalIndexSize"),
            avg_document_size: stat_f64(stats, "avgObjSize").unwrap_or(0.0),
            capped: stats.get_bool("capped").unwrap_or(false),
            max_size: stat_f64(stats, "maxSize").map(to_u64),
            max_documents: stat_f64(stats, "max").map(to_u64),
            indexes,
        }
    }

    /// `database.collection`
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.database, self.name)
    }

    pub fn formatted_size(&self) -> String {
        format_bytes(self.data_size)
    }

    pub fn formatted_document_count(&self) -> String {
        format_number(self.document_count)
    }
}

/// Statistics replies mix Int32, Int64 and Double depending on server version.
fn stat_f64(stats: &Document, key: &str) -> Option<f64> {
    match stats.get(key)? {
        Bson::Int32(value) => Some(*value as f64),
        Bson::Int64(value) => Some(*value as f64),
        Bson::Double(value) => Some(*value),
        _ => None,
    }
}

fn stat_u64(stats: &Document, key: &str) -> u64 {
    stat_f64(stats, key).map(to_u64).unwrap_or(0)
}

fn to_u64(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 { value as u64 } else { 0 }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::doc;

    use super::*;

    #[test]
    fn database_info_reads_mixed_numeric_stats() {
        let stats = doc! {
            "collections": 3,
            "dataSize": 2048.0,
            "storageSize": 4096_i64,
            "indexes": 4,
            "indexSize": 1024,
        };
        let info = DatabaseInfo::from_stats("shop", &stats);
        assert_eq!(info.collection_count, 3);
        assert_eq!(info.data_size, 2048);
        assert_eq!(info.size_on_disk, 4096);
        assert_eq!(info.storage_size, 4096);
        assert_eq!(info.index_count, 4);
        assert_eq!(info.formatted_size(), "4.0 KB");
    }

    #[test]
    fn collection_info_uses_index_list_for_count() {
        let stats =
            doc! { "count": 10, "size": 500, "avgObjSize": 50.0, "capped": true, "max": 100 };
        let info = CollectionInfo::from_stats(
            "orders",
            "shop",
            &stats,
            vec!["_id_".to_string(), "customer_1".to_string()],
        );
        assert_eq!(info.document_count, 10);
        assert_eq!(info.index_count, 2);
        assert_eq!(info.avg_document_size, 50.0);
        assert!(info.capped);
        assert_eq!(info.max_documents, Some(100));
        assert_eq!(info.max_size, None);
        assert_eq!(info.namespace(), "shop.orders");
    }

    #[test]
    fn missing_stats_fall_back_to_zero() {
        let info = CollectionInfo::from_stats("empty", "shop", &Document::new(), Vec::new());
        assert_eq!(info, CollectionInfo::new("empty", "shop"));
    }
}
