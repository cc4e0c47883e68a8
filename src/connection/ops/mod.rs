//! Driver-backed operations, grouped by concern. Each file extends `MongoHandle`.

pub mod aggregation;
pub mod documents;
pub mod stats;
