//! Option and result types shared by the driver seam.

use mongodb::bson::Document;

/// Options for find operations
#[derive(Clone, Debug, Default)]
pub struct FindDocumentsOptions {
    pub filter: Option<Document>,
    pub sort: Option<Document>,
    pub projection: Option<Document>,
    pub skip: u64,
    /// `0` means no limit.
    pub limit: i64,
}

/// Counts reported by a single-document replace.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplaceOutcome {
    pub matched: u64,
    pub modified: u64,
}
