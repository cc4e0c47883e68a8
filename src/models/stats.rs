//! Shape summary of a result set.

use std::collections::BTreeMap;

use serde::Serialize;

/// Field-level profile of a batch of documents, produced by the schema profiler.
///
/// Maps are ordered by field name so renderings are stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentStats {
    pub total_count: usize,
    /// Number of documents containing each top-level field.
    pub field_frequency: BTreeMap<String, usize>,
    /// Per field, how often each type label occurred.
    pub field_types: BTreeMap<String, BTreeMap<String, usize>>,
    /// Up to five distinct stringified primitive values per field.
    pub sample_values: BTreeMap<String, Vec<String>>,
    /// Fields present in exactly one document.
    pub unique_fields: Vec<String>,
    /// Fields present in every document.
    pub common_fields: Vec<String>,
    pub avg_document_size: f64,
    pub min_document_size: usize,
    pub max_document_size: usize,
}

impl DocumentStats {
    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }

    /// Percentage of documents containing `field`.
    pub fn field_coverage(&self, field: &str) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        let count = self.field_frequency.get(field).copied().unwrap_or(0);
        count as f64 / self.total_count as f64 * 100.0
    }

    /// Fields ordered by descending frequency, ties broken by name.
    pub fn most_common_fields(&self, limit: usize) -> Vec<(&str, usize)> {
        let mut fields: Vec<(&str, usize)> =
            self.field_frequency.iter().map(|(name, count)| (name.as_str(), *count)).collect();
        fields.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        fields.truncate(limit);
        fields
    }

    /// Most frequent type label for `field`.
    pub fn dominant_type(&self, field: &str) -> Option<&str> {
        self.field_types.get(field).and_then(|types| {
            types
                .iter()
                .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
                .map(|(label, _)| label.as_str())
        })
    }
}
