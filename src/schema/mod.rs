//! Result-shape profiling: field frequency, type mix, samples and sizes.

use std::collections::BTreeMap;

use mongodb::bson::Document;

use crate::bson::{bson_type_label, estimated_document_size, primitive_sample};
use crate::models::DocumentStats;

/// Distinct sample values kept per field.
pub const MAX_SAMPLE_VALUES: usize = 5;

/// Per-field accumulator during profiling.
#[derive(Default)]
struct FieldAccum {
    frequency: usize,
    types: BTreeMap<String, usize>,
    samples: Vec<String>,
}

/// Stateless profiler over a batch of (already normalized) documents.
///
/// Only top-level fields are profiled. The input is never modified.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaProfiler;

impl SchemaProfiler {
    pub fn profile(documents: &[Document]) -> DocumentStats {
        if documents.is_empty() {
            return DocumentStats::default();
        }

        let mut accums: BTreeMap<String, FieldAccum> = BTreeMap::new();
        let mut sizes: Vec<usize> = Vec::with_capacity(documents.len());

        for doc in documents {
            sizes.push(estimated_document_size(doc));

            for (field, value) in doc {
                let accum = accums.entry(field.clone()).or_default();
                accum.frequency += 1;
                *accum.types.entry(bson_type_label(value).to_string()).or_insert(0) += 1;

                if accum.samples.len() < MAX_SAMPLE_VALUES
                    && let Some(sample) = primitive_sample(value)
                    && !accum.samples.contains(&sample)
                {
                    accum.samples.push(sample);
                }
            }
        }

        let total_count = documents.len();
        let mut stats = DocumentStats { total_count, ..DocumentStats::default() };

        for (field, accum) in accums {
            if accum.frequency == 1 {
                stats.unique_fields.push(field.clone());
            }
            if accum.frequency == total_count {
                stats.common_fields.push(field.clone());
            }
            stats.field_frequency.insert(field.clone(), accum.frequency);
            stats.field_types.insert(field.clone(), accum.types);
            stats.sample_values.insert(field, accum.samples);
        }

        let total_size: usize = sizes.iter().sum();
        stats.avg_document_size = total_size as f64 / total_count as f64;
        stats.min_document_size = sizes.iter().copied().min().unwrap_or(0);
        stats.max_document_size = sizes.iter().copied().max().unwrap_or(0);

        stats
    }
}
