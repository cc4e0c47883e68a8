//! Parsing user-entered query text into BSON.

use mongodb::bson::{Bson, Document};
use serde_json::Value;

use crate::error::{Error, Result};

/// Parse query text as a document. Accepts strict JSON and relaxed JSON5
/// (unquoted keys, single quotes, trailing commas). Blank input is `{}`.
pub fn parse_query_document(input: &str) -> Result<Document> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Document::new());
    }

    let value: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(_) => json5::from_str(trimmed)
            .map_err(|e| Error::Validation(format!("Invalid query JSON: {e}")))?,
    };

    match Bson::try_from(value) {
        Ok(Bson::Document(doc)) => Ok(doc),
        Ok(_) => Err(Error::Validation("Query must be a JSON object".to_string())),
        Err(e) => Err(Error::Validation(format!("Invalid query value: {e}"))),
    }
}

/// Parse a pipeline given as a JSON array of stage objects.
pub fn parse_pipeline(input: &str) -> Result<Vec<Document>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let value: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(_) => json5::from_str(trimmed)
            .map_err(|e| Error::Validation(format!("Invalid pipeline JSON: {e}")))?,
    };
    let Value::Array(stages) = value else {
        return Err(Error::Validation("Pipeline must be a JSON array".to_string()));
    };

    stages
        .into_iter()
        .enumerate()
        .map(|(index, stage)| match Bson::try_from(stage) {
            Ok(Bson::Document(doc)) => Ok(doc),
            _ => Err(Error::Validation(format!("Pipeline stage {index} is not an object"))),
        })
        .collect()
}
