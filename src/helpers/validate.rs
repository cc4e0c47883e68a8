// Validation helpers

use mongodb::bson::{Bson, Document};

use crate::error::{Error, Result};
use crate::models::{ConnectionInfo, QueryKind, QuerySpec};

/// Operators accepted inside find, count and distinct filters.
pub const QUERY_OPERATORS: &[&str] = &[
    "$eq", "$ne", "$gt", "$gte", "$lt", "$lte", "$in", "$nin",
    "$and", "$or", "$not", "$nor", "$exists", "$type", "$regex", "$options",
    "$where", "$all", "$elemMatch", "$size", "$mod", "$text", "$expr", "$comment",
    "$search", "$language", "$caseSensitive", "$diacriticSensitive",
];

/// Check every `$`-prefixed key in a filter against [`QUERY_OPERATORS`].
pub fn validate_filter(filter: &Document) -> Result<()> {
    for (key, value) in filter {
        if key.starts_with('$') && !QUERY_OPERATORS.contains(&key.as_str()) {
            return Err(Error::Validation(format!("Unknown operator: {key}")));
        }
        // `$expr` bodies use aggregation syntax, which has its own operator set.
        if key == "$expr" {
            continue;
        }
        validate_filter_value(value)?;
    }
    Ok(())
}

fn validate_filter_value(value: &Bson) -> Result<()> {
    match value {
        Bson::Document(doc) => validate_filter(doc),
        Bson::Array(items) => items.iter().try_for_each(validate_filter_value),
        _ => Ok(()),
    }
}

/// Validate a query before it is queued: operator whitelist for filters,
/// argument shapes for distinct and aggregate, non-negative limit.
pub fn validate_query(spec: &QuerySpec) -> Result<()> {
    if spec.database.trim().is_empty() || spec.collection.trim().is_empty() {
        return Err(Error::Validation("Database and collection are required".to_string()));
    }
    if spec.limit < 0 {
        return Err(Error::Validation("Limit must not be negative".to_string()));
    }

    match spec.kind {
        QueryKind::Find | QueryKind::Count => validate_filter(&spec.query),
        QueryKind::Distinct => {
            let (_, filter) = spec.distinct_target()?;
            validate_filter(&filter)
        }
        QueryKind::Aggregate => spec.pipeline().map(|_| ()),
    }
}

/// Validate connection parameters before an attempt is made.
pub fn validate_connection_info(info: &ConnectionInfo) -> Result<()> {
    if info.host.trim().is_empty() {
        return Err(Error::Validation("Host is required".to_string()));
    }
    if info.port == 0 {
        return Err(Error::Validation("Port must be between 1 and 65535".to_string()));
    }
    if info.auth_enabled && info.username.as_deref().is_none_or(|u| u.trim().is_empty()) {
        return Err(Error::Validation("Username is required when authentication is enabled".into()));
    }
    if info.auth_database.trim().is_empty() {
        return Err(Error::Validation("Authentication database is required".to_string()));
    }
    Ok(())
}
