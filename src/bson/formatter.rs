//! BSON value rendering for profiling samples and flat exports.

use mongodb::bson::{Bson, Document};

/// Human-readable type label for a BSON value.
pub fn bson_type_label(value: &Bson) -> &'static str {
    match value {
        Bson::Document(_) => "Document",
        Bson::Array(_) => "Array",
        Bson::String(_) => "String",
        Bson::Int32(_) => "Int32",
        Bson::Int64(_) => "Int64",
        Bson::Double(_) => "Double",
        Bson::Decimal128(_) => "Decimal128",
        Bson::Boolean(_) => "Bool",
        Bson::Null => "Null",
        Bson::ObjectId(_) => "ObjectId",
        Bson::DateTime(_) => "Date",
        Bson::Timestamp(_) => "Timestamp",
        Bson::Binary(_) => "Binary",
        Bson::RegularExpression(_) => "Regex",
        _ => "Value",
    }
}

/// String form of a primitive (string, number or boolean) value; `None` for
/// anything structured or special.
pub fn primitive_sample(value: &Bson) -> Option<String> {
    match value {
        Bson::String(s) => Some(s.clone()),
        Bson::Int32(n) => Some(n.to_string()),
        Bson::Int64(n) => Some(n.to_string()),
        Bson::Double(n) => Some(n.to_string()),
        Bson::Decimal128(d) => Some(d.to_string()),
        Bson::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Cell text for a flat (CSV) export. Structured values become compact JSON.
pub fn bson_to_cell_string(value: &Bson) -> String {
    match value {
        Bson::Null | Bson::Undefined => String::new(),
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::DateTime(dt) => dt.try_to_rfc3339_string().unwrap_or_else(|_| format!("{dt:?}")),
        other => primitive_sample(other).unwrap_or_else(|| bson_to_json_string(other)),
    }
}

/// Compact relaxed Extended JSON.
pub fn bson_to_json_string(value: &Bson) -> String {
    let json_value = value.clone().into_relaxed_extjson();
    serde_json::to_string(&json_value).unwrap_or_default()
}

/// Serialized size estimate used for document size statistics.
pub fn estimated_document_size(doc: &Document) -> usize {
    doc.to_string().len()
}
