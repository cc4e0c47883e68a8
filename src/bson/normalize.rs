//! Identifier normalization applied to every result set before it leaves the
//! data-access layer.

use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document};

/// Replace every ObjectId in `doc`, at any depth, with its 24-char hex string.
pub fn normalize_document(doc: &mut Document) {
    for (_, value) in doc.iter_mut() {
        normalize_value(value);
    }
}

pub fn normalize_documents(docs: &mut [Document]) {
    docs.iter_mut().for_each(normalize_document);
}

pub fn normalize_value(value: &mut Bson) {
    match value {
        Bson::ObjectId(oid) => {
            let hex = oid.to_hex();
            *value = Bson::String(hex);
        }
        Bson::Document(doc) => normalize_document(doc),
        Bson::Array(items) => items.iter_mut().for_each(normalize_value),
        _ => {}
    }
}

/// True if an ObjectId survives anywhere inside `value`.
pub fn contains_object_id(value: &Bson) -> bool {
    match value {
        Bson::ObjectId(_) => true,
        Bson::Document(doc) => doc.values().any(contains_object_id),
        Bson::Array(items) => items.iter().any(contains_object_id),
        _ => false,
    }
}

/// Interpret a user-supplied document id: a valid 24-hex string becomes an
/// ObjectId, anything else is matched as a literal string.
///
/// In collections that mix `_id` types, a 24-hex string id stored as a string
/// is unreachable here: it always resolves to an ObjectId.
pub fn resolve_document_id(id: &str) -> Bson {
    match ObjectId::parse_str(id) {
        Ok(oid) => Bson::ObjectId(oid),
        Err(_) => Bson::String(id.to_string()),
    }
}
