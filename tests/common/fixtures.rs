//! Document fixtures shared by the integration tests.

#![allow(dead_code)]

use mongodb::bson::{Document, doc, oid::ObjectId};

/// `count` uniform order documents with an ObjectId `_id`.
pub fn order_documents(count: usize) -> Vec<Document> {
    (0..count)
        .map(|i| {
            doc! {
                "_id": ObjectId::new(),
                "index": i as i32,
                "customer": format!("customer {}", i % 3),
                "status": if i % 2 == 0 { "open" } else { "shipped" },
                "total": (i * 10) as f64,
                "shipping": {
                    "city": format!("city_{}", i % 4),
                    "priority": i % 5 == 0,
                },
            }
        })
        .collect()
}

/// Documents whose fields vary in presence and type.
pub fn mixed_shape_documents() -> Vec<Document> {
    vec![
        doc! { "_id": "a", "name": "Ada", "age": 36, "email": "ada@example.com" },
        doc! { "_id": "b", "name": "Grace", "age": "unknown" },
        doc! { "_id": "c", "name": "Linus", "age": 54_i64, "tags": ["kernel"] },
        doc! { "_id": "d", "name": "Barbara", "age": 81.5, "address": { "city": "Boston" } },
    ]
}

/// One document carrying ObjectIds at several nesting depths.
pub fn nested_object_id_document() -> Document {
    doc! {
        "_id": ObjectId::new(),
        "owner": ObjectId::new(),
        "items": [ { "sku": ObjectId::new(), "qty": 1 }, ObjectId::new() ],
        "meta": { "created_by": { "user": ObjectId::new() } },
    }
}
