use mongodb::bson::Bson;
use serde_json::Value;

use crate::error::Result;

/// Pretty-printed (2-space) relaxed Extended JSON with object keys sorted.
/// Non-ASCII text is written as-is.
pub fn to_json_string(data: &Bson) -> Result<String> {
    let mut value = data.clone().into_relaxed_extjson();
    sort_keys(&mut value);
    Ok(serde_json::to_string_pretty(&value)?)
}

fn sort_keys(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> =
                std::mem::take(map).into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            for (key, mut child) in entries {
                sort_keys(&mut child);
                map.insert(key, child);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(sort_keys),
        _ => {}
    }
}
