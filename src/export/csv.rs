use mongodb::bson::{Bson, Document};

use crate::bson::bson_to_cell_string;
use crate::error::{Error, Result};

/// CSV bytes for a non-empty array of records, plus the record count.
///
/// Columns come from the first record's keys in order. A later record with a
/// key outside that header is rejected; missing keys become empty cells.
pub fn to_csv_bytes(data: &Bson) -> Result<(Vec<u8>, u64)> {
    let records = records(data)?;
    let header: Vec<&str> = records[0].keys().map(String::as_str).collect();

    for (index, record) in records.iter().enumerate() {
        if let Some(extra) = record.keys().find(|key| !header.contains(&key.as_str())) {
            return Err(Error::Validation(format!(
                "Record {index} has field '{extra}' that is not in the CSV header"
            )));
        }
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&header)?;
    for record in &records {
        let row: Vec<String> = header
            .iter()
            .map(|field| record.get(field).map(bson_to_cell_string).unwrap_or_default())
            .collect();
        writer.write_record(&row)?;
    }

    let bytes = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    Ok((bytes, records.len() as u64))
}

fn records(data: &Bson) -> Result<Vec<&Document>> {
    let Bson::Array(items) = data else {
        return Err(Error::Validation("CSV export requires a list of records".to_string()));
    };
    if items.is_empty() {
        return Err(Error::Validation("CSV export requires at least one record".to_string()));
    }

    items
        .iter()
        .enumerate()
        .map(|(index, item)| match item {
            Bson::Document(doc) => Ok(doc),
            _ => Err(Error::Validation(format!("CSV export item {index} is not a record"))),
        })
        .collect()
}
