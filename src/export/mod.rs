//! Writing result data to JSON or CSV files.

mod csv;
mod json;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::helpers::atomic_write;

pub use self::csv::to_csv_bytes;
pub use self::json::to_json_string;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn label(self) -> &'static str {
        match self {
            ExportFormat::Json => "JSON",
            ExportFormat::Csv => "CSV",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(Error::Validation(format!("Unsupported export format: {other}"))),
        }
    }
}

/// Serialize `data` in `format` and write it to `path` atomically.
///
/// Returns the number of records written: the array length, or 1 for a
/// single value. Nothing is written when serialization fails.
pub fn export_data(format: ExportFormat, data: &Bson, path: &Path) -> Result<u64> {
    let (bytes, records) = match format {
        ExportFormat::Json => {
            let text = to_json_string(data)?;
            let records = match data {
                Bson::Array(items) => items.len() as u64,
                _ => 1,
            };
            (text.into_bytes(), records)
        }
        ExportFormat::Csv => to_csv_bytes(data)?,
    };

    atomic_write(path, &bytes)?;
    log::info!("Exported {records} records as {format} to {}", path.display());
    Ok(records)
}
