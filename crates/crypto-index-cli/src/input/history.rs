use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crypto_index_core::IndexValue;

use super::price_store::parse_decimal;

#[derive(Debug, Serialize, Deserialize)]
struct HistoryRow {
    timestamp: i64,
    index_value: String,
}

/// Write the history as `timestamp,index_value`, creating parent folders.
pub fn write_history(path: &Path, history: &[IndexValue]) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|e| format!("Failed to create '{}': {}", path.display(), e))?;
    for point in history {
        wtr.serialize(HistoryRow {
            timestamp: point.timestamp,
            index_value: point.index_value.normalize().to_string(),
        })?;
    }
    wtr.flush()?;
    tracing::info!(path = %path.display(), points = history.len(), "index history written");
    Ok(())
}

/// Read a `timestamp,index_value` history file.
pub fn read_history(path: &Path) -> Result<Vec<IndexValue>, Box<dyn std::error::Error>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;

    let mut history = Vec::new();
    for (i, row) in rdr.deserialize::<HistoryRow>().enumerate() {
        let row = row?;
        let index_value = parse_decimal(&row.index_value).ok_or_else(|| {
            format!(
                "{} row {}: bad index value '{}'",
                path.display(),
                i + 1,
                row.index_value
            )
        })?;
        history.push(IndexValue {
            timestamp: row.timestamp,
            index_value,
        });
    }
    Ok(history)
}
