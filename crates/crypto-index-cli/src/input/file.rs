use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

/// Read a JSON document from `path` into `T`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let path = existing_file(path)?;
    let contents = fs::read_to_string(&path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
    let value = serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse '{}': {}", path.display(), e))?;
    Ok(value)
}

/// Absolute form of `path`, which must name an existing regular file.
pub fn existing_file(path: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    if !absolute.exists() {
        return Err(format!("File not found: {}", absolute.display()).into());
    }
    if !absolute.is_file() {
        return Err(format!("Not a file: {}", absolute.display()).into());
    }

    Ok(absolute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto_index_core::IndexCalculationInput;

    #[test]
    fn test_read_json_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.json");
        fs::write(
            &path,
            r#"{"weighting": "equal", "periods": []}"#,
        )
        .unwrap();
        let input: IndexCalculationInput = read_json(&path).unwrap();
        assert!(input.periods.is_empty());
        assert_eq!(input.base_value, rust_decimal_macros::dec!(100));
    }

    #[test]
    fn test_missing_and_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(existing_file(&dir.path().join("nope.json")).is_err());
        assert!(existing_file(dir.path()).is_err());
    }
}
