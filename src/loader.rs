//! Document loading.
//!
//! Thin file/string loaders for API description documents. The core never
//! performs I/O of its own; these helpers exist for the CLI and for hosts
//! that keep whole documents on disk.

use std::path::Path;

use serde_json::Value;

use crate::error::DocumentError;

/// Load a document from a file path.
///
/// # Errors
///
/// Returns `DocumentError::FileNotFound` if the file doesn't exist,
/// or `DocumentError::InvalidJson` if the file isn't valid JSON.
pub fn load_document(path: &Path) -> Result<Value, DocumentError> {
    if !path.exists() {
        return Err(DocumentError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| DocumentError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| DocumentError::InvalidJson { source })
}

/// Load a document from a JSON string.
///
/// # Errors
///
/// Returns `DocumentError::InvalidJson` if the string isn't valid JSON.
pub fn load_document_str(content: &str) -> Result<Value, DocumentError> {
    serde_json::from_str(content).map_err(|source| DocumentError::InvalidJson { source })
}

/// Write a document to a file.
///
/// # Errors
///
/// Returns `DocumentError::WriteError` if the file cannot be written.
pub fn save_document(path: &Path, document: &Value, pretty: bool) -> Result<(), DocumentError> {
    let rendered = if pretty {
        serde_json::to_string_pretty(document)
    } else {
        serde_json::to_string(document)
    }
    .map_err(|source| DocumentError::InvalidJson { source })?;

    std::fs::write(path, rendered).map_err(|source| DocumentError::WriteError {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_reported() {
        let result = load_document(Path::new("definitely-missing.json"));
        assert!(matches!(result, Err(DocumentError::FileNotFound { .. })));
    }

    #[test]
    fn invalid_json_is_reported() {
        let result = load_document_str("{not json");
        assert!(matches!(result, Err(DocumentError::InvalidJson { .. })));
    }

    #[test]
    fn valid_json_loads() {
        let document = load_document_str(r#"{"openapi": "3.1.0"}"#).unwrap();
        assert_eq!(document["openapi"], "3.1.0");
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        let document = serde_json::json!({"components": {"x-types": {"Id": "string"}}});

        save_document(&path, &document, true).unwrap();
        assert_eq!(load_document(&path).unwrap(), document);
    }
}
