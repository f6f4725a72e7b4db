//! On-disk JSON documents: 4-space indentation, UTF-8 kept as-is.
use serde::{Serialize, de::DeserializeOwned};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::ReceiptDocument;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error on {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl DocumentError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        DocumentError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Serialize `value` the way receipt documents are stored.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}

/// Write bytes through a temp file in the same directory and rename over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DocumentError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| DocumentError::io(parent, e))?;
    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(|e| DocumentError::io(path, e))?;
    temp.write_all(bytes)
        .and_then(|_| temp.flush())
        .map_err(|e| DocumentError::io(path, e))?;
    temp.persist(path)
        .map_err(|e| DocumentError::io(path, e.error))?;
    Ok(())
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), DocumentError> {
    let bytes = to_pretty_json(value).map_err(|source| DocumentError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, &bytes)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, DocumentError> {
    let raw = std::fs::read(path).map_err(|e| DocumentError::io(path, e))?;
    serde_json::from_slice(&raw).map_err(|source| DocumentError::Json {
        path: path.to_path_buf(),
        source,
    })
}

impl ReceiptDocument {
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        to_pretty_json(self)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Write the document that will be signed.
    pub fn write_to(&self, path: &Path) -> Result<(), DocumentError> {
        write_json(path, self)
    }

    pub fn read_from(path: &Path) -> Result<Self, DocumentError> {
        read_json(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_json_uses_four_spaces_and_keeps_utf8() {
        let value = serde_json::json!({"Name": "Oʻzbekiston", "Items": [1]});
        let text = String::from_utf8(to_pretty_json(&value).unwrap()).unwrap();
        assert!(text.contains("\n    \"Name\": \"Oʻzbekiston\""));
        assert!(text.contains("\n        1\n"));
    }

    #[test]
    fn atomic_write_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
    }
}
