//! Reading and writing register-map documents.
//!
//! Documents are written pretty-printed with a two-space indent and UTF-8
//! text left unescaped, so descriptions stay readable in the JSON file.

use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::error::StoreError;
use crate::schema::Document;

impl Document {
    /// Parses a document of either layout from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Json`] for malformed JSON or schema violations.
    pub fn from_json_str(content: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Serializes the document as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Json`] if serialization fails.
    pub fn to_json_string(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Loads a register-map document.
///
/// # Errors
///
/// Returns [`StoreError`] when the file cannot be read or parsed.
pub fn load_document(path: &Path) -> Result<Document, StoreError> {
    let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let document = Document::from_json_str(&content)?;
    info!(
        path = %path.display(),
        family = document.family().as_str(),
        registers = document.register_count(),
        "register map loaded"
    );
    Ok(document)
}

/// Writes a register-map document, replacing any existing file.
///
/// # Errors
///
/// Returns [`StoreError`] when serialization or the write fails.
pub fn save_document(path: &Path, document: &Document) -> Result<(), StoreError> {
    let io_err = |source: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let json = document.to_json_string()?;
    let mut file = fs::File::create(path).map_err(io_err)?;
    file.write_all(json.as_bytes()).map_err(io_err)?;
    file.write_all(b"\n").map_err(io_err)?;

    info!(
        path = %path.display(),
        registers = document.register_count(),
        "result saved"
    );
    Ok(())
}
