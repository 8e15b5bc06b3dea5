//! Batch import of patient records from JSON files.
//!
//! Pipeline per file: Decode UTF-8 → Parse JSON → Classify shape → Upsert
//!
//! File-level failures are recorded in that file's [`ImportOutcome`] and the
//! batch moves on. Records missing `id` or `name` are skipped without failing
//! the file.

mod batch;
mod importer;

pub use batch::*;
pub use importer::*;

use serde::Serialize;
use thiserror::Error;

/// Why a single file could not be imported.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImportError {
    #[error("Failed to read file")]
    Decode { detail: String },

    #[error("Invalid JSON format")]
    Parse { detail: String },

    #[error("No valid patient data found")]
    NoValidData,
}

impl ImportError {
    /// Underlying cause, for logs.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ImportError::Decode { detail } | ImportError::Parse { detail } => Some(detail),
            ImportError::NoValidData => None,
        }
    }
}

/// A file selected for import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportFile {
    /// Display name (usually the file name)
    pub name: String,
    /// Raw file contents
    pub bytes: Vec<u8>,
}

impl ImportFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Result of importing one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub file_name: String,
    /// Records added to the collection
    pub imported: usize,
    /// Records that replaced an existing record with the same ID
    pub duplicates: usize,
    /// Records dropped for missing `id` or `name`
    pub skipped: usize,
    /// Set when the file as a whole failed
    pub error: Option<ImportError>,
}

impl ImportOutcome {
    fn failed(file_name: &str, error: ImportError) -> Self {
        Self {
            file_name: file_name.to_string(),
            imported: 0,
            duplicates: 0,
            skipped: 0,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Every accepted record already existed.
    pub fn is_duplicate_only(&self) -> bool {
        self.is_success() && self.duplicates > 0 && self.imported == 0
    }

    /// Short status for the import report.
    pub fn label(&self) -> String {
        match &self.error {
            Some(error) => format!("Error: {}", error),
            None if self.is_duplicate_only() => {
                format!("Updated {} existing record(s)", self.duplicates)
            }
            None if self.duplicates > 0 => format!(
                "Imported {} new, updated {} existing record(s)",
                self.imported, self.duplicates
            ),
            None => format!("Imported {} record(s)", self.imported),
        }
    }
}
