//! JSON export of patient records.
//!
//! Export documents are shaped so the importer reads them back unchanged:
//! `{"patients": [...]}` for the whole clinic, `{"patient": {...}}` for one.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::APP_VERSION;
use crate::models::PatientRecord;

/// Metadata attached to every export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    /// Export timestamp
    pub export_date: String,
    /// Number of patient records in the document
    pub total_patients: usize,
    /// Version of the exporting application
    pub app_version: String,
    /// SHA-256 of the serialized records, hex encoded
    pub checksum: String,
}

impl ExportMetadata {
    fn for_records<T: Serialize + ?Sized>(
        records: &T,
        total_patients: usize,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            export_date: chrono::Utc::now().to_rfc3339(),
            total_patients,
            app_version: APP_VERSION.to_string(),
            checksum: checksum(records)?,
        })
    }
}

/// Full-collection export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionExport {
    pub patients: Vec<PatientRecord>,
    pub export_metadata: ExportMetadata,
}

impl CollectionExport {
    pub fn new(records: &[PatientRecord]) -> Result<Self, serde_json::Error> {
        Ok(Self {
            export_metadata: ExportMetadata::for_records(records, records.len())?,
            patients: records.to_vec(),
        })
    }

    /// Suggested download name, `dental-patients-YYYY-MM-DD.json`.
    pub fn file_name(&self) -> String {
        format!("dental-patients-{}.json", export_day(&self.export_metadata.export_date))
    }

    /// Whether the records still match the checksum taken at export time.
    pub fn verify(&self) -> Result<bool, serde_json::Error> {
        Ok(checksum(&self.patients)? == self.export_metadata.checksum)
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Single-patient export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientExport {
    pub patient: PatientRecord,
    pub export_metadata: ExportMetadata,
}

impl PatientExport {
    pub fn new(record: &PatientRecord) -> Result<Self, serde_json::Error> {
        Ok(Self {
            export_metadata: ExportMetadata::for_records(record, 1)?,
            patient: record.clone(),
        })
    }

    /// Suggested download name, `patient-PA001-Full-Name.json`.
    pub fn file_name(&self) -> String {
        format!("patient-{}-{}.json", self.patient.id, dash_whitespace(&self.patient.name))
    }

    pub fn verify(&self) -> Result<bool, serde_json::Error> {
        Ok(checksum(&self.patient)? == self.export_metadata.checksum)
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn checksum<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(value)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Replace every run of whitespace with a single `-`, ends included.
fn dash_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_run = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !in_run {
                out.push('-');
            }
            in_run = true;
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

fn export_day(timestamp: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| chrono::Utc::now().format("%Y-%m-%d").to_string())
}
