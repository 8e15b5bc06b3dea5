//! Dental Records Core Library
//!
//! Local-first patient records for a dental clinic: intake form data, tooth
//! chart, payment tracking, JSON import/export and printable reports.
//!
//! # Architecture
//!
//! ```text
//!   Intake form ──► PatientSession ◄── Batch import (JSON files)
//!                        │   ▲                │
//!                        │   └── per-file ────┘
//!                        │       outcomes / progress
//!                        ▼
//!                 PatientCollection ──► PatientStore (SQLite key-value)
//!                        │
//!             ┌──────────┴──────────┐
//!             ▼                     ▼
//!        JSON export          Print report
//! ```
//!
//! # Modules
//!
//! - [`db`]: SQLite key-value table
//! - [`store`]: Collection persistence over any key-value backend
//! - [`models`]: Domain types (PatientRecord, TeethChart, PatientCollection)
//! - [`session`]: The mutation surface over a collection and its store
//! - [`import`]: Batch JSON import with per-file outcomes
//! - [`export`]: JSON export documents and printable reports
//! - [`config`]: Paths, storage keys and logging setup

pub mod config;
pub mod db;
pub mod export;
pub mod import;
pub mod models;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use db::Database;
pub use export::{CollectionExport, PatientExport, PrintReport};
pub use import::{
    BatchImporter, ImportError, ImportFile, ImportObserver, ImportOutcome, ImportReport,
};
pub use models::{PatientCollection, PatientRecord, PaymentStatus, TeethChart, ToothCondition};
pub use session::{CollectionListener, PatientSession, SessionError};
pub use store::{KeyValueStore, MemoryStore, PatientStore};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum DentalRecordsError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<db::DbError> for DentalRecordsError {
    fn from(e: db::DbError) -> Self {
        DentalRecordsError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for DentalRecordsError {
    fn from(e: serde_json::Error) -> Self {
        DentalRecordsError::SerializationError(e.to_string())
    }
}

impl From<SessionError> for DentalRecordsError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Store(e) => e.into(),
            SessionError::NotFound(id) => DentalRecordsError::NotFound(id),
            SessionError::Serialization(e) => e.into(),
            other @ (SessionError::MissingFields(_) | SessionError::Chart(_)) => {
                DentalRecordsError::InvalidInput(other.to_string())
            }
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for DentalRecordsError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        DentalRecordsError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a records database at the given path.
#[uniffi::export]
pub fn open_records(path: String) -> Result<Arc<DentalRecordsCore>, DentalRecordsError> {
    let db = Database::open(&path)?;
    Ok(DentalRecordsCore::with_database(db))
}

/// Open the records database at the default location.
#[uniffi::export]
pub fn open_default_records() -> Result<Arc<DentalRecordsCore>, DentalRecordsError> {
    let path = config::database_path().ok_or_else(|| {
        DentalRecordsError::DatabaseError("No data directory available".into())
    })?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .map_err(|e| DentalRecordsError::DatabaseError(e.to_string()))?;
    }
    let db = Database::open(&path)?;
    Ok(DentalRecordsCore::with_database(db))
}

/// Create an in-memory records database (for testing).
#[uniffi::export]
pub fn open_records_in_memory() -> Result<Arc<DentalRecordsCore>, DentalRecordsError> {
    let db = Database::open_in_memory()?;
    Ok(DentalRecordsCore::with_database(db))
}

/// Install the log subscriber. Honors `RUST_LOG`.
#[uniffi::export]
pub fn init_logging() {
    config::init_logging();
}

// =========================================================================
// Callback Interfaces
// =========================================================================

/// Host-side progress surface for imports.
#[uniffi::export(callback_interface)]
pub trait FfiImportObserver: Send + Sync {
    /// Called after each file. Return `false` to stop before the next file.
    fn on_file_processed(
        &self,
        outcome: FfiImportOutcome,
        processed: u32,
        total: u32,
        fraction: f64,
    ) -> bool;
}

/// Host-side hook to refresh any view of the patient list.
#[uniffi::export(callback_interface)]
pub trait FfiCollectionListener: Send + Sync {
    fn on_collection_changed(&self);
}

struct ObserverBridge(Box<dyn FfiImportObserver>);

impl ImportObserver for ObserverBridge {
    fn on_file_processed(
        &mut self,
        outcome: &ImportOutcome,
        processed: usize,
        total: usize,
    ) -> ControlFlow<()> {
        let keep_going = self.0.on_file_processed(
            outcome.clone().into(),
            processed as u32,
            total as u32,
            import::progress_fraction(processed, total),
        );
        if keep_going {
            ControlFlow::Continue(())
        } else {
            ControlFlow::Break(())
        }
    }
}

struct ListenerBridge(Box<dyn FfiCollectionListener>);

impl CollectionListener for ListenerBridge {
    fn on_collection_changed(&self) {
        self.0.on_collection_changed();
    }
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe session wrapper for FFI.
#[derive(uniffi::Object)]
pub struct DentalRecordsCore {
    session: Mutex<PatientSession<Database>>,
}

impl DentalRecordsCore {
    fn with_database(db: Database) -> Arc<Self> {
        Arc::new(Self {
            session: Mutex::new(PatientSession::open(db)),
        })
    }
}

#[uniffi::export]
impl DentalRecordsCore {
    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// All patients, in collection order.
    pub fn list_patients(&self) -> Result<Vec<FfiPatientSummary>, DentalRecordsError> {
        let session = self.session.lock()?;
        Ok(session.patients().iter().map(Into::into).collect())
    }

    /// Search patients by name, ID or phone.
    pub fn search_patients(
        &self,
        query: String,
    ) -> Result<Vec<FfiPatientSummary>, DentalRecordsError> {
        let session = self.session.lock()?;
        Ok(session.search(&query).into_iter().map(Into::into).collect())
    }

    /// Full record as JSON (form field names).
    pub fn get_patient_json(&self, id: String) -> Result<Option<String>, DentalRecordsError> {
        let session = self.session.lock()?;
        session
            .get_patient(&id)
            .map(serde_json::to_string)
            .transpose()
            .map_err(Into::into)
    }

    /// ID the next new patient will receive.
    pub fn next_patient_id(&self) -> Result<String, DentalRecordsError> {
        let session = self.session.lock()?;
        Ok(session.next_patient_id())
    }

    /// Save a new patient from form JSON.
    pub fn add_patient_json(&self, json: String) -> Result<FfiPatientSummary, DentalRecordsError> {
        let record = parse_record(&json)?;
        let mut session = self.session.lock()?;
        let saved = session.add_patient(record)?;
        Ok((&saved).into())
    }

    /// Replace an existing patient from form JSON.
    pub fn update_patient_json(
        &self,
        id: String,
        json: String,
    ) -> Result<FfiPatientSummary, DentalRecordsError> {
        let record = parse_record(&json)?;
        let mut session = self.session.lock()?;
        let saved = session.update_patient(&id, record)?;
        Ok((&saved).into())
    }

    /// Delete a patient.
    pub fn delete_patient(&self, id: String) -> Result<bool, DentalRecordsError> {
        let mut session = self.session.lock()?;
        Ok(session.delete_patient(&id)?)
    }

    /// Add the demonstration patient if there are no records.
    pub fn seed_sample_data(&self) -> Result<bool, DentalRecordsError> {
        let mut session = self.session.lock()?;
        Ok(session.seed_sample_data()?)
    }

    /// Register the view-refresh hook.
    pub fn set_collection_listener(
        &self,
        listener: Box<dyn FfiCollectionListener>,
    ) -> Result<(), DentalRecordsError> {
        let mut session = self.session.lock()?;
        session.set_listener(Box::new(ListenerBridge(listener)));
        Ok(())
    }

    // =========================================================================
    // Tooth Chart Operations
    // =========================================================================

    /// Advance a tooth to its next condition; returns the new condition.
    pub fn toggle_tooth(&self, id: String, tooth: u8) -> Result<String, DentalRecordsError> {
        let mut session = self.session.lock()?;
        let condition = session.toggle_tooth(&id, tooth)?;
        Ok(condition.as_str().to_string())
    }

    /// Every tooth on the chart with its condition, upper arch first.
    pub fn tooth_chart(&self, id: String) -> Result<Vec<FfiToothState>, DentalRecordsError> {
        let session = self.session.lock()?;
        let patient = session
            .get_patient(&id)
            .ok_or_else(|| DentalRecordsError::NotFound(id.clone()))?;

        let chart = &patient.teeth_conditions;
        let upper = models::UPPER_TEETH.iter().map(|t| (*t, true));
        let lower = models::LOWER_TEETH.iter().map(|t| (*t, false));
        Ok(upper
            .chain(lower)
            .map(|(tooth, upper)| FfiToothState {
                tooth,
                upper,
                condition: chart.condition(tooth).as_str().to_string(),
            })
            .collect())
    }

    // =========================================================================
    // Import / Export Operations
    // =========================================================================

    /// Import JSON files in order.
    pub fn import_files(
        &self,
        files: Vec<FfiImportFile>,
    ) -> Result<FfiImportReport, DentalRecordsError> {
        let mut session = self.session.lock()?;
        let report = session.import_files(&into_import_files(files), &mut import::IgnoreProgress)?;
        Ok(report.into())
    }

    /// Import JSON files in order, reporting progress after each one.
    pub fn import_files_with_progress(
        &self,
        files: Vec<FfiImportFile>,
        observer: Box<dyn FfiImportObserver>,
    ) -> Result<FfiImportReport, DentalRecordsError> {
        let mut session = self.session.lock()?;
        let mut observer = ObserverBridge(observer);
        let report = session.import_files(&into_import_files(files), &mut observer)?;
        Ok(report.into())
    }

    /// Export every patient.
    pub fn export_all_json(&self) -> Result<FfiExportDocument, DentalRecordsError> {
        let session = self.session.lock()?;
        let export = session.export_all()?;
        Ok(FfiExportDocument {
            file_name: export.file_name(),
            json: export.to_json()?,
        })
    }

    /// Export one patient.
    pub fn export_patient_json(&self, id: String) -> Result<FfiExportDocument, DentalRecordsError> {
        let session = self.session.lock()?;
        let export = session.export_patient(&id)?;
        Ok(FfiExportDocument {
            file_name: export.file_name(),
            json: export.to_json()?,
        })
    }

    /// Printable record as an HTML fragment.
    pub fn print_report_html(&self, id: String) -> Result<String, DentalRecordsError> {
        let session = self.session.lock()?;
        let patient = session
            .get_patient(&id)
            .ok_or_else(|| DentalRecordsError::NotFound(id.clone()))?;
        Ok(PrintReport::from_patient(patient).to_html())
    }

    /// Printable record as plain text.
    pub fn print_report_text(&self, id: String) -> Result<String, DentalRecordsError> {
        let session = self.session.lock()?;
        let patient = session
            .get_patient(&id)
            .ok_or_else(|| DentalRecordsError::NotFound(id.clone()))?;
        Ok(PrintReport::from_patient(patient).to_text())
    }
}

fn into_import_files(files: Vec<FfiImportFile>) -> Vec<ImportFile> {
    files
        .into_iter()
        .map(|f| ImportFile::new(f.name, f.bytes))
        .collect()
}

fn parse_record(json: &str) -> Result<PatientRecord, DentalRecordsError> {
    serde_json::from_str(json).map_err(|e| DentalRecordsError::InvalidInput(e.to_string()))
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe patient list entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientSummary {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub sex: String,
    pub phone: String,
    pub complaint: String,
    pub paid: f64,
    pub total: f64,
    pub pending: f64,
    pub payment_status: String,
    pub new_patient: bool,
    pub updated_at: String,
}

impl From<&PatientRecord> for FfiPatientSummary {
    fn from(patient: &PatientRecord) -> Self {
        Self {
            id: patient.id.clone(),
            name: patient.name.clone(),
            age: patient.age,
            sex: patient.sex.clone(),
            phone: patient.phone.clone(),
            complaint: patient.complaint.clone(),
            paid: patient.paid,
            total: patient.total,
            pending: patient.pending,
            payment_status: patient.payment_status().as_str().to_string(),
            new_patient: patient.new_patient,
            updated_at: patient.updated_at.clone(),
        }
    }
}

/// FFI-safe tooth chart cell.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiToothState {
    pub tooth: u8,
    pub upper: bool,
    pub condition: String,
}

/// FFI-safe import input.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiImportFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// FFI-safe per-file import result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiImportOutcome {
    pub file_name: String,
    pub success: bool,
    pub duplicate_only: bool,
    pub imported: u32,
    pub duplicates: u32,
    pub skipped: u32,
    pub error: Option<String>,
    pub label: String,
}

impl From<ImportOutcome> for FfiImportOutcome {
    fn from(outcome: ImportOutcome) -> Self {
        Self {
            success: outcome.is_success(),
            duplicate_only: outcome.is_duplicate_only(),
            imported: outcome.imported as u32,
            duplicates: outcome.duplicates as u32,
            skipped: outcome.skipped as u32,
            error: outcome.error.as_ref().map(|e| e.to_string()),
            label: outcome.label(),
            file_name: outcome.file_name,
        }
    }
}

/// FFI-safe import batch summary.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiImportReport {
    pub batch_id: String,
    pub outcomes: Vec<FfiImportOutcome>,
    pub imported: u32,
    pub duplicates: u32,
    pub failed_files: u32,
    pub cancelled: bool,
    pub next_patient_id: String,
    pub summary: String,
}

impl From<ImportReport> for FfiImportReport {
    fn from(report: ImportReport) -> Self {
        Self {
            imported: report.total_imported() as u32,
            duplicates: report.total_duplicates() as u32,
            failed_files: report.failed_files() as u32,
            cancelled: report.cancelled,
            next_patient_id: models::format_patient_id(report.next_sequence),
            summary: report.summary(),
            batch_id: report.batch_id,
            outcomes: report.outcomes.into_iter().map(Into::into).collect(),
        }
    }
}

/// FFI-safe export document.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiExportDocument {
    pub file_name: String,
    pub json: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StopAfterFirst(Arc<AtomicUsize>);

    impl FfiImportObserver for StopAfterFirst {
        fn on_file_processed(&self, _: FfiImportOutcome, processed: u32, _: u32, _: f64) -> bool {
            self.0.store(processed as usize, Ordering::SeqCst);
            false
        }
    }

    struct Refreshes(Arc<AtomicUsize>);

    impl FfiCollectionListener for Refreshes {
        fn on_collection_changed(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn form_json(name: &str) -> String {
        format!(
            r#"{{"name": "{}", "age": "30", "sex": "Female", "paid": 100, "total": 300}}"#,
            name
        )
    }

    #[test]
    fn test_add_and_list() {
        let core = open_records_in_memory().unwrap();
        let saved = core.add_patient_json(form_json("Asha")).unwrap();

        assert_eq!(saved.id, "PA001");
        assert_eq!(saved.pending, 200.0);
        assert_eq!(saved.payment_status, "pending");
        assert_eq!(core.list_patients().unwrap().len(), 1);
        assert_eq!(core.next_patient_id().unwrap(), "PA002");
    }

    #[test]
    fn test_invalid_form_json() {
        let core = open_records_in_memory().unwrap();
        assert!(matches!(
            core.add_patient_json("not json".into()),
            Err(DentalRecordsError::InvalidInput(_))
        ));
        assert!(matches!(
            core.add_patient_json(r#"{"name": "Asha"}"#.into()),
            Err(DentalRecordsError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_tooth_chart() {
        let core = open_records_in_memory().unwrap();
        let saved = core.add_patient_json(form_json("Asha")).unwrap();

        assert_eq!(core.toggle_tooth(saved.id.clone(), 26).unwrap(), "decay");
        let chart = core.tooth_chart(saved.id).unwrap();
        assert_eq!(chart.len(), 32);
        assert_eq!(chart[0].tooth, 18);
        assert!(chart[0].upper);
        let tooth = chart.iter().find(|t| t.tooth == 26).unwrap();
        assert_eq!(tooth.condition, "decay");
    }

    #[test]
    fn test_import_cancel_from_host() {
        let core = open_records_in_memory().unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        let files = vec![
            FfiImportFile {
                name: "a.json".into(),
                bytes: br#"{"id": "PA001", "name": "Max"}"#.to_vec(),
            },
            FfiImportFile {
                name: "b.json".into(),
                bytes: br#"{"id": "PA002", "name": "Luna"}"#.to_vec(),
            },
        ];

        let report = core
            .import_files_with_progress(files, Box::new(StopAfterFirst(seen.clone())))
            .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(report.cancelled);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.next_patient_id, "PA002");
        assert_eq!(core.list_patients().unwrap().len(), 1);
    }

    #[test]
    fn test_listener_fires_after_import() {
        let core = open_records_in_memory().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        core.set_collection_listener(Box::new(Refreshes(count.clone())))
            .unwrap();

        let files = vec![FfiImportFile {
            name: "bad.json".into(),
            bytes: b"{".to_vec(),
        }];
        let report = core.import_files(files).unwrap();

        assert_eq!(report.failed_files, 1);
        assert_eq!(report.outcomes[0].error.as_deref(), Some("Invalid JSON format"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_export_and_print() {
        let core = open_records_in_memory().unwrap();
        core.seed_sample_data().unwrap();

        let doc = core.export_patient_json("PA001".into()).unwrap();
        assert_eq!(doc.file_name, "patient-PA001-Sample-Patient.json");
        assert!(doc.json.contains("\"exportMetadata\""));

        let html = core.print_report_html("PA001".into()).unwrap();
        assert!(html.contains("Sample Patient"));
        assert!(matches!(
            core.print_report_text("PA404".into()),
            Err(DentalRecordsError::NotFound(_))
        ));
    }
}
