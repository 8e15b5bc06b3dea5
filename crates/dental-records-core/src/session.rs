//! A working session over the clinic's patient records.
//!
//! The session owns the collection and the store it persists to. Every
//! mutation goes through one of its methods, is saved immediately, and is
//! announced to the registered [`CollectionListener`].

use thiserror::Error;

use crate::db::DbError;
use crate::export::{CollectionExport, PatientExport};
use crate::import::{BatchImporter, ImportFile, ImportObserver, ImportReport};
use crate::models::{ChartError, PatientCollection, PatientRecord, ToothCondition};
use crate::store::PatientStore;

/// Session errors.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Store(#[from] DbError),

    #[error("Patient not found: {0}")]
    NotFound(String),

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Chart error: {0}")]
    Chart(#[from] ChartError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Notified after the collection changes and has been saved.
pub trait CollectionListener: Send {
    fn on_collection_changed(&self);
}

/// Fields the intake form refuses to save without.
pub fn missing_required_fields(record: &PatientRecord) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if record.name.trim().is_empty() {
        missing.push("name");
    }
    if record.age == 0 {
        missing.push("age");
    }
    if record.sex.trim().is_empty() {
        missing.push("sex");
    }
    missing
}

/// Patient records session backed by a [`PatientStore`].
pub struct PatientSession<S: PatientStore> {
    store: S,
    collection: PatientCollection,
    listener: Option<Box<dyn CollectionListener>>,
}

impl<S: PatientStore> PatientSession<S> {
    /// Load the collection from `store`.
    ///
    /// A store with no saved data starts an empty session. An unreadable
    /// snapshot is logged and also starts empty; it is overwritten by the
    /// next save.
    pub fn open(store: S) -> Self {
        let collection = match store.load_collection() {
            Ok(Some(collection)) => {
                tracing::info!(count = collection.len(), "Loaded patient records");
                collection
            }
            Ok(None) => PatientCollection::new(),
            Err(e) => {
                tracing::error!(error = %e, "Error loading patient records, starting empty");
                PatientCollection::new()
            }
        };
        Self {
            store,
            collection,
            listener: None,
        }
    }

    pub fn set_listener(&mut self, listener: Box<dyn CollectionListener>) {
        self.listener = Some(listener);
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn collection(&self) -> &PatientCollection {
        &self.collection
    }

    pub fn patients(&self) -> &[PatientRecord] {
        self.collection.records()
    }

    pub fn get_patient(&self, id: &str) -> Option<&PatientRecord> {
        self.collection.get(id)
    }

    /// Patients whose name, ID or phone number matches `term`.
    pub fn search(&self, term: &str) -> Vec<&PatientRecord> {
        self.collection.search(term)
    }

    /// ID the next new patient will receive.
    pub fn next_patient_id(&self) -> String {
        self.collection.next_id()
    }

    /// Add the demonstration patient when the clinic has no records yet.
    ///
    /// Returns whether the sample was added.
    pub fn seed_sample_data(&mut self) -> SessionResult<bool> {
        if !self.collection.is_empty() {
            return Ok(false);
        }
        self.collection.upsert(PatientRecord::sample());
        self.collection.set_next_sequence(2);
        self.commit()?;
        Ok(true)
    }

    /// Save a new patient under the next free ID.
    pub fn add_patient(&mut self, mut record: PatientRecord) -> SessionResult<PatientRecord> {
        let missing = missing_required_fields(&record);
        if !missing.is_empty() {
            return Err(SessionError::MissingFields(missing));
        }

        // Skip over IDs taken by imported records
        let mut id = self.collection.allocate_id();
        while self.collection.contains(&id) {
            id = self.collection.allocate_id();
        }

        let now = chrono::Utc::now().to_rfc3339();
        record.id = id;
        record.created_at = now.clone();
        record.updated_at = now;
        record.recalculate_pending();

        self.collection.upsert(record.clone());
        self.commit()?;
        tracing::info!(id = %record.id, "Patient record saved");
        Ok(record)
    }

    /// Replace the record stored under `id`.
    ///
    /// The ID and original creation time are kept regardless of what
    /// `record` carries.
    pub fn update_patient(
        &mut self,
        id: &str,
        mut record: PatientRecord,
    ) -> SessionResult<PatientRecord> {
        let missing = missing_required_fields(&record);
        if !missing.is_empty() {
            return Err(SessionError::MissingFields(missing));
        }
        let existing = self
            .collection
            .get(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        let now = chrono::Utc::now().to_rfc3339();
        record.created_at = if existing.created_at.is_empty() {
            now.clone()
        } else {
            existing.created_at.clone()
        };
        record.id = id.to_string();
        record.updated_at = now;
        record.recalculate_pending();

        self.collection.upsert(record.clone());
        self.commit()?;
        tracing::info!(id = %id, "Patient record updated");
        Ok(record)
    }

    /// Delete a patient. Returns whether a record was removed.
    pub fn delete_patient(&mut self, id: &str) -> SessionResult<bool> {
        if self.collection.remove(id).is_none() {
            return Ok(false);
        }
        self.commit()?;
        tracing::info!(id = %id, "Patient record deleted");
        Ok(true)
    }

    /// Advance one tooth of a patient's chart to its next condition.
    pub fn toggle_tooth(&mut self, id: &str, tooth: u8) -> SessionResult<ToothCondition> {
        let record = self
            .collection
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        let condition = record.teeth_conditions.toggle(tooth)?;
        record.touch();
        self.commit()?;
        Ok(condition)
    }

    /// Run a batch import against this session's collection.
    ///
    /// The listener fires once, after the merged collection is saved.
    pub fn import_files<O: ImportObserver + ?Sized>(
        &mut self,
        files: &[ImportFile],
        observer: &mut O,
    ) -> SessionResult<ImportReport> {
        let report = BatchImporter::new(&self.store).import(&mut self.collection, files, observer)?;
        self.notify();
        Ok(report)
    }

    /// Export every patient.
    pub fn export_all(&self) -> SessionResult<CollectionExport> {
        Ok(CollectionExport::new(self.collection.records())?)
    }

    /// Export a single patient.
    pub fn export_patient(&self, id: &str) -> SessionResult<PatientExport> {
        let record = self
            .collection
            .get(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        Ok(PatientExport::new(record)?)
    }

    fn commit(&mut self) -> SessionResult<()> {
        self.store.save_collection(&self.collection)?;
        self.notify();
        Ok(())
    }

    fn notify(&self) {
        if let Some(listener) = &self.listener {
            listener.on_collection_changed();
        }
    }
}
