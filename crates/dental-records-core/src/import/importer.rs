//! The batch importer.

use std::ops::ControlFlow;

use serde::Serialize;
use serde_json::Value;

use super::batch::{has_identity, RecordBatch};
use super::{ImportError, ImportFile, ImportOutcome};
use crate::db::DbResult;
use crate::models::{PatientCollection, PatientRecord, Upsert};
use crate::store::PatientStore;

/// Receives progress after every file.
///
/// Returning `ControlFlow::Break` stops the batch before the next file.
/// Whatever was merged up to that point is still saved.
pub trait ImportObserver {
    fn on_file_processed(
        &mut self,
        outcome: &ImportOutcome,
        processed: usize,
        total: usize,
    ) -> ControlFlow<()>;
}

impl<F> ImportObserver for F
where
    F: FnMut(&ImportOutcome, usize, usize) -> ControlFlow<()>,
{
    fn on_file_processed(
        &mut self,
        outcome: &ImportOutcome,
        processed: usize,
        total: usize,
    ) -> ControlFlow<()> {
        self(outcome, processed, total)
    }
}

/// Observer for callers that only want the final report.
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoreProgress;

impl ImportObserver for IgnoreProgress {
    fn on_file_processed(&mut self, _: &ImportOutcome, _: usize, _: usize) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// Fraction of the batch completed, in `0.0..=1.0`.
pub fn progress_fraction(processed: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        processed.min(total) as f64 / total as f64
    }
}

/// Summary of a finished (or cancelled) batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    /// Correlates log lines for this batch
    pub batch_id: String,
    /// Timestamp stamped on every record touched by this batch
    pub imported_at: String,
    /// One entry per processed file, in input order
    pub outcomes: Vec<ImportOutcome>,
    /// Number of files submitted
    pub total_files: usize,
    /// Stopped early by the observer
    pub cancelled: bool,
    /// Sequence number the next new patient will receive
    pub next_sequence: u32,
}

impl ImportReport {
    pub fn total_imported(&self) -> usize {
        self.outcomes.iter().map(|o| o.imported).sum()
    }

    pub fn total_duplicates(&self) -> usize {
        self.outcomes.iter().map(|o| o.duplicates).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.outcomes.iter().map(|o| o.skipped).sum()
    }

    /// Files whose outcome is an error.
    pub fn failed_files(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }

    pub fn successful_files(&self) -> usize {
        self.outcomes.len() - self.failed_files()
    }

    /// One-line message for the user.
    pub fn summary(&self) -> String {
        let imported = self.total_imported();
        let duplicates = self.total_duplicates();
        let failed = self.failed_files();

        let mut message = if imported == 0 && duplicates == 0 {
            "No patient records imported".to_string()
        } else {
            format!(
                "Imported {} new, updated {} existing patient record(s) from {} file(s)",
                imported,
                duplicates,
                self.successful_files()
            )
        };
        if failed > 0 {
            message.push_str(&format!("; {} file(s) failed", failed));
        }
        if self.cancelled {
            message.push_str(&format!(
                "; cancelled after {} of {} file(s)",
                self.outcomes.len(),
                self.total_files
            ));
        }
        message
    }
}

/// Merges import files into a patient collection and saves the result.
pub struct BatchImporter<'a, S: PatientStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: PatientStore + ?Sized> BatchImporter<'a, S> {
    /// Create a new importer that saves to `store`.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Import `files` in order.
    ///
    /// File-level problems never fail the call; they are reported per file.
    /// The collection is saved exactly once, after the last processed file.
    /// An error is returned only when that save fails, in which case the
    /// merge is still applied to `collection`.
    pub fn import<O: ImportObserver + ?Sized>(
        &self,
        collection: &mut PatientCollection,
        files: &[ImportFile],
        observer: &mut O,
    ) -> DbResult<ImportReport> {
        let batch_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("import_batch", batch_id = %batch_id, files = files.len());
        let _enter = span.enter();

        let imported_at = chrono::Utc::now().to_rfc3339();
        let total = files.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut cancelled = false;

        for (index, file) in files.iter().enumerate() {
            let outcome = import_file(collection, file, &imported_at);
            match &outcome.error {
                Some(error) => tracing::warn!(
                    file = %file.name,
                    error = %error,
                    detail = error.detail().unwrap_or_default(),
                    "File import failed"
                ),
                None => tracing::debug!(
                    file = %file.name,
                    imported = outcome.imported,
                    duplicates = outcome.duplicates,
                    skipped = outcome.skipped,
                    "File imported"
                ),
            }
            outcomes.push(outcome);

            let processed = index + 1;
            let flow = observer.on_file_processed(&outcomes[index], processed, total);
            if flow.is_break() && processed < total {
                tracing::info!(processed, total, "Import cancelled");
                cancelled = true;
                break;
            }
        }

        let any_new = outcomes.iter().any(|o| o.imported > 0);
        if any_new && !collection.is_empty() {
            if collection.recompute_sequence().is_none() {
                tracing::debug!("No clinic-issued IDs found, keeping patient counter");
            }
        }

        if let Err(e) = self.store.save_collection(collection) {
            tracing::error!(error = %e, "Failed to save imported patients");
            return Err(e);
        }

        let report = ImportReport {
            batch_id,
            imported_at,
            outcomes,
            total_files: total,
            cancelled,
            next_sequence: collection.next_sequence(),
        };
        tracing::info!(
            imported = report.total_imported(),
            duplicates = report.total_duplicates(),
            failed = report.failed_files(),
            "Import batch finished"
        );
        Ok(report)
    }
}

/// Decode, parse and classify one file into candidate records.
pub fn decode_candidates(bytes: &[u8]) -> Result<Vec<Value>, ImportError> {
    let text = std::str::from_utf8(bytes).map_err(|e| ImportError::Decode {
        detail: e.to_string(),
    })?;
    // Leading byte-order mark
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let document: Value = serde_json::from_str(text).map_err(|e| ImportError::Parse {
        detail: e.to_string(),
    })?;

    let candidates = RecordBatch::classify(document).into_candidates();
    if candidates.is_empty() {
        return Err(ImportError::NoValidData);
    }
    Ok(candidates)
}

fn import_file(collection: &mut PatientCollection, file: &ImportFile, now: &str) -> ImportOutcome {
    let candidates = match decode_candidates(&file.bytes) {
        Ok(candidates) => candidates,
        Err(error) => return ImportOutcome::failed(&file.name, error),
    };

    let mut outcome = ImportOutcome {
        file_name: file.name.clone(),
        imported: 0,
        duplicates: 0,
        skipped: 0,
        error: None,
    };

    for candidate in candidates {
        if !has_identity(&candidate) {
            outcome.skipped += 1;
            continue;
        }
        let mut record: PatientRecord = match serde_json::from_value(candidate) {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!(file = %file.name, error = %e, "Skipping undecodable record");
                outcome.skipped += 1;
                continue;
            }
        };
        // Non-string or blank identity fields decode to empty text
        if !record.is_valid() {
            tracing::debug!(file = %file.name, "Skipping record without usable id or name");
            outcome.skipped += 1;
            continue;
        }

        record.updated_at = now.to_string();
        if record.created_at.is_empty() {
            record.created_at = collection
                .get(&record.id)
                .map(|existing| existing.created_at.clone())
                .filter(|created| !created.is_empty())
                .unwrap_or_else(|| now.to_string());
        }

        match collection.upsert(record) {
            Upsert::Inserted => outcome.imported += 1,
            Upsert::Replaced => outcome.duplicates += 1,
        }
    }

    outcome
}
