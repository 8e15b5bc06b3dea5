//! Persistence of the patient collection.
//!
//! The collection is written as a whole snapshot under [`PATIENTS_KEY`],
//! with the sequence counter under [`COUNTER_KEY`]. Any key-value backend
//! can hold it; [`Database`] is the durable one and [`MemoryStore`] backs
//! tests and throwaway sessions.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::config::{COUNTER_KEY, PATIENTS_KEY};
use crate::db::{Database, DbError, DbResult};
use crate::models::{PatientCollection, PatientRecord};

/// A string-keyed blob store.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> DbResult<Option<String>>;

    /// Write all entries, or none of them.
    fn put_entries(&self, entries: &[(&str, &str)]) -> DbResult<()>;
}

/// Load/save of the whole patient collection.
pub trait PatientStore {
    /// `None` when nothing has been saved yet.
    fn load_collection(&self) -> DbResult<Option<PatientCollection>>;

    fn save_collection(&self, collection: &PatientCollection) -> DbResult<()>;
}

impl<T: KeyValueStore + ?Sized> PatientStore for T {
    fn load_collection(&self) -> DbResult<Option<PatientCollection>> {
        let patients = self.get(PATIENTS_KEY)?;
        let counter = self.get(COUNTER_KEY)?;
        if patients.is_none() && counter.is_none() {
            return Ok(None);
        }

        let records: Vec<PatientRecord> = match patients {
            Some(raw) => serde_json::from_str(&raw)?,
            None => Vec::new(),
        };
        let next_sequence = counter
            .and_then(|raw| match raw.trim().parse::<u32>() {
                Ok(n) => Some(n),
                Err(_) => {
                    tracing::warn!(value = %raw, "Ignoring unreadable patient counter");
                    None
                }
            })
            .unwrap_or(1);

        Ok(Some(PatientCollection::from_parts(records, next_sequence)))
    }

    fn save_collection(&self, collection: &PatientCollection) -> DbResult<()> {
        let patients = serde_json::to_string(collection.records())?;
        let counter = collection.next_sequence().to_string();
        self.put_entries(&[(PATIENTS_KEY, &patients), (COUNTER_KEY, &counter)])?;
        tracing::debug!(count = collection.len(), "Saved patient collection");
        Ok(())
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> DbResult<Option<String>> {
        Database::get(self, key)
    }

    fn put_entries(&self, entries: &[(&str, &str)]) -> DbResult<()> {
        Database::put_entries(self, entries)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn get(&self, key: &str) -> DbResult<Option<String>> {
        (**self).get(key)
    }

    fn put_entries(&self, entries: &[(&str, &str)]) -> DbResult<()> {
        (**self).put_entries(entries)
    }
}

/// In-process key-value store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    write_count: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `put_entries` calls so far.
    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    /// Make every subsequent write fail, simulating a full or locked store.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> DbResult<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|e| DbError::Unavailable(format!("Lock poisoned: {}", e)))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> DbResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn put_entries(&self, entries: &[(&str, &str)]) -> DbResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DbError::Unavailable("writes disabled".into()));
        }
        let mut map = self.lock()?;
        for (key, value) in entries {
            map.insert((*key).to_string(), (*value).to_string());
        }
        self.write_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
