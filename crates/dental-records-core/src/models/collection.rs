//! The in-memory patient collection.

use super::patient::{format_patient_id, PatientRecord};

/// Result of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// No record had this ID; appended at the end
    Inserted,
    /// An existing record was replaced in place
    Replaced,
}

/// All patient records of a session, unique by ID, plus the running
/// sequence counter used to mint new IDs.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientCollection {
    records: Vec<PatientRecord>,
    next_sequence: u32,
}

impl Default for PatientCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl PatientCollection {
    /// Empty collection with the counter at 1.
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            next_sequence: 1,
        }
    }

    /// Rebuild from a stored snapshot.
    ///
    /// Later duplicates of an ID replace earlier ones. The counter is raised
    /// if it would otherwise reissue an existing ID.
    pub fn from_parts(records: Vec<PatientRecord>, next_sequence: u32) -> Self {
        let mut collection = Self {
            records: Vec::with_capacity(records.len()),
            next_sequence: next_sequence.max(1),
        };
        for record in records {
            collection.upsert(record);
        }
        if let Some(max) = collection.max_sequence() {
            collection.next_sequence = collection.next_sequence.max(max.saturating_add(1));
        }
        collection
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[PatientRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PatientRecord> {
        self.records.iter()
    }

    pub fn get(&self, id: &str) -> Option<&PatientRecord> {
        self.records.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut PatientRecord> {
        self.records.iter_mut().find(|p| p.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Insert if the ID is new, otherwise replace the existing record in place.
    pub fn upsert(&mut self, record: PatientRecord) -> Upsert {
        match self.records.iter().position(|p| p.id == record.id) {
            Some(index) => {
                self.records[index] = record;
                Upsert::Replaced
            }
            None => {
                self.records.push(record);
                Upsert::Inserted
            }
        }
    }

    /// Remove a record by ID.
    pub fn remove(&mut self, id: &str) -> Option<PatientRecord> {
        let index = self.records.iter().position(|p| p.id == id)?;
        Some(self.records.remove(index))
    }

    /// Records matching a search term (see [`PatientRecord::matches`]).
    pub fn search(&self, term: &str) -> Vec<&PatientRecord> {
        self.records.iter().filter(|p| p.matches(term)).collect()
    }

    /// Sequence number the next new record will receive.
    pub fn next_sequence(&self) -> u32 {
        self.next_sequence
    }

    /// ID the next new record will receive.
    pub fn next_id(&self) -> String {
        format_patient_id(self.next_sequence)
    }

    /// Hand out the next ID and advance the counter.
    pub fn allocate_id(&mut self) -> String {
        let id = self.next_id();
        self.next_sequence = self.next_sequence.saturating_add(1);
        id
    }

    pub fn set_next_sequence(&mut self, next_sequence: u32) {
        self.next_sequence = next_sequence.max(1);
    }

    /// Highest sequence number among clinic-issued IDs.
    pub fn max_sequence(&self) -> Option<u32> {
        self.records.iter().filter_map(PatientRecord::sequence).max()
    }

    /// Reset the counter to one past the highest clinic-issued ID.
    ///
    /// IDs that are not `PA<digits>` are ignored. Leaves the counter alone
    /// and returns `None` when no ID qualifies.
    pub fn recompute_sequence(&mut self) -> Option<u32> {
        let next = self.max_sequence()?.saturating_add(1);
        self.next_sequence = next;
        Some(next)
    }
}
