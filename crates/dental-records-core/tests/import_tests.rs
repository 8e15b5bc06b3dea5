//! Batch import integration tests.

use std::ops::ControlFlow;

use dental_records_core::db::Database;
use dental_records_core::import::{
    BatchImporter, IgnoreProgress, ImportError, ImportFile, ImportOutcome,
};
use dental_records_core::models::{
    format_patient_id, parse_patient_sequence, PatientCollection, PatientRecord,
};
use dental_records_core::store::{MemoryStore, PatientStore};
use dental_records_core::PatientSession;
use proptest::prelude::*;

fn file(name: &str, json: &str) -> ImportFile {
    ImportFile::new(name, json.as_bytes())
}

fn import(
    store: &MemoryStore,
    collection: &mut PatientCollection,
    files: &[ImportFile],
) -> dental_records_core::import::ImportReport {
    BatchImporter::new(store)
        .import(collection, files, &mut IgnoreProgress)
        .unwrap()
}

#[test]
fn test_outcomes_follow_input_order() {
    let store = MemoryStore::new();
    let mut collection = PatientCollection::new();
    let files = vec![
        file("one.json", r#"{"patients": [{"id": "PA001", "name": "Asha"}]}"#),
        file("broken.json", "{not json"),
        file("two.json", r#"{"patient": {"id": "PA002", "name": "Ravi"}}"#),
        ImportFile::new("binary.json", vec![0xff, 0xfe, 0x00]),
        file("three.json", r#"{"id": "PA003", "name": "Meera"}"#),
    ];

    let report = import(&store, &mut collection, &files);

    let names: Vec<&str> = report.outcomes.iter().map(|o| o.file_name.as_str()).collect();
    assert_eq!(names, vec!["one.json", "broken.json", "two.json", "binary.json", "three.json"]);
    assert!(matches!(report.outcomes[1].error, Some(ImportError::Parse { .. })));
    assert!(matches!(report.outcomes[3].error, Some(ImportError::Decode { .. })));
    assert_eq!(report.total_imported(), 3);
    assert_eq!(report.failed_files(), 2);
    assert_eq!(store.write_count(), 1);
}

#[test]
fn test_reimport_is_idempotent() {
    let store = MemoryStore::new();
    let mut collection = PatientCollection::new();
    let files = vec![file(
        "clinic.json",
        r#"{"patients": [{"id": "PA001", "name": "Asha"}, {"id": "PA002", "name": "Ravi"}]}"#,
    )];

    import(&store, &mut collection, &files);
    let ids_before: Vec<String> = collection.iter().map(|p| p.id.clone()).collect();

    let report = import(&store, &mut collection, &files);
    let ids_after: Vec<String> = collection.iter().map(|p| p.id.clone()).collect();

    assert_eq!(ids_before, ids_after);
    assert_eq!(report.total_imported(), 0);
    assert_eq!(report.total_duplicates(), 2);
    assert!(report.outcomes[0].is_duplicate_only());
}

#[test]
fn test_merge_replaces_in_place() {
    let store = MemoryStore::new();
    let mut collection = PatientCollection::new();
    let initial = import(
        &store,
        &mut collection,
        &[file(
            "first.json",
            r#"{"patients": [
                {"id": "PA001", "name": "Asha", "phone": "111"},
                {"id": "PA002", "name": "Ravi"}
            ]}"#,
        )],
    );
    let untouched = collection.get("PA002").unwrap().clone();

    let report = import(
        &store,
        &mut collection,
        &[file("fix.json", r#"{"id": "PA001", "name": "Asha Rao", "phone": "222"}"#)],
    );

    assert_eq!(report.total_duplicates(), 1);
    assert_eq!(collection.len(), 2);
    let first = &collection.records()[0];
    assert_eq!(first.id, "PA001");
    assert_eq!(first.name, "Asha Rao");
    assert_eq!(first.phone, "222");
    assert_eq!(first.updated_at, report.imported_at);

    let second = &collection.records()[1];
    assert_eq!(second, &untouched);
    assert_eq!(second.name, "Ravi");
    assert_eq!(second.updated_at, initial.imported_at);
}

#[test]
fn test_unusable_identities_never_enter_collection() {
    let store = MemoryStore::new();
    let mut collection = PatientCollection::new();
    let report = import(
        &store,
        &mut collection,
        &[file(
            "odd.json",
            r#"{"patients": [
                {"id": {"x": 1}, "name": "Max"},
                {"id": "PA002", "name": ["Luna"]},
                {"id": "   ", "name": "Blank"},
                {"id": {"y": 2}, "name": "Again"}
            ]}"#,
        )],
    );

    let outcome = &report.outcomes[0];
    assert!(outcome.is_success());
    assert_eq!(outcome.imported, 0);
    assert_eq!(outcome.duplicates, 0);
    assert_eq!(outcome.skipped, 4);
    assert!(collection.is_empty());
}

#[test]
fn test_new_records_get_timestamps() {
    let store = MemoryStore::new();
    let mut collection = PatientCollection::new();
    let report = import(
        &store,
        &mut collection,
        &[file(
            "new.json",
            r#"{"patients": [
                {"id": "PA010", "name": "Fresh"},
                {"id": "PA011", "name": "Dated", "createdAt": "2023-01-02T03:04:05+00:00"}
            ]}"#,
        )],
    );

    let fresh = collection.get("PA010").unwrap();
    assert_eq!(fresh.created_at, report.imported_at);
    assert_eq!(fresh.updated_at, report.imported_at);

    let dated = collection.get("PA011").unwrap();
    assert_eq!(dated.created_at, "2023-01-02T03:04:05+00:00");
    assert_eq!(dated.updated_at, report.imported_at);
}

#[test]
fn test_invalid_json_is_isolated() {
    let store = MemoryStore::new();
    let mut collection = PatientCollection::new();
    let report = import(
        &store,
        &mut collection,
        &[
            file("bad.json", "[1, 2"),
            file("good.json", r#"{"id": "PA001", "name": "Asha"}"#),
        ],
    );

    assert_eq!(report.outcomes[0].error.as_ref().unwrap().to_string(), "Invalid JSON format");
    assert!(report.outcomes[1].is_success());
    assert_eq!(collection.len(), 1);
}

#[test]
fn test_incomplete_records_are_omitted() {
    let store = MemoryStore::new();
    let mut collection = PatientCollection::new();
    let report = import(
        &store,
        &mut collection,
        &[
            file(
                "mixed.json",
                r#"{"patients": [
                    {"id": "PA001"},
                    {"name": "No Id"},
                    {"id": "PA002", "name": "Ravi"}
                ]}"#,
            ),
            file("nothing.json", r#"{"patients": [{"id": "", "name": ""}]}"#),
            file("empty.json", r#"{"patients": []}"#),
            file("shape.json", r#"{"doctor": "Rao"}"#),
        ],
    );

    let mixed = &report.outcomes[0];
    assert!(mixed.is_success());
    assert_eq!(mixed.imported, 1);
    assert_eq!(mixed.skipped, 2);

    // All candidates skipped is still a successful file
    assert!(report.outcomes[1].is_success());
    assert_eq!(report.outcomes[1].imported, 0);

    assert_eq!(report.outcomes[2].error, Some(ImportError::NoValidData));
    assert_eq!(report.outcomes[3].error, Some(ImportError::NoValidData));
    assert_eq!(collection.len(), 1);
}

#[test]
fn test_counter_recomputed_from_highest_id() {
    let store = MemoryStore::new();
    let mut collection = PatientCollection::new();
    let report = import(
        &store,
        &mut collection,
        &[file(
            "ids.json",
            r#"{"patients": [
                {"id": "PA001", "name": "A"},
                {"id": "PA005", "name": "B"},
                {"id": "legacy-7", "name": "C"}
            ]}"#,
        )],
    );

    assert_eq!(report.next_sequence, 6);
    assert_eq!(collection.next_id(), "PA006");
}

#[test]
fn test_counter_untouched_by_duplicate_only_batch() {
    let store = MemoryStore::new();
    let mut collection =
        PatientCollection::from_parts(vec![PatientRecord::new("PA001", "Asha")], 40);

    let files = [file("a.json", r#"{"id": "PA001", "name": "Asha"}"#)];
    let report = import(&store, &mut collection, &files);

    assert_eq!(report.total_duplicates(), 1);
    assert_eq!(report.next_sequence, 40);
}

#[test]
fn test_cancel_keeps_partial_merge() {
    let store = MemoryStore::new();
    let mut collection = PatientCollection::new();
    let files = vec![
        file("a.json", r#"{"id": "PA001", "name": "Asha"}"#),
        file("b.json", r#"{"id": "PA002", "name": "Ravi"}"#),
        file("c.json", r#"{"id": "PA003", "name": "Meera"}"#),
    ];

    let mut seen = Vec::new();
    let mut observer = |outcome: &ImportOutcome, processed: usize, total: usize| {
        seen.push((outcome.file_name.clone(), processed, total));
        if processed == 2 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    };
    let report = BatchImporter::new(&store)
        .import(&mut collection, &files, &mut observer)
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(seen, vec![("a.json".to_string(), 1, 3), ("b.json".to_string(), 2, 3)]);
    assert_eq!(collection.len(), 2);

    let saved = store.load_collection().unwrap().unwrap();
    assert_eq!(saved.len(), 2);
    assert!(report.summary().ends_with("; cancelled after 2 of 3 file(s)"));
}

#[test]
fn test_store_failure_keeps_merge() {
    let store = MemoryStore::new();
    store.set_fail_writes(true);
    let mut collection = PatientCollection::new();

    let result = BatchImporter::new(&store).import(
        &mut collection,
        &[file("a.json", r#"{"id": "PA001", "name": "Asha"}"#)],
        &mut IgnoreProgress,
    );

    assert!(result.is_err());
    assert_eq!(collection.len(), 1);
}

#[test]
fn test_session_import_survives_reopen_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.db");

    {
        let mut session = PatientSession::open(Database::open(&path).unwrap());
        let report = session
            .import_files(
                &[file(
                    "clinic.json",
                    r#"{"patients": [
                        {"id": "PA003", "name": "Asha", "teethConditions": {"36": "rct"}}
                    ]}"#,
                )],
                &mut IgnoreProgress,
            )
            .unwrap();
        assert_eq!(report.total_imported(), 1);
    }

    let session = PatientSession::open(Database::open(&path).unwrap());
    let asha = session.get_patient("PA003").unwrap();
    assert_eq!(asha.teeth_conditions.condition(36).as_str(), "rct");
    assert_eq!(session.next_patient_id(), "PA004");
}

#[test]
fn test_export_reimports_cleanly() {
    let store = MemoryStore::new();
    let mut session = PatientSession::open(&store);
    session.seed_sample_data().unwrap();
    let json = session.export_all().unwrap().to_json().unwrap();

    let other = MemoryStore::new();
    let mut copy = PatientSession::open(&other);
    let report = copy
        .import_files(&[file("backup.json", &json)], &mut IgnoreProgress)
        .unwrap();

    assert_eq!(report.total_imported(), 1);
    let original = session.get_patient("PA001").unwrap();
    let restored = copy.get_patient("PA001").unwrap();
    assert_eq!(restored.name, original.name);
    assert_eq!(restored.created_at, original.created_at);
    assert_eq!(restored.teeth_conditions, original.teeth_conditions);
}

proptest! {
    #[test]
    fn prop_outcome_per_file_in_order(kinds in prop::collection::vec(0u8..3, 0..12)) {
        let store = MemoryStore::new();
        let mut collection = PatientCollection::new();
        let files: Vec<ImportFile> = kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| {
                let body = match kind {
                    0 => format!(r#"{{"id": "PA{:03}", "name": "P{}"}}"#, i + 1, i),
                    1 => "{".to_string(),
                    _ => r#"{"other": true}"#.to_string(),
                };
                ImportFile::new(format!("file-{}.json", i), body)
            })
            .collect();

        let report = import(&store, &mut collection, &files);

        prop_assert_eq!(report.outcomes.len(), files.len());
        for (outcome, file) in report.outcomes.iter().zip(&files) {
            prop_assert_eq!(&outcome.file_name, &file.name);
        }
        let valid = kinds.iter().filter(|k| **k == 0).count();
        prop_assert_eq!(collection.len(), valid);
        prop_assert_eq!(report.failed_files(), files.len() - valid);
        prop_assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn prop_patient_id_round_trip(sequence in 0u32..1_000_000) {
        prop_assert_eq!(parse_patient_sequence(&format_patient_id(sequence)), Some(sequence));
    }
}
