//! End-to-end tests for the memory store against the JSON file backend.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::{NaiveDateTime, TimeDelta};
use murmur::intent::split_time_phrase;
use murmur::models::time::parse_timestamp;
use murmur::storage::JsonFileBackend;
use murmur::storage::legacy::Layout;
use murmur::{
    ClearScope, Error, MemoryStore, NewRecord, RecordKind, RecordUpdate, ReminderStatus,
    StoreConfig,
};
use tempfile::TempDir;

fn at(s: &str) -> NaiveDateTime {
    parse_timestamp(s).unwrap()
}

fn open(dir: &TempDir, now: NaiveDateTime) -> MemoryStore<JsonFileBackend> {
    let backend = JsonFileBackend::in_dir(dir.path()).unwrap();
    MemoryStore::open_at(backend, StoreConfig::default(), now).unwrap()
}

// ============================================================================
// Reminder lifecycle
// ============================================================================

#[test]
fn test_reminder_from_phrase_through_retention() {
    let dir = TempDir::new().unwrap();
    let now = at("2024-01-01 09:00:00");

    let (text, due) = split_time_phrase("call mom tomorrow at 2 PM", now).unwrap();
    assert_eq!(text, "call mom");
    assert_eq!(due, at("2024-01-02 14:00:00"));

    let mut store = open(&dir, now);
    let id = store.add(NewRecord::reminder(text, due, now)).unwrap();

    let reminder = &store.memory().reminders[0];
    assert_eq!(reminder.id, id);
    assert_eq!(reminder.status, ReminderStatus::Pending);

    let week = store.weekly_view(now);
    assert_eq!(week.items.len(), 1);
    assert_eq!(week.items[0].kind, RecordKind::Reminder);
    assert_eq!(week.items[0].scheduled_at, due);

    let result = store.cleanup(now + TimeDelta::days(366)).unwrap();
    assert_eq!(result.records_removed(), 1);
    assert!(store.memory().is_empty());
    store.close().unwrap();

    let reopened = open(&dir, now);
    assert!(reopened.memory().is_empty());
}

#[test]
fn test_records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let now = at("2024-01-01 09:00:00");

    let mut store = open(&dir, now);
    let reminder = store
        .add(NewRecord::reminder("water the plants", at("2024-01-01 18:00:00"), now))
        .unwrap();
    store
        .add(NewRecord::event("dentist", at("2024-01-03 10:30:00"), now))
        .unwrap();
    store
        .add(NewRecord::fact("I like green tea", Some("preference".to_string()), now))
        .unwrap();
    store.close().unwrap();

    let mut store = open(&dir, now);
    assert_eq!(store.memory().len(), 3);
    assert_eq!(store.memory().facts[0].category.as_deref(), Some("preference"));

    store.complete(&reminder, at("2024-01-01 18:05:00")).unwrap();
    store.close().unwrap();

    let store = open(&dir, now);
    let reminder = &store.memory().reminders[0];
    assert_eq!(reminder.status, ReminderStatus::Completed);
    assert_eq!(reminder.completed_at, Some(at("2024-01-01 18:05:00")));
}

#[test]
fn test_update_moves_reminder_in_week() {
    let dir = TempDir::new().unwrap();
    let now = at("2024-01-01 09:00:00");
    let mut store = open(&dir, now);

    let id = store
        .add(NewRecord::reminder("call mom", at("2024-01-02 14:00:00"), now))
        .unwrap();
    store
        .update_at(
            &id,
            &RecordUpdate::new().with_scheduled_at(at("2024-01-09 14:00:00")),
            now,
        )
        .unwrap();

    // Moved past the end of the week.
    assert!(store.weekly_view(now).items.is_empty());
    assert_eq!(store.weekly_view(at("2024-01-05 09:00:00")).items.len(), 1);
}

#[test]
fn test_update_unknown_id_is_not_found() {
    let dir = TempDir::new().unwrap();
    let now = at("2024-01-01 09:00:00");
    let mut store = open(&dir, now);

    let err = store
        .update(&"missing".into(), &RecordUpdate::new().with_text("x"))
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

// ============================================================================
// Clearing
// ============================================================================

#[test]
fn test_clear_reminders_keeps_other_records() {
    let dir = TempDir::new().unwrap();
    let now = at("2024-01-01 09:00:00");
    let mut store = open(&dir, now);

    store
        .add(NewRecord::reminder("call mom", at("2024-01-02 14:00:00"), now))
        .unwrap();
    store
        .add(NewRecord::fact("I like green tea", None, now))
        .unwrap();

    let err = store.clear(ClearScope::Reminders, false).unwrap_err();
    assert!(matches!(err, Error::ConfirmationRequired { affected: 1, .. }));
    assert_eq!(store.memory().reminders.len(), 1);

    let outcome = store.clear(ClearScope::Reminders, true).unwrap();
    assert_eq!(outcome.removed(), 1);
    store.close().unwrap();

    let store = open(&dir, now);
    assert!(store.memory().reminders.is_empty());
    assert_eq!(store.memory().facts.len(), 1);
}

// ============================================================================
// Files on disk
// ============================================================================

#[test]
fn test_legacy_flat_file_is_read_and_upgraded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("memory.json");
    std::fs::write(
        &path,
        r#"{
            "reminders": [
                {"message": "call mom", "datetime": "2024-01-02 14:00:00",
                 "status": "pending", "created_at": "2024-01-01 09:00:00"}
            ],
            "facts": [
                {"content": "I like green tea", "timestamp": "2023-12-31 10:00:00"}
            ]
        }"#,
    )
    .unwrap();

    let backend = JsonFileBackend::new(&path);
    let (_, layout) = backend.load_with_layout().unwrap().unwrap();
    assert_eq!(layout, Layout::Flat);

    let now = at("2024-01-01 09:00:00");
    let mut store = MemoryStore::open_at(backend, StoreConfig::default(), now).unwrap();
    assert_eq!(store.memory().reminders[0].text, "call mom");
    assert_eq!(store.memory().facts.len(), 1);

    store.save().unwrap();
    let backend = JsonFileBackend::new(&path);
    let (_, layout) = backend.load_with_layout().unwrap().unwrap();
    assert_eq!(layout, Layout::Current);
}

#[test]
fn test_unrecognised_file_is_not_overwritten() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("memory.json");
    let raw = r#"{"notes": ["keep me"], "reminder": [{"message": "x", "datetime": "2024-01-05 10:00:00"}]}"#;
    std::fs::write(&path, raw).unwrap();

    let backend = JsonFileBackend::new(&path);
    let err = MemoryStore::open(backend, StoreConfig::default()).err().unwrap();
    assert!(err.is_storage());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), raw);
}

#[test]
fn test_legacy_upgrade_keeps_offset_times_and_a_backup() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("memory.json");
    let raw = r#"{
        "reminders": [
            {"message": "dentist", "datetime": "2024-01-05T10:00:00Z"},
            {"message": "someday", "datetime": "when I get round to it"}
        ]
    }"#;
    std::fs::write(&path, raw).unwrap();

    let now = at("2024-01-01 09:00:00");
    let backend = JsonFileBackend::new(&path);
    let backup = backend.backup_path();
    let mut store = MemoryStore::open_at(backend, StoreConfig::default(), now).unwrap();
    assert_eq!(store.memory().reminders.len(), 1);
    assert_eq!(store.memory().reminders[0].text, "dentist");
    store.save().unwrap();

    let kept = std::fs::read_to_string(backup).unwrap();
    assert_eq!(kept, raw);
    assert!(kept.contains("when I get round to it"));
}

#[test]
fn test_corrupt_file_is_storage_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("memory.json"), "{ not json").unwrap();

    let backend = JsonFileBackend::in_dir(dir.path()).unwrap();
    let err = MemoryStore::open(backend, StoreConfig::default()).err().unwrap();
    assert!(err.is_storage());
}

#[test]
fn test_write_back_store_flushes_on_close() {
    let dir = TempDir::new().unwrap();
    let now = at("2024-01-01 09:00:00");
    let backend = JsonFileBackend::in_dir(dir.path()).unwrap();
    let config = StoreConfig::default().with_write_through(false);
    let mut store = MemoryStore::open_at(backend, config, now).unwrap();

    store
        .add(NewRecord::fact("I like green tea", None, now))
        .unwrap();
    assert!(store.is_dirty());
    assert!(!dir.path().join("memory.json").exists());
    store.close().unwrap();

    let store = open(&dir, now);
    assert_eq!(store.memory().facts.len(), 1);
}
