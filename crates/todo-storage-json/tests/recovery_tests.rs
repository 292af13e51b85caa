use std::{fs, path::PathBuf};

use filetime::{set_file_mtime, FileTime};
use serde_json::json;
use tempfile::{tempdir, TempDir};
use todo_domain::Task;
use todo_storage_json::{EntityStore, LoadOutcome, BACKUP_DIR_NAME};

fn backup_dir(dir: &TempDir) -> PathBuf {
    dir.path().join(BACKUP_DIR_NAME)
}

fn saved_store(dir: &TempDir, titles: &[&str]) -> EntityStore<Task> {
    let mut store = EntityStore::<Task>::with_retention(dir.path().join("tasks.json"), 3);
    for title in titles {
        store.create(Task::new(*title)).expect("create");
        store.save().expect("save");
    }
    store
}

fn loaded_titles(store: &EntityStore<Task>) -> Vec<String> {
    store.iter().map(|task| task.title.clone()).collect()
}

#[test]
fn corrupt_primary_recovers_from_first_slot_and_heals() {
    let dir = tempdir().expect("tempdir");
    let store = saved_store(&dir, &["one", "two"]);
    let path = store.path().to_path_buf();
    let slot_one = backup_dir(&dir).join("tasks.json.1");
    let slot_contents = fs::read_to_string(&slot_one).expect("read slot");

    fs::write(&path, "{ this is not json").expect("corrupt primary");

    let mut reopened = EntityStore::<Task>::with_retention(&path, 3);
    let report = reopened.load().expect("load");
    assert_eq!(
        report.outcome,
        LoadOutcome::Recovered {
            from: slot_one.clone(),
            healed: true
        }
    );
    assert!(report.outcome.succeeded());
    assert_eq!(loaded_titles(&reopened), vec!["one"]);

    let healed = fs::read_to_string(&path).expect("read healed primary");
    let healed_value: serde_json::Value = serde_json::from_str(&healed).expect("valid json");
    assert_eq!(healed_value["tasks"][0]["title"], "one");
    assert_eq!(
        fs::read_to_string(&slot_one).expect("slot after heal"),
        slot_contents,
        "healing must not rotate the chain"
    );
    let quarantined = backup_dir(&dir).join("tasks.json.corrupt");
    assert_eq!(
        fs::read_to_string(quarantined).expect("quarantined copy"),
        "{ this is not json"
    );
}

#[test]
fn recovery_walks_past_unreadable_slots() {
    let dir = tempdir().expect("tempdir");
    let store = saved_store(&dir, &["one", "two", "three"]);
    let path = store.path().to_path_buf();
    fs::write(&path, "garbage").expect("corrupt primary");
    fs::write(backup_dir(&dir).join("tasks.json.1"), "[]").expect("corrupt slot one");

    let mut reopened = EntityStore::<Task>::with_retention(&path, 3);
    let report = reopened.load().expect("load");
    match report.outcome {
        LoadOutcome::Recovered { from, healed } => {
            assert_eq!(from, backup_dir(&dir).join("tasks.json.2"));
            assert!(healed);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(loaded_titles(&reopened), vec!["one"]);
}

#[test]
fn missing_primary_is_rebuilt_from_backups() {
    let dir = tempdir().expect("tempdir");
    let store = saved_store(&dir, &["one", "two"]);
    let path = store.path().to_path_buf();
    fs::remove_file(&path).expect("remove primary");

    let mut reopened = EntityStore::<Task>::with_retention(&path, 3);
    let report = reopened.load().expect("load");
    assert!(matches!(report.outcome, LoadOutcome::Recovered { healed: true, .. }));
    assert!(path.exists());
}

#[test]
fn nothing_readable_resets_to_empty() {
    let dir = tempdir().expect("tempdir");
    let store = saved_store(&dir, &["one", "two"]);
    let path = store.path().to_path_buf();
    fs::write(&path, "garbage").expect("corrupt primary");
    fs::write(backup_dir(&dir).join("tasks.json.1"), "also garbage").expect("corrupt slot");

    let mut reopened = EntityStore::<Task>::with_retention(&path, 3);
    reopened.create(Task::new("in memory")).expect("create");
    let report = reopened.load().expect("load");
    match &report.outcome {
        LoadOutcome::Failed { attempts } => assert_eq!(attempts.len(), 2),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(!report.outcome.succeeded());
    assert!(reopened.is_empty());
    assert_eq!(fs::read_to_string(&path).expect("primary kept"), "garbage");
}

#[test]
fn bad_records_are_skipped_and_reported() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("tasks.json");
    let good = serde_json::to_value(Task::new("good")).expect("record");
    let document = json!({
        "version": "1.0",
        "tasks": [good, { "title": "   " }, { "title": "bad priority", "priority": "whenever" }],
        "saved_at": "2026-01-02T03:04:05Z",
    });
    fs::write(&path, document.to_string()).expect("write document");

    let mut store = EntityStore::<Task>::open(&path);
    let report = store.load().expect("load");
    assert_eq!(report.outcome, LoadOutcome::Primary);
    assert_eq!(report.loaded, 1);
    let skipped: Vec<usize> = report.skipped.iter().map(|record| record.index).collect();
    assert_eq!(skipped, vec![1, 2]);
    assert_eq!(loaded_titles(&store), vec!["good"]);
}

#[test]
fn newer_major_version_falls_back_to_backup() {
    let dir = tempdir().expect("tempdir");
    let store = saved_store(&dir, &["one", "two"]);
    let path = store.path().to_path_buf();
    fs::write(&path, r#"{"version":"2.0","tasks":[]}"#).expect("future document");

    let mut reopened = EntityStore::<Task>::with_retention(&path, 3);
    let report = reopened.load().expect("load");
    assert!(matches!(report.outcome, LoadOutcome::Recovered { .. }));
    assert_eq!(loaded_titles(&reopened), vec!["one"]);
}

#[test]
fn snapshots_are_tried_newest_first_after_slots() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("tasks.json");
    let backups = backup_dir(&dir);
    fs::create_dir_all(&backups).expect("backup dir");

    let older = backups.join("tasks_20260101_080000.json");
    let newer = backups.join("tasks_20260102_080000.json");
    for (file, title) in [(&older, "older"), (&newer, "newer")] {
        let record = serde_json::to_value(Task::new(title)).expect("record");
        fs::write(file, json!({ "version": "1.0", "tasks": [record] }).to_string())
            .expect("write snapshot");
    }
    let base = FileTime::from_unix_time(1_767_000_000, 0);
    set_file_mtime(&older, base).expect("mtime older");
    set_file_mtime(&newer, FileTime::from_unix_time(base.unix_seconds() + 3600, 0))
        .expect("mtime newer");
    fs::write(&path, "corrupt").expect("corrupt primary");

    let mut store = EntityStore::<Task>::open(&path);
    let report = store.load().expect("load");
    assert_eq!(
        report.outcome,
        LoadOutcome::Recovered {
            from: newer,
            healed: true
        }
    );
    assert_eq!(loaded_titles(&store), vec!["newer"]);
}
