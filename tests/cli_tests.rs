mod common;

use std::{error::Error, fs, path::Path};

use assert_cmd::Command;
use common::test_dir;
use predicates::prelude::*;

fn cli(home: &Path) -> Result<Command, Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("todo_master_cli")?;
    cmd.env("TODO_MASTER_HOME", home).env("RUST_LOG", "off");
    Ok(cmd)
}

#[test]
fn added_tasks_are_listed_by_later_runs() -> Result<(), Box<dyn Error>> {
    let home = test_dir();
    cli(&home)?
        .args(["add", "Buy", "milk", "--priority", "high", "--tag", "errand"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added: Buy milk"));

    cli(&home)?
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Buy milk").and(predicate::str::contains("[Inbox]")));

    assert!(home.join("tasks.json").exists());
    Ok(())
}

#[test]
fn done_tasks_leave_the_default_list() -> Result<(), Box<dyn Error>> {
    let home = test_dir();
    cli(&home)?.args(["add", "Finish report"]).assert().success();

    let text = fs::read_to_string(home.join("tasks.json"))?;
    let saved: serde_json::Value = serde_json::from_str(&text)?;
    let id = saved["tasks"][0]["id"].as_str().expect("task id").to_string();

    cli(&home)?
        .args(["done", &id[..8]])
        .assert()
        .success()
        .stdout(predicate::str::contains("Completed: Finish report"));
    cli(&home)?
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No tasks"));
    cli(&home)?
        .args(["list", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Finish report"));
    Ok(())
}

#[test]
fn projects_show_statistics() -> Result<(), Box<dyn Error>> {
    let home = test_dir();
    cli(&home)?
        .args(["add", "Plan sprint", "--project", "work"])
        .assert()
        .success();
    cli(&home)?
        .arg("projects")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Inbox")
                .and(predicate::str::contains("Personal"))
                .and(predicate::str::contains("Work")),
        );
    Ok(())
}

#[test]
fn backup_and_restore_round_trip() -> Result<(), Box<dyn Error>> {
    let home = test_dir();
    cli(&home)?.args(["add", "Archived thought"]).assert().success();
    cli(&home)?
        .arg("backup")
        .assert()
        .success()
        .stdout(predicate::str::contains("Backup created"));

    let snapshot = fs::read_dir(home.join("backups"))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .find(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("tasks_"))
        })
        .expect("tasks snapshot");

    cli(&home)?
        .arg("backups")
        .assert()
        .success()
        .stdout(predicate::str::contains("tasks_").and(predicate::str::contains("snapshot")));
    cli(&home)?
        .arg("restore")
        .arg(&snapshot)
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored 1 records"));
    Ok(())
}

#[test]
fn usage_errors_fail_with_message() -> Result<(), Box<dyn Error>> {
    let home = test_dir();
    cli(&home)?
        .arg("frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown command 'frobnicate'"));
    cli(&home)?
        .args(["add", "--priority", "someday", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown priority"));
    cli(&home)?
        .arg("restore")
        .arg(home.join("missing.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
    Ok(())
}
