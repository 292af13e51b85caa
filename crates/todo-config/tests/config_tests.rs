use std::fs;

use tempfile::tempdir;
use todo_config::{Config, ConfigError, ConfigManager};

#[test]
fn missing_file_loads_defaults() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::with_base_dir(&dir.path().join("home")).expect("manager");
    let config = manager.load().expect("load config");
    assert_eq!(config, Config::default());
    assert!(!manager.config_path().exists());
}

#[test]
fn config_manager_persists_and_loads_config() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::new(dir.path().join("config.json"));

    let config = Config {
        autosave_interval_secs: 30,
        backup_retention: 2,
        default_project: "Work".into(),
        ..Config::default()
    };
    manager.save(&config).expect("save config");
    let loaded = manager.load().expect("load config");

    assert_eq!(loaded, config);
    assert!(!dir.path().join("config.json.tmp").exists());
}

#[test]
fn partial_file_fills_remaining_defaults() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{ "undo_timeout_secs": 3 }"#).expect("write partial config");

    let loaded = ConfigManager::new(path).load().expect("load config");
    assert_eq!(loaded.undo_timeout_secs, 3);
    assert_eq!(loaded.backup_retention, Config::default().backup_retention);
    assert_eq!(loaded.default_project, "Inbox");
}

#[test]
fn malformed_file_reports_path() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    fs::write(&path, "{ nope").expect("write malformed config");

    let err = ConfigManager::new(path.clone()).load().expect_err("malformed");
    match err {
        ConfigError::Parse { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn invalid_settings_are_not_saved() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::new(dir.path().join("config.json"));
    let config = Config {
        autosave_poll_millis: 0,
        ..Config::default()
    };
    assert!(matches!(
        manager.save(&config),
        Err(ConfigError::Invalid { .. })
    ));
    assert!(!manager.config_path().exists());
}
