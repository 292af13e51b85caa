#![allow(dead_code)]

use std::{path::PathBuf, sync::Mutex, time::Duration};

use once_cell::sync::Lazy;
use tempfile::TempDir;
use todo_config::Config;
use todo_master::TodoApp;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Creates an isolated data directory for one test.
pub fn test_dir() -> PathBuf {
    let temp = TempDir::new().expect("create temp dir");
    let base = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);
    base
}

/// Config with a quick worker so tests do not wait on the default interval.
pub fn fast_config() -> Config {
    Config {
        autosave_interval_secs: 0,
        autosave_poll_millis: 10,
        ..Config::default()
    }
}

pub fn open_app(dir: &std::path::Path) -> TodoApp {
    TodoApp::open_with(dir, fast_config()).expect("open app")
}

pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}
