//! Background auto-save: records when data changed and writes it once the
//! changes have been quiet for the configured interval.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use todo_domain::Entity;
use todo_storage_json::{EntityStore, StoreError};
use tracing::{debug, error, info};

use crate::{CoreError, CoreResult};

/// An entity store shared between services and its auto-saver.
pub type SharedStore<T> = Arc<Mutex<EntityStore<T>>>;

/// Anything the auto-saver can persist.
pub trait SaveTarget: Send + Sync {
    fn save(&self) -> Result<(), StoreError>;

    /// Short name used in logs and the worker thread name.
    fn label(&self) -> String;
}

impl<T: Entity> SaveTarget for Mutex<EntityStore<T>> {
    /// Encodes under the store lock and writes after releasing it, so
    /// foreground callers only wait for serialization.
    fn save(&self) -> Result<(), StoreError> {
        let (contents, file) = {
            let store = self.lock();
            (store.encode()?, store.file().clone())
        };
        file.commit(&contents)?;
        self.lock().mark_saved(Utc::now());
        Ok(())
    }

    fn label(&self) -> String {
        self.lock().file().file_name()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoSaveSettings {
    /// Quiet period after the last change.
    pub interval: Duration,
    /// How often the worker checks for due saves.
    pub poll: Duration,
}

impl Default for AutoSaveSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            poll: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoSaveStatus {
    pub last_save: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

#[derive(Debug)]
struct DirtyState {
    dirty: bool,
    last_change: Instant,
    generation: u64,
}

struct Shared {
    target: Arc<dyn SaveTarget>,
    label: String,
    settings: AutoSaveSettings,
    state: Mutex<DirtyState>,
    running: Mutex<bool>,
    wake: Condvar,
    save_lock: Mutex<()>,
    status: Mutex<AutoSaveStatus>,
}

/// Dirty-tracking scheduler owning one worker thread per supervised store.
pub struct AutoSaver {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AutoSaver {
    pub fn new(target: Arc<dyn SaveTarget>, settings: AutoSaveSettings) -> Self {
        let label = target.label();
        Self {
            shared: Arc::new(Shared {
                target,
                label,
                settings,
                state: Mutex::new(DirtyState {
                    dirty: false,
                    last_change: Instant::now(),
                    generation: 0,
                }),
                running: Mutex::new(false),
                wake: Condvar::new(),
                save_lock: Mutex::new(()),
                status: Mutex::new(AutoSaveStatus::default()),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Records a change. Never blocks on I/O.
    pub fn mark_dirty(&self) {
        let mut state = self.shared.state.lock();
        state.dirty = true;
        state.last_change = Instant::now();
        state.generation = state.generation.wrapping_add(1);
    }

    pub fn is_dirty(&self) -> bool {
        self.shared.state.lock().dirty
    }

    /// Restarts the quiet period without changing the dirty flag.
    pub fn reset_timer(&self) {
        self.shared.state.lock().last_change = Instant::now();
    }

    /// Remaining quiet time before the next save, `None` when nothing is pending.
    pub fn time_until_next_save(&self) -> Option<Duration> {
        let state = self.shared.state.lock();
        state.dirty.then(|| {
            self.shared
                .settings
                .interval
                .saturating_sub(state.last_change.elapsed())
        })
    }

    pub fn status(&self) -> AutoSaveStatus {
        self.shared.status.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Spawns the worker. Calling it while running does nothing.
    pub fn start(&self) -> CoreResult<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }
        *self.shared.running.lock() = true;
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(format!("autosave-{}", self.shared.label))
            .spawn(move || shared.run())
            .map_err(|err| {
                *self.shared.running.lock() = false;
                CoreError::AutoSave(format!("could not start worker: {err}"))
            })?;
        *worker = Some(handle);
        debug!(target_name = %self.shared.label, "auto-save started");
        Ok(())
    }

    /// Saves immediately when dirty. `Ok(false)` when there was nothing to save.
    pub fn force_save(&self) -> CoreResult<bool> {
        self.shared.save_if_dirty(false)
    }

    /// Runs `f` while no save is in flight. A save that started before the
    /// call finishes first; the next one encodes whatever `f` left behind.
    pub fn with_save_lock<R>(&self, f: impl FnOnce() -> R) -> R {
        let _serialized = self.shared.save_lock.lock();
        f()
    }

    /// Stops the worker and, when asked, performs one last synchronous save.
    pub fn stop(&self, force_final_save: bool) -> CoreResult<()> {
        self.halt();
        if force_final_save {
            self.force_save()?;
        }
        Ok(())
    }

    fn halt(&self) {
        let handle = self.worker.lock().take();
        *self.shared.running.lock() = false;
        self.shared.wake.notify_all();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!(target_name = %self.shared.label, "auto-save worker panicked");
            }
            debug!(target_name = %self.shared.label, "auto-save stopped");
        }
    }
}

impl Drop for AutoSaver {
    fn drop(&mut self) {
        self.halt();
    }
}

impl Shared {
    fn run(&self) {
        loop {
            {
                let mut running = self.running.lock();
                if !*running {
                    break;
                }
                self.wake.wait_for(&mut running, self.settings.poll);
                if !*running {
                    break;
                }
            }
            if let Err(err) = self.save_if_dirty(true) {
                let failures = self.status.lock().consecutive_failures;
                error!(
                    target_name = %self.label,
                    error = %err,
                    failures,
                    "auto-save failed, retrying on next check"
                );
            }
        }
    }

    /// Saves when dirty (and, if `only_when_due`, once the quiet period has
    /// elapsed). The flag is cleared only if no change arrived mid-save.
    fn save_if_dirty(&self, only_when_due: bool) -> CoreResult<bool> {
        let _serialized = self.save_lock.lock();
        let generation = {
            let state = self.state.lock();
            if !state.dirty {
                return Ok(false);
            }
            if only_when_due && state.last_change.elapsed() < self.settings.interval {
                return Ok(false);
            }
            state.generation
        };

        let result = match panic::catch_unwind(AssertUnwindSafe(|| self.target.save())) {
            Ok(result) => result.map_err(CoreError::from),
            Err(_) => Err(CoreError::AutoSave(format!("saving {} panicked", self.label))),
        };

        let mut status = self.status.lock();
        match result {
            Ok(()) => {
                let mut state = self.state.lock();
                if state.generation == generation {
                    state.dirty = false;
                }
                if status.consecutive_failures > 0 {
                    info!(target_name = %self.label, "auto-save recovered");
                }
                status.last_save = Some(Utc::now());
                status.last_error = None;
                status.consecutive_failures = 0;
                debug!(target_name = %self.label, "auto-saved");
                Ok(true)
            }
            Err(err) => {
                status.last_error = Some(err.to_string());
                status.consecutive_failures += 1;
                Err(err)
            }
        }
    }
}
