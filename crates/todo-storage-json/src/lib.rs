//! todo-storage-json
//!
//! Filesystem-backed JSON persistence for entity collections: a generic
//! in-memory [`EntityStore`], atomic document writes, a rotating
//! [`BackupChain`] and corruption recovery from it.

pub mod backup;
pub mod document;
pub mod error;
pub mod file;
pub mod lock;
pub mod query;
pub mod store;

pub use backup::{BackupChain, BackupInfo, BACKUP_DIR_NAME};
pub use document::{Decoded, SkippedRecord, FORMAT_VERSION};
pub use error::{StoreError, StoreResult};
pub use file::StorageFile;
pub use lock::StoreLock;
pub use query::{Expected, Filter, ListQuery, SortSpec};
pub use store::{EntityStore, LoadOutcome, LoadReport, DEFAULT_RETENTION};
