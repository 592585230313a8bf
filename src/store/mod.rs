//! Task persistence.
//!
//! Sub-modules:
//! - `memory`: `InMemoryTaskStore`, a mutex-guarded map for tests and
//!   ephemeral deployments.
//! - `schema`: SQLite DDL definitions.
//! - `sqlite`: `SqliteTaskStore`, the durable backend.
//!
//! Every backend must make `update_status` an atomic "update if currently
//! pending" and `find_pending` an atomic snapshot, so the reminder tick and
//! the `done` command can run concurrently without corrupting a record.

pub mod memory;
pub(crate) mod schema;
pub mod sqlite;

use crate::config::{StoreBackend, StoreConfig};
use crate::task::{NewTask, ReminderTime, Task, TaskId, TaskStatus};
use std::sync::Arc;

pub use memory::InMemoryTaskStore;
pub use sqlite::SqliteTaskStore;

/// Errors from task store backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("lock poisoned: {0}")]
    Lock(String),

    #[error("corrupt task record {id}: {reason}")]
    Corrupt { id: String, reason: String },

    /// Injected or transport-level outage (used by test doubles).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Persistent task store contract.
pub trait TaskStore: Send + Sync {
    /// Persist a new task as `pending` and return its fresh id.
    fn insert(&self, task: &NewTask) -> Result<TaskId, StoreError>;

    /// Fetch one task regardless of status. An unreadable record is
    /// reported as [`StoreError::Corrupt`].
    fn get(&self, id: &TaskId) -> Result<Option<Task>, StoreError>;

    /// Snapshot of all pending tasks. Records that cannot be decoded are
    /// logged and left out rather than failing the whole snapshot.
    fn find_pending(&self) -> Result<Vec<Task>, StoreError>;

    /// Pending tasks whose reminder is set to exactly `at`.
    fn find_by_reminder_time(&self, at: ReminderTime) -> Result<Vec<Task>, StoreError>;

    /// Change a task's status. Returns `true` only when the record existed
    /// and the transition was legal (`pending -> completed`); every other
    /// case leaves the store untouched and returns `false`.
    fn update_status(&self, id: &TaskId, status: TaskStatus) -> Result<bool, StoreError>;
}

/// Open the backend selected by the `[store]` config section.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn TaskStore>, StoreError> {
    match config.backend {
        StoreBackend::Sqlite => {
            let path = config.resolved_path();
            tracing::info!("using SQLite task store at {}", path.display());
            Ok(Arc::new(SqliteTaskStore::open(&path)?))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory task store; tasks are lost on exit");
            Ok(Arc::new(InMemoryTaskStore::new()))
        }
    }
}
