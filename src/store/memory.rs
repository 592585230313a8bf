//! In-memory task store.

use super::{StoreError, TaskStore};
use crate::task::{NewTask, ReminderTime, Task, TaskId, TaskStatus};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Mutex-guarded map of tasks. Insertion order is kept through a sequence
/// number so listings are stable.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_seq: u64,
    tasks: BTreeMap<u64, Task>,
}

impl InMemoryTaskStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tasks, any status.
    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.tasks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }
}

impl TaskStore for InMemoryTaskStore {
    fn insert(&self, task: &NewTask) -> Result<TaskId, StoreError> {
        let mut inner = self.lock()?;
        let id = TaskId::generate();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.tasks.insert(seq, task.clone().into_task(id.clone()));
        Ok(id)
    }

    fn get(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.tasks.values().find(|t| &t.id == id).cloned())
    }

    fn find_pending(&self) -> Result<Vec<Task>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .tasks
            .values()
            .filter(|t| t.is_pending())
            .cloned()
            .collect())
    }

    fn find_by_reminder_time(&self, at: ReminderTime) -> Result<Vec<Task>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .tasks
            .values()
            .filter(|t| t.is_pending() && t.reminder_time == at)
            .cloned()
            .collect())
    }

    fn update_status(&self, id: &TaskId, status: TaskStatus) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        let Some(task) = inner.tasks.values_mut().find(|t| &t.id == id) else {
            return Ok(false);
        };
        if !task.status.can_transition_to(status) {
            return Ok(false);
        }
        task.status = status;
        Ok(true)
    }
}
