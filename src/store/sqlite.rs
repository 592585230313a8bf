//! SQLite-backed task store.
//!
//! A single database file holds every task. The connection sits behind a
//! `Mutex`, which makes each trait method atomic with respect to the others:
//! the reminder tick's pending snapshot can never observe a half-applied
//! completion.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, params};

use super::schema::{apply_schema, read_schema_version};
use super::{StoreError, TaskStore};
use crate::task::{ConversationId, Deadline, NewTask, ReminderTime, Task, TaskId, TaskStatus};

const SELECT_COLUMNS: &str =
    "SELECT id, description, assignee, deadline, reminder_time, status, conversation_id FROM tasks";

/// SQLite task store.
pub struct SqliteTaskStore {
    conn: Mutex<Connection>,
}

impl SqliteTaskStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        apply_schema(&conn)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        tracing::debug!(
            "opened task store at {} (schema v{})",
            path.display(),
            store.schema_version()?.unwrap_or_default()
        );
        Ok(store)
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn schema_version(&self) -> Result<Option<u32>, StoreError> {
        let conn = self.lock()?;
        Ok(read_schema_version(&conn)?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }

    fn query_raw(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<RawTask>, StoreError> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, row_to_raw)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Snapshot query: rows that no longer decode are logged and left out,
    /// so one bad record cannot hide every other task.
    fn query_snapshot(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Task>, StoreError> {
        let tasks = Self::query_raw(conn, sql, params)?
            .into_iter()
            .filter_map(|raw| match raw.into_task() {
                Ok(task) => Some(task),
                Err(e) => {
                    tracing::warn!("skipping unreadable task row: {e}");
                    None
                }
            })
            .collect();
        Ok(tasks)
    }
}

impl TaskStore for SqliteTaskStore {
    fn insert(&self, task: &NewTask) -> Result<TaskId, StoreError> {
        let conn = self.lock()?;
        let id = TaskId::generate();
        let now = chrono::Utc::now().timestamp();

        conn.execute(
            "INSERT INTO tasks \
             (id, description, assignee, deadline, reminder_time, status, conversation_id, \
              created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?7, ?8)",
            params![
                id.as_str(),
                task.description,
                task.assignee,
                task.deadline.map(|d| d.to_string()),
                task.reminder_time.to_string(),
                task.conversation_id.as_str(),
                now,
                now
            ],
        )?;

        Ok(id)
    }

    fn get(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
        Self::query_raw(&conn, &sql, params![id.as_str()])?
            .into_iter()
            .next()
            .map(RawTask::into_task)
            .transpose()
    }

    fn find_pending(&self) -> Result<Vec<Task>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("{SELECT_COLUMNS} WHERE status = 'pending' ORDER BY rowid");
        Self::query_snapshot(&conn, &sql, [])
    }

    fn find_by_reminder_time(&self, at: ReminderTime) -> Result<Vec<Task>, StoreError> {
        let conn = self.lock()?;
        let sql =
            format!("{SELECT_COLUMNS} WHERE status = 'pending' AND reminder_time = ?1 ORDER BY rowid");
        Self::query_snapshot(&conn, &sql, params![at.to_string()])
    }

    fn update_status(&self, id: &TaskId, status: TaskStatus) -> Result<bool, StoreError> {
        // Completion is the only legal transition, so the guard is on the
        // source status.
        if !TaskStatus::Pending.can_transition_to(status) {
            return Ok(false);
        }

        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE tasks SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = 'pending'",
            params![status.as_str(), chrono::Utc::now().timestamp(), id.as_str()],
        )?;
        Ok(rows > 0)
    }
}

// ---------------------------------------------------------------------------
// Row conversion helpers
// ---------------------------------------------------------------------------

struct RawTask {
    id: String,
    description: String,
    assignee: String,
    deadline: Option<String>,
    reminder_time: String,
    status: String,
    conversation_id: String,
}

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawTask> {
    Ok(RawTask {
        id: row.get(0)?,
        description: row.get(1)?,
        assignee: row.get(2)?,
        deadline: row.get(3)?,
        reminder_time: row.get(4)?,
        status: row.get(5)?,
        conversation_id: row.get(6)?,
    })
}

impl RawTask {
    fn into_task(self) -> Result<Task, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            id: self.id.clone(),
            reason,
        };

        let deadline = match &self.deadline {
            Some(raw) => Some(Deadline::parse(raw).map_err(|e| corrupt(e.to_string()))?),
            None => None,
        };
        let reminder_time =
            ReminderTime::parse(&self.reminder_time).map_err(|e| corrupt(e.to_string()))?;
        let status = TaskStatus::parse(&self.status)
            .ok_or_else(|| corrupt(format!("unknown status `{}`", self.status)))?;

        Ok(Task {
            id: TaskId::new(self.id),
            description: self.description,
            assignee: self.assignee,
            deadline,
            reminder_time,
            status,
            conversation_id: ConversationId::new(self.conversation_id),
        })
    }
}
