//! Reminder delivery ledger.
//!
//! Every firing is identified by a [`RunKey`]: the task and the
//! reference-zone date of the occurrence. Keys are recorded before delivery,
//! so a restarted process, or a second instance sharing the ledger file,
//! never sends the same day's reminder twice.
//!
//! Only today's and yesterday's occurrences can still fire, so keys dated
//! earlier are compacted out of the file whenever the ledger sees them.
//! The file therefore holds at most two days of keys per pending task.

use crate::error::{PlannerError, Result};
use crate::task::TaskId;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

/// How long a writer waits for another instance to release the ledger.
const LOCK_TIMEOUT: Duration = Duration::from_millis(1500);

/// Lock files older than this are assumed to belong to a crashed process.
const STALE_LOCK_AGE: Duration = Duration::from_secs(30);

/// One occurrence of a task's reminder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunKey {
    pub task_id: TaskId,
    pub date: NaiveDate,
}

impl RunKey {
    pub fn new(task_id: TaskId, date: NaiveDate) -> Self {
        Self { task_id, date }
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.task_id, self.date.format("%Y-%m-%d"))
    }
}

/// Delivered-occurrence ledger, backed by a JSONL file or kept in memory.
///
/// File operations block; async callers should go through
/// `tokio::task::spawn_blocking`.
#[derive(Debug)]
pub struct RunKeyLedger {
    path: Option<PathBuf>,
    seen: HashSet<RunKey>,
}

impl RunKeyLedger {
    /// Ledger bound to a JSONL file. The file is created on first write.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            seen: HashSet::new(),
        }
    }

    /// Process-local ledger; forgotten on exit.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            seen: HashSet::new(),
        }
    }

    /// Claim every key in `keys`. The result holds, per key, `true` when the
    /// occurrence was not recorded before and may be delivered now.
    ///
    /// Keys dated before the day preceding `today` are dropped from the
    /// ledger on the way.
    pub fn record_batch(&mut self, today: NaiveDate, keys: &[RunKey]) -> Result<Vec<bool>> {
        let horizon = today.checked_sub_days(Days::new(1)).unwrap_or(today);

        let Some(path) = self.path.clone() else {
            self.seen.retain(|key| key.date >= horizon);
            return Ok(keys.iter().map(|key| self.seen.insert(key.clone())).collect());
        };

        let _lock = LedgerLock::acquire(&path)?;
        let stored = read_keys(&path)?;
        let stored_len = stored.len();
        self.seen = stored.into_iter().filter(|key| key.date >= horizon).collect();
        let compacted = self.seen.len() < stored_len;

        let claimed: Vec<bool> = keys.iter().map(|key| self.seen.insert(key.clone())).collect();
        let added: Vec<&RunKey> = keys
            .iter()
            .zip(&claimed)
            .filter_map(|(key, &new)| new.then_some(key))
            .collect();

        if compacted {
            let mut retained: Vec<&RunKey> = self.seen.iter().collect();
            retained.sort();
            rewrite_keys(&path, &retained)?;
            tracing::debug!(
                "compacted run-key ledger {}: {} -> {} entries",
                path.display(),
                stored_len + added.len(),
                retained.len()
            );
        } else if !added.is_empty() {
            append_keys(&path, &added)?;
        }
        Ok(claimed)
    }
}

fn ledger_error(action: &str, path: &Path, err: impl fmt::Display) -> PlannerError {
    PlannerError::Scheduler(format!("failed to {action} {}: {err}", path.display()))
}

fn read_keys(path: &Path) -> Result<Vec<RunKey>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ledger_error("read run-key ledger", path, e)),
    };

    let keys = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str::<RunKey>(line) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!("ignoring malformed run-key line in {}: {e}", path.display());
                None
            }
        })
        .collect();
    Ok(keys)
}

fn encode(keys: &[&RunKey]) -> Result<String> {
    let mut out = String::new();
    for key in keys {
        let line = serde_json::to_string(key)
            .map_err(|e| PlannerError::Scheduler(format!("failed to encode run key {key}: {e}")))?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

fn append_keys(path: &Path, keys: &[&RunKey]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ledger_error("open run-key ledger", path, e))?;
    file.write_all(encode(keys)?.as_bytes())
        .map_err(|e| ledger_error("append to run-key ledger", path, e))
}

/// Replace the ledger through a temp file and rename, so readers never see a
/// half-written file.
fn rewrite_keys(path: &Path, keys: &[&RunKey]) -> Result<()> {
    let tmp = path.with_extension("jsonl.tmp");
    std::fs::write(&tmp, encode(keys)?).map_err(|e| ledger_error("write", &tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| ledger_error("replace run-key ledger", path, e))
}

/// Exclusive lock file next to the ledger, removed on drop.
struct LedgerLock {
    path: PathBuf,
}

impl LedgerLock {
    fn acquire(ledger: &Path) -> Result<Self> {
        let path = ledger.with_extension("lock");
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| ledger_error("create directory", parent, e))?;
        }

        let deadline = Instant::now() + LOCK_TIMEOUT;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if lock_is_stale(&path) {
                        tracing::warn!("removing stale run-key lock {}", path.display());
                        let _ = std::fs::remove_file(&path);
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return Err(PlannerError::Scheduler(format!(
                            "timed out waiting for run-key lock {}",
                            path.display()
                        )));
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
                Err(e) => return Err(ledger_error("create run-key lock", &path, e)),
            }
        }
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn lock_is_stale(path: &Path) -> bool {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_LOCK_AGE)
}
