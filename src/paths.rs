//! Application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! | Purpose | Linux | macOS |
//! |---------|-------|-------|
//! | Data | `~/.local/share/famplan/` | `~/Library/Application Support/famplan/` |
//! | Config | `~/.config/famplan/` | `~/Library/Application Support/famplan/` |
//!
//! `FAMPLAN_DATA_DIR` and `FAMPLAN_CONFIG_DIR` override the defaults.

use std::path::PathBuf;

/// Application data root (task database, run-key ledger).
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("FAMPLAN_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("famplan"))
        .unwrap_or_else(|| PathBuf::from("/tmp/famplan-data"))
}

/// Application config directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("FAMPLAN_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("famplan"))
        .unwrap_or_else(|| PathBuf::from("/tmp/famplan-config"))
}

/// SQLite task database (`data_dir()/tasks.db`).
#[must_use]
pub fn tasks_db_path() -> PathBuf {
    data_dir().join("tasks.db")
}

/// Reminder run-key ledger (`data_dir()/reminder_runs.jsonl`).
#[must_use]
pub fn run_key_ledger_path() -> PathBuf {
    data_dir().join("reminder_runs.jsonl")
}
