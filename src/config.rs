//! Configuration types for the task planner.

use crate::error::{PlannerError, Result};
use crate::scheduler::reminders::{
    DEFAULT_UTC_OFFSET_MINUTES, Recurrence, ReferenceZone, SchedulerMode,
};
use crate::scheduler::runner::TICK_INTERVAL_SECS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Task persistence.
    pub store: StoreConfig,
    /// Reminder scheduling.
    pub scheduler: SchedulerConfig,
    /// Task-creation dialogue.
    pub dialogue: DialogueConfig,
}

/// Which [`TaskStore`](crate::store::TaskStore) implementation backs the planner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// SQLite database file.
    #[default]
    Sqlite,
    /// Process memory; everything is lost on exit.
    Memory,
}

/// Task store configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Database file. `None` uses `<data dir>/tasks.db`.
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Database path after applying the default.
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(crate::paths::tasks_db_path)
    }
}

/// Reminder scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// `armed` (per-task fire instants) or `poll` (store query per minute).
    pub mode: SchedulerMode,
    /// `daily` re-arms after firing, `once` drops the reminder.
    pub recurrence: Recurrence,
    /// Seconds between ticks, 1..=60.
    pub tick_interval_secs: u64,
    /// Reference timezone as minutes east of UTC. Default 180 (UTC+03:00).
    pub utc_offset_minutes: i32,
    /// Record fired occurrences on disk so restarts never repeat them.
    pub persist_run_keys: bool,
    /// Run-key ledger file. `None` uses `<data dir>/reminder_runs.jsonl`.
    pub ledger_path: Option<PathBuf>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            mode: SchedulerMode::default(),
            recurrence: Recurrence::default(),
            tick_interval_secs: TICK_INTERVAL_SECS,
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            persist_run_keys: true,
            ledger_path: None,
        }
    }
}

impl SchedulerConfig {
    /// Ledger file to use, or `None` for an in-memory ledger.
    pub fn resolved_ledger_path(&self) -> Option<PathBuf> {
        if !self.persist_run_keys {
            return None;
        }
        Some(
            self.ledger_path
                .clone()
                .unwrap_or_else(crate::paths::run_key_ledger_path),
        )
    }
}

/// Dialogue configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    /// Ask for a deadline between the assignee and the reminder time.
    pub collect_deadline: bool,
    /// Discard sessions idle for longer than this. `None` keeps them forever.
    pub session_ttl_secs: Option<u64>,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            collect_deadline: true,
            session_ttl_secs: None,
        }
    }
}

impl PlannerConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| PlannerError::Config(e.to_string()))
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!("no config at {}; using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| PlannerError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/config.toml`.
    pub fn default_config_path() -> PathBuf {
        crate::paths::config_dir().join("config.toml")
    }

    /// Reject values the runtime cannot honor.
    pub fn validate(&self) -> Result<()> {
        let tick = self.scheduler.tick_interval_secs;
        if tick == 0 || tick > TICK_INTERVAL_SECS {
            return Err(PlannerError::Config(format!(
                "scheduler.tick_interval_secs must be between 1 and {TICK_INTERVAL_SECS}, got {tick}"
            )));
        }
        if ReferenceZone::from_offset_minutes(self.scheduler.utc_offset_minutes).is_none() {
            return Err(PlannerError::Config(format!(
                "scheduler.utc_offset_minutes must be within +/-1080, got {}",
                self.scheduler.utc_offset_minutes
            )));
        }
        if self.dialogue.session_ttl_secs == Some(0) {
            return Err(PlannerError::Config(
                "dialogue.session_ttl_secs must be positive when set".to_owned(),
            ));
        }
        if let Some(path) = &self.store.path
            && path.as_os_str().is_empty()
        {
            return Err(PlannerError::Config("store.path must not be empty".to_owned()));
        }
        Ok(())
    }
}
