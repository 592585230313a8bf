//! Error types for the famplan core.

use crate::store::StoreError;

/// Why a dialogue input was refused. The session stays where it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Free-text stage received nothing but whitespace.
    #[error("{field} must not be empty")]
    Empty {
        /// Name of the field being collected.
        field: &'static str,
    },

    /// Deadline is not a real `DD:MM:YYYY` calendar date.
    #[error("invalid deadline `{0}`, expected DD:MM:YYYY")]
    Deadline(String),

    /// Reminder time is not a valid 24-hour `HH:MM`.
    #[error("invalid reminder time `{0}`, expected HH:MM (00:00-23:59)")]
    ReminderTime(String),
}

/// Top-level error type for the planner.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    /// Malformed user input, recovered by re-prompting.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Unknown or already completed task id.
    #[error("task not found: {0}")]
    NotFound(String),

    /// A command was issued without a required argument.
    #[error("missing argument: {usage}")]
    MissingArgument {
        /// Usage hint shown to the user.
        usage: &'static str,
    },

    /// Text arrived for a conversation with no dialogue in progress.
    #[error("no active dialogue for conversation {0}")]
    NoSession(String),

    /// `addtask` arrived while a dialogue is already running.
    #[error("dialogue already active for conversation {0}")]
    SessionActive(String),

    /// Store unavailable or write failure.
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// A reminder could not be handed to the transport.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Scheduler bookkeeping error (run-key ledger, lock files).
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, PlannerError>;
