//! famplan: chat-driven family task tracker.
//!
//! A guided dialogue collects a task (description, assignee, deadline and a
//! daily reminder time), the task is persisted, and a reminder is delivered
//! back to the originating conversation every day at that time until the
//! task is marked done.
//!
//! # Architecture
//!
//! - **Dialogue**: per-conversation state machine validating each field
//! - **Store**: `TaskStore` trait with SQLite and in-memory backends
//! - **Scheduler**: armed reminders, a once-a-minute tick and a run-key
//!   ledger that keeps each occurrence to a single delivery
//! - **Dispatch**: command parsing and reply rendering
//! - **Channels**: transport adapters and the message runtime

pub mod channels;
pub mod config;
pub mod dialogue;
pub mod dispatch;
pub mod error;
pub mod messages;
pub mod paths;
pub mod planner;
pub mod scheduler;
pub mod store;
pub mod task;

pub use config::PlannerConfig;
pub use error::{PlannerError, Result, ValidationError};
pub use planner::Planner;
