//! Reminder scheduling.
//!
//! Pending tasks get an armed reminder at their daily `HH:MM` in the
//! reference timezone; a background loop ticks once a minute and delivers
//! whatever is due.

pub mod authority;
pub mod clock;
pub mod reminders;
pub mod runner;

pub use authority::{RunKey, RunKeyLedger};
pub use clock::{Clock, ManualClock, SystemClock};
pub use reminders::{ArmedReminder, Recurrence, ReferenceZone, SchedulerMode};
pub use runner::{ReminderScheduler, TICK_INTERVAL_SECS, TickReport};
