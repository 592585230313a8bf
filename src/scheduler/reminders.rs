//! Armed reminder records and occurrence arithmetic.
//!
//! All reminder times are wall-clock `HH:MM` values in a single reference
//! timezone. The scheduler keeps instants in UTC and only converts at the
//! edges through [`ReferenceZone`].

use crate::task::{ConversationId, ReminderTime, TaskId};
use chrono::{
    DateTime, Duration, DurationRound, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default reference offset: UTC+03:00.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 180;

const MAX_OFFSET_MINUTES: u32 = 18 * 60;

/// How the scheduler decides which reminders are due.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerMode {
    /// Per-task armed reminders with an absolute fire instant.
    #[default]
    Armed,
    /// Query the store for tasks whose reminder matches the current minute.
    Poll,
}

impl fmt::Display for SchedulerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Armed => f.write_str("armed"),
            Self::Poll => f.write_str("poll"),
        }
    }
}

/// What happens to an armed reminder after it fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    /// Fire every day at the reminder time until the task is completed.
    #[default]
    Daily,
    /// Fire once, then drop the reminder.
    Once,
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily => f.write_str("daily"),
            Self::Once => f.write_str("once"),
        }
    }
}

/// The timezone reminder times are interpreted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceZone {
    offset: FixedOffset,
}

impl ReferenceZone {
    /// Build from an offset east of UTC in minutes. `None` when outside ±18h.
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        if minutes.unsigned_abs() > MAX_OFFSET_MINUTES {
            return None;
        }
        FixedOffset::east_opt(minutes * 60).map(|offset| Self { offset })
    }

    #[must_use]
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// Local wall-clock view of `instant`.
    pub fn local(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset)
    }

    /// Local calendar date of `instant`.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.local(instant).date_naive()
    }

    /// Local minute of `instant`, seconds discarded.
    pub fn local_minute(&self, instant: DateTime<Utc>) -> ReminderTime {
        ReminderTime::from_naive_time(self.local(instant).time())
    }

    /// Convert a local wall-clock datetime to UTC.
    pub fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        (local - Duration::seconds(i64::from(self.offset.local_minus_utc()))).and_utc()
    }
}

impl Default for ReferenceZone {
    fn default() -> Self {
        Self::from_offset_minutes(DEFAULT_UTC_OFFSET_MINUTES).unwrap_or_else(Self::utc)
    }
}

/// First instant at or after `now`'s minute at which `at` occurs locally.
///
/// Arming during the reminder minute itself yields this minute, so the
/// next tick still delivers it.
pub fn next_occurrence(now: DateTime<Utc>, at: ReminderTime, zone: ReferenceZone) -> DateTime<Utc> {
    let today = zone.local_date(now);
    let date = if at >= zone.local_minute(now) {
        today
    } else {
        today.succ_opt().unwrap_or(today)
    };
    zone.to_utc(date.and_time(at.as_naive_time()))
}

/// Next daily occurrence strictly after `now`, starting from a fired instant.
pub fn next_daily_after(fired_at: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let mut next = fired_at + Duration::days(1);
    while next <= now {
        next += Duration::days(1);
    }
    next
}

/// Delivery intent for one pending task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmedReminder {
    pub task_id: TaskId,
    pub conversation_id: ConversationId,
    pub reminder_time: ReminderTime,
    /// Absolute instant of the next firing.
    pub fire_at: DateTime<Utc>,
}

impl ArmedReminder {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.fire_at <= now
    }
}

/// `instant` with seconds cleared. Reference offsets are whole minutes, so
/// this is also the start of the local minute.
pub(crate) fn truncate_to_minute(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .duration_trunc(Duration::minutes(1))
        .unwrap_or(instant)
}
