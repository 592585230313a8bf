//! Task records and the field parsers used while collecting them.
//!
//! Defines the persisted [`Task`] record, its insert-time form [`NewTask`],
//! the opaque [`TaskId`] / [`ConversationId`] handles and the two validated
//! field types [`Deadline`] and [`ReminderTime`].

use crate::error::ValidationError;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wire/display format for deadlines.
pub const DEADLINE_FORMAT: &str = "%d:%m:%Y";

/// Opaque task identifier handed to users for the `done` command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wrap an existing identifier (e.g. one typed by a user).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier (32 lowercase hex characters).
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque handle of the chat a reminder is delivered to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Task lifecycle. The only legal transition is `Pending -> Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    /// Parse the stored string form. Unknown values yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Whether `self -> next` is an allowed status change.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!((self, next), (Self::Pending, Self::Completed))
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calendar deadline entered as `DD:MM:YYYY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Deadline(NaiveDate);

impl Deadline {
    /// Parse a user-supplied deadline. Surrounding whitespace is ignored and
    /// the date must exist (`31:02:2024` is rejected).
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        NaiveDate::parse_from_str(trimmed, DEADLINE_FORMAT)
            .map(Self)
            .map_err(|_| ValidationError::Deadline(trimmed.to_owned()))
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for Deadline {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DEADLINE_FORMAT))
    }
}

impl FromStr for Deadline {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Deadline {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Deadline> for String {
    fn from(value: Deadline) -> Self {
        value.to_string()
    }
}

/// Time of day a reminder fires, minute granularity, 24-hour clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReminderTime {
    hour: u8,
    minute: u8,
}

impl ReminderTime {
    /// Build from components; `None` when out of range.
    #[must_use]
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    /// Parse `HH:MM`. One or two digits per component are accepted
    /// (`9:05` normalizes to `09:05`); anything else is rejected.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        let invalid = || ValidationError::ReminderTime(trimmed.to_owned());

        let (hour, minute) = trimmed.split_once(':').ok_or_else(invalid)?;
        let hour = parse_component(hour).ok_or_else(invalid)?;
        let minute = parse_component(minute).ok_or_else(invalid)?;
        Self::new(hour, minute).ok_or_else(invalid)
    }

    pub fn hour(self) -> u8 {
        self.hour
    }

    pub fn minute(self) -> u8 {
        self.minute
    }

    /// Truncate a wall-clock time to its reminder minute.
    #[must_use]
    pub fn from_naive_time(time: NaiveTime) -> Self {
        use chrono::Timelike;
        // hour() < 24 and minute() < 60 always hold for NaiveTime.
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }

    pub fn as_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
            .unwrap_or(NaiveTime::MIN)
    }
}

fn parse_component(raw: &str) -> Option<u8> {
    if raw.is_empty() || raw.len() > 2 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

impl fmt::Display for ReminderTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for ReminderTime {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ReminderTime {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ReminderTime> for String {
    fn from(value: ReminderTime) -> Self {
        value.to_string()
    }
}

/// A fully collected task that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub description: String,
    pub assignee: String,
    pub deadline: Option<Deadline>,
    pub reminder_time: ReminderTime,
    pub conversation_id: ConversationId,
}

impl NewTask {
    /// Attach the store-assigned id. New tasks always start `Pending`.
    #[must_use]
    pub fn into_task(self, id: TaskId) -> Task {
        Task {
            id,
            description: self.description,
            assignee: self.assignee,
            deadline: self.deadline,
            reminder_time: self.reminder_time,
            status: TaskStatus::Pending,
            conversation_id: self.conversation_id,
        }
    }
}

/// A persisted task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    pub assignee: String,
    pub deadline: Option<Deadline>,
    pub reminder_time: ReminderTime,
    pub status: TaskStatus,
    pub conversation_id: ConversationId,
}

impl Task {
    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn reminder_time_accepts_valid_range() {
        assert_eq!(ReminderTime::parse("00:00").unwrap().to_string(), "00:00");
        assert_eq!(ReminderTime::parse("23:59").unwrap().to_string(), "23:59");
        assert_eq!(ReminderTime::parse(" 9:05 ").unwrap().to_string(), "09:05");
    }

    #[test]
    fn reminder_time_rejects_out_of_range_and_garbage() {
        for raw in ["24:00", "12:60", "-1:30", "12", "12:5a", "1230", "12:30:00", "", ":", "123:00"] {
            assert!(
                matches!(ReminderTime::parse(raw), Err(ValidationError::ReminderTime(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn reminder_time_new_checks_bounds() {
        assert!(ReminderTime::new(23, 59).is_some());
        assert!(ReminderTime::new(24, 0).is_none());
        assert!(ReminderTime::new(0, 60).is_none());
    }

    #[test]
    fn deadline_parses_and_normalizes() {
        let deadline = Deadline::parse("1:3:2025").unwrap();
        assert_eq!(deadline.to_string(), "01:03:2025");
        assert_eq!(Deadline::parse("29:02:2024").unwrap().to_string(), "29:02:2024");
    }

    #[test]
    fn deadline_rejects_impossible_and_malformed_dates() {
        for raw in ["31:02:2024", "31-02-2024", "tomorrow", "2024:01:01", "", "15:13:2024"] {
            assert!(
                matches!(Deadline::parse(raw), Err(ValidationError::Deadline(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn status_only_moves_forward() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Completed));
    }

    #[test]
    fn generated_ids_are_unique_hex() {
        let a = TaskId::generate();
        let b = TaskId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().bytes().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn task_serializes_fields_in_display_form() {
        let task = NewTask {
            description: "Buy milk".to_owned(),
            assignee: "Anna".to_owned(),
            deadline: Some(Deadline::parse("05:06:2025").unwrap()),
            reminder_time: ReminderTime::parse("8:30").unwrap(),
            conversation_id: ConversationId::new("42"),
        }
        .into_task(TaskId::new("abc"));

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["deadline"], "05:06:2025");
        assert_eq!(json["reminder_time"], "08:30");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["conversation_id"], "42");
    }
}
