//! Task-creation dialogue states and the per-conversation session record.
//!
//! ```text
//! AwaitingDescription → AwaitingAssignee → AwaitingDeadline → AwaitingReminderTime → Complete
//! ```
//!
//! `Cancelled` is reachable from any non-terminal state. The deadline stage
//! can be switched off, in which case the assignee leads straight to the
//! reminder time.

use crate::error::ValidationError;
use crate::task::{ConversationId, Deadline, NewTask, ReminderTime};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a conversation in the task-creation flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueState {
    AwaitingDescription,
    AwaitingAssignee,
    AwaitingDeadline,
    AwaitingReminderTime,
    /// Task persisted and reminder armed.
    Complete,
    /// Abandoned on request; nothing was written.
    Cancelled,
}

impl DialogueState {
    /// Successor after a valid input.
    ///
    /// Returns `None` for terminal states.
    ///
    /// # Examples
    ///
    /// ```
    /// use famplan::dialogue::DialogueState;
    ///
    /// assert_eq!(
    ///     DialogueState::AwaitingAssignee.next(true),
    ///     Some(DialogueState::AwaitingDeadline)
    /// );
    /// assert_eq!(
    ///     DialogueState::AwaitingAssignee.next(false),
    ///     Some(DialogueState::AwaitingReminderTime)
    /// );
    /// assert_eq!(DialogueState::Complete.next(true), None);
    /// ```
    #[must_use]
    pub fn next(self, collect_deadline: bool) -> Option<Self> {
        match self {
            Self::AwaitingDescription => Some(Self::AwaitingAssignee),
            Self::AwaitingAssignee if collect_deadline => Some(Self::AwaitingDeadline),
            Self::AwaitingAssignee => Some(Self::AwaitingReminderTime),
            Self::AwaitingDeadline => Some(Self::AwaitingReminderTime),
            Self::AwaitingReminderTime => Some(Self::Complete),
            Self::Complete | Self::Cancelled => None,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Cancelled)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingDescription => "awaiting_description",
            Self::AwaitingAssignee => "awaiting_assignee",
            Self::AwaitingDeadline => "awaiting_deadline",
            Self::AwaitingReminderTime => "awaiting_reminder_time",
            Self::Complete => "complete",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for DialogueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of feeding one input to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    /// Field accepted; the session now waits in this state.
    Advanced(DialogueState),
    /// Reminder time accepted; the task is ready to persist.
    Ready(NewTask),
}

/// Partially collected task for one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueSession {
    pub conversation_id: ConversationId,
    pub state: DialogueState,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub deadline: Option<Deadline>,
    pub last_activity: DateTime<Utc>,
}

impl DialogueSession {
    pub fn new(conversation_id: ConversationId, now: DateTime<Utc>) -> Self {
        Self {
            conversation_id,
            state: DialogueState::AwaitingDescription,
            description: None,
            assignee: None,
            deadline: None,
            last_activity: now,
        }
    }

    /// Validate `input` for the current state and record it.
    ///
    /// A rejected input leaves every field and the state untouched. The
    /// reminder-time stage does not move to `Complete` by itself: the caller
    /// does that once the task is persisted.
    pub(crate) fn accept(
        &mut self,
        input: &str,
        collect_deadline: bool,
    ) -> Result<Step, ValidationError> {
        match self.state {
            DialogueState::AwaitingDescription => {
                self.description = Some(non_empty(input, "description")?);
            }
            DialogueState::AwaitingAssignee => {
                self.assignee = Some(non_empty(input, "assignee")?);
            }
            DialogueState::AwaitingDeadline => {
                self.deadline = Some(Deadline::parse(input)?);
            }
            DialogueState::AwaitingReminderTime => {
                let reminder_time = ReminderTime::parse(input)?;
                return Ok(Step::Ready(NewTask {
                    description: self.description.clone().unwrap_or_default(),
                    assignee: self.assignee.clone().unwrap_or_default(),
                    deadline: self.deadline,
                    reminder_time,
                    conversation_id: self.conversation_id.clone(),
                }));
            }
            DialogueState::Complete | DialogueState::Cancelled => {
                return Ok(Step::Advanced(self.state));
            }
        }

        if let Some(next) = self.state.next(collect_deadline) {
            self.state = next;
        }
        Ok(Step::Advanced(self.state))
    }
}

fn non_empty(input: &str, field: &'static str) -> Result<String, ValidationError> {
    if input.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(input.to_owned())
}
