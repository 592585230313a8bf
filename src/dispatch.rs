//! Routes inbound chat events to the dialogue engine, the task store and
//! the reminder scheduler, and renders the replies.

use crate::channels::traits::{InboundMessage, OutboundMessage};
use crate::dialogue::{DialogueEngine, DialogueOutcome, DialogueState};
use crate::error::{PlannerError, Result};
use crate::messages;
use crate::scheduler::ReminderScheduler;
use crate::store::TaskStore;
use crate::task::{ConversationId, TaskId, TaskStatus};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Body of an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventBody {
    Text(String),
    Command { name: String, args: Vec<String> },
}

/// Inbound chat event after command detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub conversation_id: ConversationId,
    pub body: EventBody,
}

impl InboundEvent {
    /// Split `/name arg…` into a command; anything else is text.
    ///
    /// A trailing `@botname` on the command name is dropped and the name is
    /// lowercased.
    pub fn parse(conversation_id: ConversationId, text: &str) -> Self {
        let body = match text.trim_start().strip_prefix('/') {
            Some(rest) if !rest.is_empty() && !rest.starts_with(char::is_whitespace) => {
                let mut parts = rest.split_whitespace();
                let raw_name = parts.next().unwrap_or_default();
                let name = raw_name
                    .split_once('@')
                    .map_or(raw_name, |(name, _bot)| name)
                    .to_ascii_lowercase();
                EventBody::Command {
                    name,
                    args: parts.map(str::to_owned).collect(),
                }
            }
            _ => EventBody::Text(text.to_owned()),
        };
        Self {
            conversation_id,
            body,
        }
    }
}

impl From<InboundMessage> for InboundEvent {
    fn from(message: InboundMessage) -> Self {
        Self::parse(message.conversation_id, &message.text)
    }
}

/// Recognised commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    AddTask,
    Tasks,
    Done(Option<TaskId>),
    Cancel,
    Unknown(String),
}

impl Command {
    pub fn from_parts(name: &str, args: &[String]) -> Self {
        match name {
            "start" | "help" => Self::Start,
            "addtask" => Self::AddTask,
            "tasks" => Self::Tasks,
            "done" => Self::Done(args.first().map(|id| TaskId::new(id.trim()))),
            "cancel" => Self::Cancel,
            other => Self::Unknown(other.to_owned()),
        }
    }
}

/// Text that cancels an active dialogue without the slash command.
const CANCEL_WORD: &str = "cancel";

/// Inbound event router.
pub struct Dispatcher {
    store: Arc<dyn TaskStore>,
    scheduler: Arc<ReminderScheduler>,
    engine: Arc<DialogueEngine>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn TaskStore>,
        scheduler: Arc<ReminderScheduler>,
        engine: Arc<DialogueEngine>,
    ) -> Self {
        Self {
            store,
            scheduler,
            engine,
        }
    }

    pub fn engine(&self) -> &Arc<DialogueEngine> {
        &self.engine
    }

    /// Handle one event and return the replies for its conversation.
    ///
    /// Never fails: errors are turned into user-facing replies.
    pub async fn handle(&self, event: &InboundEvent) -> Vec<OutboundMessage> {
        let conversation = &event.conversation_id;
        let texts = match self.route(event).await {
            Ok(texts) => texts,
            Err(e) => vec![error_reply(conversation, &e)],
        };
        texts
            .into_iter()
            .map(|text| OutboundMessage::new(conversation.clone(), text))
            .collect()
    }

    async fn route(&self, event: &InboundEvent) -> Result<Vec<String>> {
        let conversation = &event.conversation_id;
        match &event.body {
            EventBody::Command { name, args } => {
                debug!("{conversation}: command /{name}");
                self.command(conversation, Command::from_parts(name, args))
                    .await
            }
            EventBody::Text(text) => {
                if text.trim().eq_ignore_ascii_case(CANCEL_WORD)
                    && self.engine.has_session(conversation)
                {
                    return self.cancel(conversation).await;
                }
                self.dialogue_input(conversation, text).await
            }
        }
    }

    async fn command(&self, conversation: &ConversationId, command: Command) -> Result<Vec<String>> {
        match command {
            Command::Start => Ok(vec![messages::GREETING.to_owned()]),
            Command::AddTask => {
                let state = self.engine.begin(conversation)?;
                Ok(vec![prompt(state).to_owned()])
            }
            Command::Tasks => Ok(self.list_pending(conversation)),
            Command::Done(id) => self.complete(id),
            Command::Cancel => self.cancel(conversation).await,
            Command::Unknown(name) => Ok(vec![messages::unknown_command(&name)]),
        }
    }

    async fn dialogue_input(&self, conversation: &ConversationId, text: &str) -> Result<Vec<String>> {
        let reply = match self.engine.advance(conversation, text).await? {
            DialogueOutcome::Prompt { state } => prompt(state).to_owned(),
            DialogueOutcome::Rejected { error, .. } => messages::invalid_input(&error),
            DialogueOutcome::Completed { task } => messages::task_created(&task.id),
        };
        Ok(vec![reply])
    }

    async fn cancel(&self, conversation: &ConversationId) -> Result<Vec<String>> {
        let reply = if self.engine.cancel(conversation).await {
            messages::CANCELLED
        } else {
            messages::NOTHING_TO_CANCEL
        };
        Ok(vec![reply.to_owned()])
    }

    /// All pending tasks, one message each.
    fn list_pending(&self, conversation: &ConversationId) -> Vec<String> {
        let pending = match self.store.find_pending() {
            Ok(pending) => pending,
            Err(e) => {
                error!("{conversation}: could not read pending tasks: {e}");
                return vec![messages::STORE_READ_FAILURE.to_owned()];
            }
        };
        if pending.is_empty() {
            return vec![messages::NO_PENDING_TASKS.to_owned()];
        }
        pending.iter().map(messages::task_summary).collect()
    }

    fn complete(&self, id: Option<TaskId>) -> Result<Vec<String>> {
        let id = id
            .filter(|id| !id.as_str().is_empty())
            .ok_or(PlannerError::MissingArgument {
                usage: messages::DONE_USAGE,
            })?;

        if !self.store.update_status(&id, TaskStatus::Completed)? {
            return Err(PlannerError::NotFound(id.to_string()));
        }
        self.scheduler.disarm(&id);
        info!("task {id} completed");
        Ok(vec![messages::task_completed(&id)])
    }
}

fn prompt(state: DialogueState) -> &'static str {
    match state {
        DialogueState::AwaitingDescription => messages::ASK_DESCRIPTION,
        DialogueState::AwaitingAssignee => messages::ASK_ASSIGNEE,
        DialogueState::AwaitingDeadline => messages::ASK_DEADLINE,
        DialogueState::AwaitingReminderTime => messages::ASK_REMINDER_TIME,
        DialogueState::Complete | DialogueState::Cancelled => messages::GREETING,
    }
}

fn error_reply(conversation: &ConversationId, err: &PlannerError) -> String {
    match err {
        PlannerError::Validation(e) => messages::invalid_input(e),
        PlannerError::NotFound(_) => messages::TASK_NOT_FOUND.to_owned(),
        PlannerError::MissingArgument { usage } => (*usage).to_owned(),
        PlannerError::NoSession(_) => messages::NO_SESSION.to_owned(),
        PlannerError::SessionActive(_) => messages::SESSION_ACTIVE.to_owned(),
        PlannerError::Persistence(e) => {
            error!("{conversation}: store failure: {e}");
            messages::STORE_FAILURE.to_owned()
        }
        other => {
            error!("{conversation}: {other}");
            messages::GENERIC_FAILURE.to_owned()
        }
    }
}
