//! Per-conversation dialogue engine.
//!
//! Sessions live in a map keyed by conversation id. Each session sits behind
//! its own async mutex, so inputs of one conversation are handled one at a
//! time while different conversations never wait on each other.

use crate::config::DialogueConfig;
use crate::dialogue::state::{DialogueSession, DialogueState, Step};
use crate::error::{PlannerError, Result, ValidationError};
use crate::scheduler::{Clock, ReminderScheduler};
use crate::store::TaskStore;
use crate::task::{ConversationId, Task};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

type SessionHandle = Arc<AsyncMutex<DialogueSession>>;

/// What happened to a dialogue input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogueOutcome {
    /// Input accepted; the session now waits in `state`.
    Prompt { state: DialogueState },
    /// Input refused; the session stays in `state`.
    Rejected {
        state: DialogueState,
        error: ValidationError,
    },
    /// Task persisted and its reminder armed. The session is gone.
    Completed { task: Task },
}

/// Drives task-creation dialogues.
pub struct DialogueEngine {
    store: Arc<dyn TaskStore>,
    scheduler: Arc<ReminderScheduler>,
    clock: Arc<dyn Clock>,
    collect_deadline: bool,
    session_ttl: Option<chrono::Duration>,
    sessions: Mutex<HashMap<ConversationId, SessionHandle>>,
}

impl DialogueEngine {
    pub fn new(
        store: Arc<dyn TaskStore>,
        scheduler: Arc<ReminderScheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            scheduler,
            clock,
            collect_deadline: true,
            session_ttl: None,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Apply the `[dialogue]` config section.
    pub fn with_config(self, config: &DialogueConfig) -> Self {
        let ttl = config
            .session_ttl_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .map(chrono::Duration::seconds);
        self.with_deadline_stage(config.collect_deadline)
            .with_session_ttl(ttl)
    }

    pub fn with_deadline_stage(mut self, enabled: bool) -> Self {
        self.collect_deadline = enabled;
        self
    }

    pub fn with_session_ttl(mut self, ttl: Option<chrono::Duration>) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Start a dialogue for `conversation`.
    ///
    /// # Errors
    ///
    /// [`PlannerError::SessionActive`] when one is already running; the
    /// existing session is kept.
    pub fn begin(&self, conversation: &ConversationId) -> Result<DialogueState> {
        let mut sessions = self.sessions();
        if sessions.contains_key(conversation) {
            return Err(PlannerError::SessionActive(conversation.to_string()));
        }
        let session = DialogueSession::new(conversation.clone(), self.clock.now());
        let state = session.state;
        sessions.insert(conversation.clone(), Arc::new(AsyncMutex::new(session)));
        debug!("dialogue started for {conversation}");
        Ok(state)
    }

    /// Feed one text input to the conversation's dialogue.
    ///
    /// # Errors
    ///
    /// [`PlannerError::NoSession`] when no dialogue is running and
    /// [`PlannerError::Persistence`] when the task could not be written; in
    /// the latter case the session stays at the reminder-time stage.
    pub async fn advance(&self, conversation: &ConversationId, input: &str) -> Result<DialogueOutcome> {
        let handle = self
            .session(conversation)
            .ok_or_else(|| PlannerError::NoSession(conversation.to_string()))?;
        let mut session = handle.lock().await;

        // Completed or cancelled while this input was waiting for the lock.
        if session.state.is_terminal() {
            return Err(PlannerError::NoSession(conversation.to_string()));
        }
        session.last_activity = self.clock.now();

        let new_task = match session.accept(input, self.collect_deadline) {
            Err(error) => {
                debug!("{conversation}: rejected input in {}: {error}", session.state);
                return Ok(DialogueOutcome::Rejected {
                    state: session.state,
                    error,
                });
            }
            Ok(Step::Advanced(state)) => {
                debug!("{conversation}: dialogue moved to {state}");
                return Ok(DialogueOutcome::Prompt { state });
            }
            Ok(Step::Ready(new_task)) => new_task,
        };

        let id = match self.store.insert(&new_task) {
            Ok(id) => id,
            Err(e) => {
                warn!("{conversation}: failed to persist task: {e}");
                return Err(PlannerError::Persistence(e));
            }
        };
        self.scheduler.arm(
            id.clone(),
            new_task.conversation_id.clone(),
            new_task.reminder_time,
        );
        session.state = DialogueState::Complete;
        self.remove_if_same(conversation, &handle);

        info!("{conversation}: task {id} created");
        Ok(DialogueOutcome::Completed {
            task: new_task.into_task(id),
        })
    }

    /// Abandon the conversation's dialogue. Returns whether one was running.
    pub async fn cancel(&self, conversation: &ConversationId) -> bool {
        let removed = self.sessions().remove(conversation);
        let Some(handle) = removed else {
            return false;
        };
        // Waits for an in-flight input; a store write that already started
        // is not interrupted.
        let mut session = handle.lock().await;
        if session.state.is_terminal() {
            return false;
        }
        session.state = DialogueState::Cancelled;
        debug!("{conversation}: dialogue cancelled");
        true
    }

    /// Current state of the conversation's dialogue, if any.
    pub async fn state(&self, conversation: &ConversationId) -> Option<DialogueState> {
        let handle = self.session(conversation)?;
        let session = handle.lock().await;
        Some(session.state)
    }

    pub fn has_session(&self, conversation: &ConversationId) -> bool {
        self.sessions().contains_key(conversation)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions().len()
    }

    /// Whether idle sessions are discarded at all.
    pub fn expires_sessions(&self) -> bool {
        self.session_ttl.is_some()
    }

    /// Drop sessions idle for longer than the configured TTL. Sessions busy
    /// with an input are skipped. Returns how many were discarded.
    pub fn expire_idle(&self) -> usize {
        let Some(ttl) = self.session_ttl else {
            return 0;
        };
        let cutoff = self.clock.now() - ttl;
        let mut sessions = self.sessions();
        let before = sessions.len();
        sessions.retain(|conversation, handle| {
            let Ok(mut session) = handle.try_lock() else {
                return true;
            };
            if session.last_activity > cutoff {
                return true;
            }
            session.state = DialogueState::Cancelled;
            info!("{conversation}: dialogue expired after inactivity");
            false
        });
        before - sessions.len()
    }

    fn session(&self, conversation: &ConversationId) -> Option<SessionHandle> {
        self.sessions().get(conversation).cloned()
    }

    fn remove_if_same(&self, conversation: &ConversationId, handle: &SessionHandle) {
        let mut sessions = self.sessions();
        if sessions
            .get(conversation)
            .is_some_and(|current| Arc::ptr_eq(current, handle))
        {
            sessions.remove(conversation);
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<ConversationId, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
