//! Shared helpers for integration tests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use famplan::channels::traits::{DeliverySink, OutboundMessage};
use famplan::config::{PlannerConfig, StoreBackend};
use famplan::dispatch::InboundEvent;
use famplan::scheduler::{ManualClock, ReferenceZone};
use famplan::store::SqliteTaskStore;
use famplan::task::ConversationId;
use famplan::Planner;
use std::sync::{Arc, Mutex};

/// Sink that records every delivery and can be told to fail.
#[derive(Default)]
pub(crate) struct RecordingSink {
    sent: Mutex<Vec<OutboundMessage>>,
    fail_for: Mutex<Option<ConversationId>>,
}

impl RecordingSink {
    pub(crate) fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn fail_for(&self, conversation: &str) {
        *self.fail_for.lock().unwrap() = Some(ConversationId::new(conversation));
    }
}

#[async_trait]
impl DeliverySink for RecordingSink {
    async fn deliver(&self, message: OutboundMessage) -> anyhow::Result<()> {
        if self.fail_for.lock().unwrap().as_ref() == Some(&message.conversation_id) {
            anyhow::bail!("conversation {} unreachable", message.conversation_id);
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

/// Instant for a wall-clock time in the default reference zone (UTC+3),
/// in June 2025.
pub(crate) fn local(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    let naive = NaiveDate::from_ymd_opt(2025, 6, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap();
    ReferenceZone::default().to_utc(naive)
}

/// Config with a file store and run-key ledger inside `dir`.
pub(crate) fn temp_config(dir: &tempfile::TempDir) -> PlannerConfig {
    let mut config = PlannerConfig::default();
    config.store.backend = StoreBackend::Sqlite;
    config.store.path = Some(dir.path().join("tasks.db"));
    config.scheduler.ledger_path = Some(dir.path().join("reminder_runs.jsonl"));
    config
}

/// A planner over a SQLite file in a fresh temp dir, driven by a manual clock.
pub(crate) struct TestPlanner {
    pub(crate) planner: Planner,
    pub(crate) clock: Arc<ManualClock>,
    pub(crate) config: PlannerConfig,
    pub(crate) dir: tempfile::TempDir,
}

impl TestPlanner {
    pub(crate) fn start(now: DateTime<Utc>) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = temp_config(&dir);
        let clock = Arc::new(ManualClock::new(now));
        let planner = Planner::from_config(&config, clock.clone()).expect("planner starts");
        Self {
            planner,
            clock,
            config,
            dir,
        }
    }

    /// Simulate a process restart: reopen the same files with a fresh planner.
    pub(crate) fn restart(self) -> Self {
        let Self {
            planner,
            clock,
            config,
            dir,
        } = self;
        drop(planner);
        let store = Arc::new(SqliteTaskStore::open(&config.store.resolved_path()).unwrap());
        let planner = Planner::with_store(&config, store, clock.clone()).expect("planner restarts");
        Self {
            planner,
            clock,
            config,
            dir,
        }
    }

    /// Send one chat line and collect the reply texts.
    pub(crate) async fn say(&self, conversation: &str, text: &str) -> Vec<String> {
        let event = InboundEvent::parse(ConversationId::new(conversation), text);
        self.planner
            .dispatcher()
            .handle(&event)
            .await
            .into_iter()
            .map(|m| m.text)
            .collect()
    }

    /// Walk the whole dialogue and return the new task id.
    pub(crate) async fn create_task(
        &self,
        conversation: &str,
        description: &str,
        assignee: &str,
        reminder: &str,
    ) -> String {
        self.say(conversation, "/addtask").await;
        self.say(conversation, description).await;
        self.say(conversation, assignee).await;
        self.say(conversation, "31:12:2025").await;
        self.say(conversation, reminder).await;

        let pending = self.planner.store().find_pending().unwrap();
        let task = pending
            .iter()
            .rev()
            .find(|t| t.conversation_id.as_str() == conversation && t.description == description)
            .expect("task was created");
        task.id.to_string()
    }
}
