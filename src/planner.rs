//! Wiring of store, scheduler, dialogue engine and dispatcher.

use crate::config::PlannerConfig;
use crate::dialogue::DialogueEngine;
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::scheduler::{Clock, ReminderScheduler};
use crate::store::{TaskStore, open_store};
use std::sync::Arc;

/// The assembled planner core. Cheap to clone.
#[derive(Clone)]
pub struct Planner {
    store: Arc<dyn TaskStore>,
    scheduler: Arc<ReminderScheduler>,
    engine: Arc<DialogueEngine>,
    dispatcher: Arc<Dispatcher>,
}

impl Planner {
    /// Validate `config`, open the configured store and restore reminders.
    pub fn from_config(config: &PlannerConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let store = open_store(&config.store)?;
        Self::with_store(config, store, clock)
    }

    /// Like [`Planner::from_config`] but over an already opened store.
    pub fn with_store(
        config: &PlannerConfig,
        store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let scheduler = Arc::new(ReminderScheduler::from_config(
            &config.scheduler,
            Arc::clone(&store),
            Arc::clone(&clock),
        )?);
        scheduler.restore()?;

        let engine = Arc::new(
            DialogueEngine::new(Arc::clone(&store), Arc::clone(&scheduler), clock)
                .with_config(&config.dialogue),
        );
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&store),
            Arc::clone(&scheduler),
            Arc::clone(&engine),
        ));

        Ok(Self {
            store,
            scheduler,
            engine,
            dispatcher,
        })
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &Arc<ReminderScheduler> {
        &self.scheduler
    }

    pub fn engine(&self) -> &Arc<DialogueEngine> {
        &self.engine
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::config::StoreBackend;
    use crate::error::PlannerError;
    use crate::scheduler::SystemClock;
    use crate::store::SqliteTaskStore;
    use crate::task::{ConversationId, NewTask, ReminderTime};

    fn memory_config() -> PlannerConfig {
        let mut config = PlannerConfig::default();
        config.store.backend = StoreBackend::Memory;
        config.scheduler.persist_run_keys = false;
        config
    }

    #[test]
    fn invalid_config_is_rejected_before_opening_anything() {
        let mut config = memory_config();
        config.scheduler.tick_interval_secs = 120;
        assert!(matches!(
            Planner::from_config(&config, Arc::new(SystemClock)),
            Err(PlannerError::Config(_))
        ));
    }

    #[test]
    fn startup_restores_pending_reminders() {
        let store = Arc::new(SqliteTaskStore::open_in_memory().unwrap());
        let id = store
            .insert(&NewTask {
                description: "Pay rent".to_owned(),
                assignee: "Mom".to_owned(),
                deadline: None,
                reminder_time: ReminderTime::new(10, 0).unwrap(),
                conversation_id: ConversationId::new("c"),
            })
            .unwrap();

        let planner = Planner::with_store(&memory_config(), store, Arc::new(SystemClock)).unwrap();
        assert!(planner.scheduler().armed_for(&id).is_some());
    }
}
