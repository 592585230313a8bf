//! Reminder scheduler background loop.
//!
//! Keeps one armed reminder per pending task and, on every tick, hands the
//! due ones to a [`DeliverySink`]. Each occurrence is recorded in a
//! [`RunKeyLedger`] before delivery so it fires at most once per day, also
//! across restarts.

use crate::channels::traits::{DeliverySink, OutboundMessage};
use crate::config::SchedulerConfig;
use crate::error::{PlannerError, Result};
use crate::messages;
use crate::scheduler::authority::{RunKey, RunKeyLedger};
use crate::scheduler::clock::Clock;
use crate::scheduler::reminders::{
    ArmedReminder, Recurrence, ReferenceZone, SchedulerMode, next_daily_after, next_occurrence,
    truncate_to_minute,
};
use crate::store::TaskStore;
use crate::task::{ConversationId, ReminderTime, Task, TaskId};
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Interval between scheduler ticks (seconds).
pub const TICK_INTERVAL_SECS: u64 = 60;

/// Poll mode looks back at most this many minutes after a stall.
const MAX_POLL_CATCH_UP_MINUTES: i64 = 60;

/// Outcome counters of a single tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Reminders found due this tick.
    pub due: usize,
    /// Reminders handed to the sink successfully.
    pub delivered: usize,
    /// Deliveries the sink rejected.
    pub failed: usize,
    /// Occurrences already recorded in the run-key ledger.
    pub suppressed: usize,
    /// Due reminders whose task is no longer pending.
    pub skipped: usize,
}

/// Background scheduler that delivers task reminders.
pub struct ReminderScheduler {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    zone: ReferenceZone,
    mode: SchedulerMode,
    recurrence: Recurrence,
    tick_interval: Duration,
    armed: Mutex<HashMap<TaskId, ArmedReminder>>,
    ledger: Arc<Mutex<RunKeyLedger>>,
    last_polled: Mutex<Option<DateTime<Utc>>>,
}

impl ReminderScheduler {
    /// Armed-mode, daily scheduler with an in-memory run-key ledger.
    pub fn new(store: Arc<dyn TaskStore>, clock: Arc<dyn Clock>, zone: ReferenceZone) -> Self {
        Self {
            store,
            clock,
            zone,
            mode: SchedulerMode::default(),
            recurrence: Recurrence::default(),
            tick_interval: Duration::from_secs(TICK_INTERVAL_SECS),
            armed: Mutex::new(HashMap::new()),
            ledger: Arc::new(Mutex::new(RunKeyLedger::in_memory())),
            last_polled: Mutex::new(None),
        }
    }

    /// Build from the `[scheduler]` config section.
    pub fn from_config(
        config: &SchedulerConfig,
        store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let zone = ReferenceZone::from_offset_minutes(config.utc_offset_minutes).ok_or_else(|| {
            PlannerError::Config(format!(
                "utc_offset_minutes {} is outside +/-18h",
                config.utc_offset_minutes
            ))
        })?;
        let ledger = match config.resolved_ledger_path() {
            Some(path) => RunKeyLedger::new(path),
            None => RunKeyLedger::in_memory(),
        };
        Ok(Self::new(store, clock, zone)
            .with_mode(config.mode)
            .with_recurrence(config.recurrence)
            .with_tick_interval(Duration::from_secs(config.tick_interval_secs))
            .with_run_key_ledger(ledger))
    }

    pub fn with_mode(mut self, mode: SchedulerMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_recurrence(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = recurrence;
        self
    }

    /// Override the tick interval; clamped to one minute at most.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval
            .min(Duration::from_secs(TICK_INTERVAL_SECS))
            .max(Duration::from_millis(10));
        self
    }

    /// Replace the run-key dedupe ledger (e.g. with a file-backed one).
    pub fn with_run_key_ledger(mut self, ledger: RunKeyLedger) -> Self {
        self.ledger = Arc::new(Mutex::new(ledger));
        self
    }

    /// Register (or refresh) the reminder of a pending task.
    ///
    /// Resolves the next occurrence of `reminder_time` and replaces any
    /// existing record for the task, so arming twice is harmless. In poll
    /// mode the record is bookkeeping only.
    pub fn arm(
        &self,
        task_id: TaskId,
        conversation_id: ConversationId,
        reminder_time: ReminderTime,
    ) -> ArmedReminder {
        let fire_at = next_occurrence(self.clock.now(), reminder_time, self.zone);
        let reminder = ArmedReminder {
            task_id,
            conversation_id,
            reminder_time,
            fire_at,
        };
        debug!(
            "armed reminder for task {} at {} ({})",
            reminder.task_id, reminder.reminder_time, reminder.fire_at
        );
        self.armed_map()
            .insert(reminder.task_id.clone(), reminder.clone());
        reminder
    }

    /// Drop a task's reminder. Returns whether one was armed.
    pub fn disarm(&self, task_id: &TaskId) -> bool {
        let removed = self.armed_map().remove(task_id).is_some();
        if removed {
            debug!("disarmed reminder for task {task_id}");
        }
        removed
    }

    /// Armed record of a task, if any.
    pub fn armed_for(&self, task_id: &TaskId) -> Option<ArmedReminder> {
        self.armed_map().get(task_id).cloned()
    }

    /// Snapshot of all armed reminders ordered by fire instant.
    pub fn armed(&self) -> Vec<ArmedReminder> {
        let mut reminders: Vec<ArmedReminder> = self.armed_map().values().cloned().collect();
        reminders.sort_by(|a, b| {
            a.fire_at
                .cmp(&b.fire_at)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        reminders
    }

    /// Re-arm every pending task from the store. Returns how many were armed.
    pub fn restore(&self) -> Result<usize> {
        let pending = self.store.find_pending()?;
        for task in &pending {
            self.arm(
                task.id.clone(),
                task.conversation_id.clone(),
                task.reminder_time,
            );
        }
        info!("restored {} pending reminder(s)", pending.len());
        Ok(pending.len())
    }

    /// Run one tick at the clock's current time.
    pub async fn tick(&self, sink: &dyn DeliverySink) -> TickReport {
        self.tick_at(self.clock.now(), sink).await
    }

    /// Deliver every reminder due at `now`.
    ///
    /// Store and sink failures are logged and never abort the tick.
    pub async fn tick_at(&self, now: DateTime<Utc>, sink: &dyn DeliverySink) -> TickReport {
        let mut report = TickReport::default();
        match self.mode {
            SchedulerMode::Armed => self.tick_armed(now, sink, &mut report).await,
            SchedulerMode::Poll => self.tick_poll(now, sink, &mut report).await,
        }
        if report.due > 0 {
            info!(
                "reminder tick: {} due, {} delivered, {} failed, {} suppressed, {} skipped",
                report.due, report.delivered, report.failed, report.suppressed, report.skipped
            );
        }
        report
    }

    async fn tick_armed(&self, now: DateTime<Utc>, sink: &dyn DeliverySink, report: &mut TickReport) {
        let mut due: Vec<ArmedReminder> = self
            .armed_map()
            .values()
            .filter(|reminder| reminder.is_due(now))
            .cloned()
            .collect();
        if due.is_empty() {
            return;
        }
        due.sort_by(|a, b| {
            a.fire_at
                .cmp(&b.fire_at)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        report.due = due.len();

        let pending: HashMap<TaskId, Task> = match self.store.find_pending() {
            Ok(tasks) => tasks.into_iter().map(|t| (t.id.clone(), t)).collect(),
            Err(e) => {
                error!("reminder tick could not read pending tasks: {e}");
                return;
            }
        };

        let mut firings = Vec::with_capacity(due.len());
        for reminder in due {
            match pending.get(&reminder.task_id) {
                Some(task) => {
                    let occurrence = self.zone.local_date(reminder.fire_at);
                    firings.push((reminder, task, occurrence));
                }
                None => {
                    debug!(
                        "task {} is no longer pending; dropping its reminder",
                        reminder.task_id
                    );
                    report.skipped += 1;
                    self.remove_if_unchanged(&reminder);
                }
            }
        }

        let keys = firings
            .iter()
            .map(|(_, task, occurrence)| RunKey::new(task.id.clone(), *occurrence))
            .collect();
        let claimed = self.claim_runs(self.zone.local_date(now), keys).await;

        for ((reminder, task, _), claimed) in firings.into_iter().zip(claimed) {
            if claimed {
                self.deliver(task, &reminder.conversation_id, sink, report)
                    .await;
            } else {
                report.suppressed += 1;
            }
            self.reschedule(&reminder, now);
        }
    }

    /// Poll every minute since the previous poll, the current one included,
    /// so a stalled loop does not lose a reminder minute.
    async fn tick_poll(&self, now: DateTime<Utc>, sink: &dyn DeliverySink, report: &mut TickReport) {
        let current = truncate_to_minute(now);
        let earliest = current - chrono::Duration::minutes(MAX_POLL_CATCH_UP_MINUTES - 1);
        let start = {
            let mut last = self.last_polled.lock().unwrap_or_else(PoisonError::into_inner);
            let start = last
                .map_or(current, |last| last + chrono::Duration::minutes(1))
                .min(current)
                .max(earliest);
            *last = Some(current);
            start
        };

        let mut firings = Vec::new();
        let mut minute = start;
        while minute <= current {
            let at = self.zone.local_minute(minute);
            match self.store.find_by_reminder_time(at) {
                Ok(tasks) => {
                    let date = self.zone.local_date(minute);
                    firings.extend(tasks.into_iter().map(|task| (task, date)));
                }
                Err(e) => error!("reminder tick could not query tasks for {at}: {e}"),
            }
            minute += chrono::Duration::minutes(1);
        }
        report.due = firings.len();
        if firings.is_empty() {
            return;
        }

        let keys = firings
            .iter()
            .map(|(task, date)| RunKey::new(task.id.clone(), *date))
            .collect();
        let claimed = self.claim_runs(self.zone.local_date(now), keys).await;

        for ((task, _), claimed) in firings.iter().zip(claimed) {
            if claimed {
                self.deliver(task, &task.conversation_id, sink, report)
                    .await;
            } else {
                report.suppressed += 1;
            }
        }
    }

    async fn deliver(
        &self,
        task: &Task,
        conversation_id: &ConversationId,
        sink: &dyn DeliverySink,
        report: &mut TickReport,
    ) {
        let message = OutboundMessage::new(
            conversation_id.clone(),
            messages::reminder(&task.description, &task.assignee),
        );
        match sink.deliver(message).await {
            Ok(()) => {
                info!("delivered reminder for task {} to {conversation_id}", task.id);
                report.delivered += 1;
            }
            Err(e) => {
                let err = PlannerError::Delivery(e.to_string());
                warn!("reminder for task {} not delivered: {err}", task.id);
                report.failed += 1;
            }
        }
    }

    /// Record `keys` in the ledger off the async workers. Returns, per key,
    /// whether the occurrence is still undelivered.
    ///
    /// A ledger failure is logged and every reminder is delivered anyway.
    async fn claim_runs(&self, today: NaiveDate, keys: Vec<RunKey>) -> Vec<bool> {
        let count = keys.len();
        let ledger = Arc::clone(&self.ledger);
        let outcome = tokio::task::spawn_blocking(move || {
            let claimed = ledger
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .record_batch(today, &keys);
            if let Ok(claimed) = &claimed {
                for (key, fresh) in keys.iter().zip(claimed) {
                    if !fresh {
                        debug!("skipping duplicate reminder run {key}");
                    }
                }
            }
            claimed
        })
        .await;

        match outcome {
            Ok(Ok(claimed)) => claimed,
            Ok(Err(e)) => {
                warn!("run-key dedupe failed; delivering anyway: {e}");
                vec![true; count]
            }
            Err(e) => {
                warn!("run-key ledger task failed; delivering anyway: {e}");
                vec![true; count]
            }
        }
    }

    /// Advance a fired reminder unless it was disarmed or re-armed meanwhile.
    fn reschedule(&self, fired: &ArmedReminder, now: DateTime<Utc>) {
        let mut armed = self.armed_map();
        if armed.get(&fired.task_id) != Some(fired) {
            return;
        }
        match self.recurrence {
            Recurrence::Once => {
                armed.remove(&fired.task_id);
            }
            Recurrence::Daily => {
                let next = ArmedReminder {
                    fire_at: next_daily_after(fired.fire_at, now),
                    ..fired.clone()
                };
                armed.insert(next.task_id.clone(), next);
            }
        }
    }

    fn remove_if_unchanged(&self, stale: &ArmedReminder) {
        let mut armed = self.armed_map();
        if armed.get(&stale.task_id) == Some(stale) {
            armed.remove(&stale.task_id);
        }
    }

    fn armed_map(&self) -> MutexGuard<'_, HashMap<TaskId, ArmedReminder>> {
        self.armed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Time from the clock's now to the next multiple of the tick interval,
    /// counted from the start of the current minute.
    fn until_next_boundary(&self) -> Duration {
        let now = self.clock.now();
        let period = self.tick_interval.as_millis().max(1);
        let into_minute = u128::from(now.second()) * 1000 + u128::from(now.timestamp_subsec_millis());
        let remaining = period - into_minute % period;
        Duration::from_millis(u64::try_from(remaining).unwrap_or(u64::MAX))
    }

    /// Spawn the recurring tick loop. Stops when `cancel` fires.
    pub fn run(
        self: Arc<Self>,
        sink: Arc<dyn DeliverySink>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        info!(
            "reminder scheduler started (mode={}, recurrence={}, tick={}s)",
            self.mode,
            self.recurrence,
            self.tick_interval.as_secs_f32()
        );

        tokio::spawn(async move {
            // One tick right away, then on boundaries of the tick period
            // within the minute so poll mode sees each minute at its start.
            self.tick(sink.as_ref()).await;
            let first = tokio::time::Instant::now() + self.until_next_boundary();
            let mut interval = tokio::time::interval_at(first, self.tick_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("reminder scheduler stopping");
                        break;
                    }
                    _ = interval.tick() => {
                        self.tick(sink.as_ref()).await;
                    }
                }
            }
        })
    }
}
