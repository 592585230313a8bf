//! Per-conversation message workers.
//!
//! Every conversation gets one worker task fed by its own queue, so a
//! conversation's messages are handled strictly in arrival order while
//! different conversations run concurrently. Workers idle for a while are
//! retired; a replacement for the same conversation waits for the retired
//! worker to finish before it handles anything.

use crate::channels::traits::{DeliverySink, InboundMessage};
use crate::dispatch::{Dispatcher, InboundEvent};
use crate::task::ConversationId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Capacity of each conversation's queue. A full queue pauses intake.
const CONVERSATION_QUEUE_SIZE: usize = 32;

/// Workers without traffic for this long are retired.
pub(crate) const WORKER_IDLE_AFTER: Duration = Duration::from_secs(300);

struct Worker {
    tx: mpsc::Sender<InboundMessage>,
    handle: JoinHandle<()>,
    last_seen: Instant,
}

/// Routes inbound messages to their conversation's worker.
pub(crate) struct ConversationRouter {
    dispatcher: Arc<Dispatcher>,
    replies: Arc<dyn DeliverySink>,
    workers: HashMap<ConversationId, Worker>,
    retired: HashMap<ConversationId, JoinHandle<()>>,
}

impl ConversationRouter {
    pub(crate) fn new(dispatcher: Arc<Dispatcher>, replies: Arc<dyn DeliverySink>) -> Self {
        Self {
            dispatcher,
            replies,
            workers: HashMap::new(),
            retired: HashMap::new(),
        }
    }

    /// Queue `message` behind earlier messages of the same conversation.
    pub(crate) async fn route(&mut self, message: InboundMessage) {
        let conversation = message.conversation_id.clone();
        let mut message = Some(message);

        // A worker that died (panicked) is replaced once.
        for _ in 0..2 {
            let Some(pending) = message.take() else { break };
            let worker = self.worker(&conversation);
            worker.last_seen = Instant::now();
            match worker.tx.send(pending).await {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => {
                    tracing::warn!("worker for {conversation} stopped; starting a new one");
                    if let Some(dead) = self.workers.remove(&conversation) {
                        self.retired.insert(conversation.clone(), dead.handle);
                    }
                    message = Some(returned);
                }
            }
        }
        tracing::error!("dropping message for {conversation}: no worker accepts it");
    }

    /// Retire workers idle since before `now - WORKER_IDLE_AFTER`. Their
    /// queued messages are still handled.
    pub(crate) fn retire_idle(&mut self, now: Instant) -> usize {
        self.retired.retain(|_, handle| !handle.is_finished());

        let idle: Vec<ConversationId> = self
            .workers
            .iter()
            .filter(|(_, worker)| {
                now.saturating_duration_since(worker.last_seen) >= WORKER_IDLE_AFTER
            })
            .map(|(conversation, _)| conversation.clone())
            .collect();
        for conversation in &idle {
            if let Some(worker) = self.workers.remove(conversation) {
                // Dropping the sender lets the worker drain and exit.
                drop(worker.tx);
                self.retired.insert(conversation.clone(), worker.handle);
            }
        }
        idle.len()
    }

    pub(crate) fn active_workers(&self) -> usize {
        self.workers.len()
    }

    /// Close every queue and wait for all queued messages to be handled.
    pub(crate) async fn shutdown(self) {
        let handles: Vec<JoinHandle<()>> = self
            .workers
            .into_values()
            .map(|worker| worker.handle)
            .chain(self.retired.into_values())
            .collect();
        for handle in handles {
            if let Err(err) = handle.await {
                tracing::error!("conversation worker panicked: {err}");
            }
        }
    }

    fn worker(&mut self, conversation: &ConversationId) -> &mut Worker {
        let Self {
            dispatcher,
            replies,
            workers,
            retired,
        } = self;
        workers.entry(conversation.clone()).or_insert_with(|| {
            spawn_worker(
                Arc::clone(dispatcher),
                Arc::clone(replies),
                conversation.clone(),
                retired.remove(conversation),
            )
        })
    }
}

fn spawn_worker(
    dispatcher: Arc<Dispatcher>,
    replies: Arc<dyn DeliverySink>,
    conversation: ConversationId,
    previous: Option<JoinHandle<()>>,
) -> Worker {
    let (tx, mut rx) = mpsc::channel::<InboundMessage>(CONVERSATION_QUEUE_SIZE);
    let handle = tokio::spawn(async move {
        if let Some(previous) = previous
            && let Err(err) = previous.await
        {
            tracing::error!("previous worker for {conversation} panicked: {err}");
        }
        while let Some(message) = rx.recv().await {
            let event = InboundEvent::from(message);
            for reply in dispatcher.handle(&event).await {
                if let Err(err) = replies.deliver(reply).await {
                    tracing::warn!("failed to send reply to {conversation}: {err}");
                }
            }
        }
        tracing::debug!("worker for {conversation} finished");
    });
    Worker {
        tx,
        handle,
        last_seen: Instant::now(),
    }
}
