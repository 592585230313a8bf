//! Chat transports and the message runtime.
//!
//! A transport implements [`ChannelAdapter`]. The runtime owns routing:
//! each conversation's messages are handled in order by that conversation's
//! worker, replies go back through the same adapter, and the reminder
//! scheduler delivers through it as well.

mod conversations;
pub mod stdio;
pub mod traits;

use crate::channels::conversations::ConversationRouter;
use crate::channels::traits::{ChannelAdapter, DeliverySink, InboundMessage};
use crate::planner::Planner;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Capacity of the inbound message queue.
const INBOUND_QUEUE_SIZE: usize = 64;

/// How often idle dialogue sessions are swept.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// How often idle conversation workers are retired.
const WORKER_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Run `adapter` against `planner` until its input ends or `cancel` fires.
///
/// A transport that fails is restarted with exponential backoff (2s up to
/// 60s); one that returns cleanly ends the runtime. Queued messages are
/// handled before returning.
pub async fn run_runtime<A>(
    planner: Planner,
    adapter: Arc<A>,
    cancel: CancellationToken,
) -> anyhow::Result<()>
where
    A: ChannelAdapter + 'static,
{
    let sink: Arc<dyn DeliverySink> = adapter.clone();
    let scheduler_handle =
        Arc::clone(planner.scheduler()).run(Arc::clone(&sink), cancel.child_token());
    let sweeper_handle = spawn_session_sweeper(&planner, cancel.child_token());

    let (inbound_tx, mut inbound_rx) = tokio::sync::mpsc::channel::<InboundMessage>(INBOUND_QUEUE_SIZE);
    tracing::info!("runtime started on {} transport", adapter.id());

    let transport_adapter = Arc::clone(&adapter);
    let transport_cancel = cancel.clone();
    let transport = tokio::spawn(async move {
        let mut backoff_secs = 2u64;
        loop {
            let result = tokio::select! {
                _ = transport_cancel.cancelled() => return,
                result = transport_adapter.run(inbound_tx.clone()) => result,
            };
            match result {
                Ok(()) => {
                    tracing::info!("transport {} finished", transport_adapter.id());
                    return;
                }
                Err(err) => {
                    tracing::warn!(
                        "transport {} failed: {err}; retrying in {backoff_secs}s",
                        transport_adapter.id()
                    );
                }
            }
            tokio::select! {
                _ = transport_cancel.cancelled() => return,
                _ = tokio::time::sleep(Duration::from_secs(backoff_secs)) => {}
            }
            backoff_secs = (backoff_secs.saturating_mul(2)).min(60);
        }
    });

    let mut router = ConversationRouter::new(Arc::clone(planner.dispatcher()), sink);
    let mut worker_sweep = tokio::time::interval(WORKER_SWEEP_INTERVAL);
    worker_sweep.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            message = inbound_rx.recv() => {
                let Some(message) = message else { break };
                router.route(message).await;
            }
            _ = worker_sweep.tick() => {
                let retired = router.retire_idle(tokio::time::Instant::now());
                if retired > 0 {
                    tracing::debug!("retired {retired} idle conversation worker(s)");
                }
            }
        }
    }
    router.shutdown().await;

    cancel.cancel();
    let _ = transport.await;
    let _ = scheduler_handle.await;
    if let Some(handle) = sweeper_handle {
        let _ = handle.await;
    }
    tracing::info!("runtime stopped");
    Ok(())
}

/// Periodically drop idle dialogue sessions. `None` when expiry is off.
fn spawn_session_sweeper(
    planner: &Planner,
    cancel: CancellationToken,
) -> Option<tokio::task::JoinHandle<()>> {
    let engine = Arc::clone(planner.engine());
    if !engine.expires_sessions() {
        return None;
    }
    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let expired = engine.expire_idle();
                    if expired > 0 {
                        tracing::debug!(
                            "expired {expired} idle dialogue session(s); {} still open",
                            engine.active_sessions()
                        );
                    }
                }
            }
        }
    }))
}
