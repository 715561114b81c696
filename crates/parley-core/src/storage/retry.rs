//! Deferred topic store writes.
//!
//! Writes that failed on the hot path are queued here and replayed in
//! order by a single background worker with exponential backoff.

use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::RetryPolicy;
use crate::error::ParleyResult;
use crate::traits::TopicStore;
use crate::types::TopicId;

/// A topic store write that can be replayed.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    AppendMessage {
        topic_id: TopicId,
        sender_id: String,
        text: String,
        time: DateTime<Utc>,
        display_name: Option<String>,
    },
    SetSummary {
        topic_id: TopicId,
        summary: String,
    },
    CloseTopic {
        topic_id: TopicId,
        end_time: DateTime<Utc>,
    },
}

impl StoreOp {
    /// Run the write against a store.
    pub fn apply(&self, store: &dyn TopicStore) -> ParleyResult<()> {
        match self {
            StoreOp::AppendMessage {
                topic_id,
                sender_id,
                text,
                time,
                display_name,
            } => store.append_message(*topic_id, sender_id, text, *time, display_name.as_deref()),
            StoreOp::SetSummary { topic_id, summary } => store.set_summary(*topic_id, summary),
            StoreOp::CloseTopic { topic_id, end_time } => store.close_topic(*topic_id, *end_time),
        }
    }

    fn topic_id(&self) -> TopicId {
        match self {
            StoreOp::AppendMessage { topic_id, .. }
            | StoreOp::SetSummary { topic_id, .. }
            | StoreOp::CloseTopic { topic_id, .. } => *topic_id,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            StoreOp::AppendMessage { .. } => "append_message",
            StoreOp::SetSummary { .. } => "set_summary",
            StoreOp::CloseTopic { .. } => "close_topic",
        }
    }
}

/// Queue of failed writes, drained by a background worker.
///
/// Must be created inside a tokio runtime.
#[derive(Clone)]
pub struct RetryQueue {
    sender: mpsc::UnboundedSender<StoreOp>,
    pending: Arc<AtomicUsize>,
}

impl RetryQueue {
    /// Spawn the replay worker for `store`.
    pub fn new(store: Arc<dyn TopicStore>, policy: RetryPolicy) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        tokio::spawn(replay_loop(store, policy, receiver, pending.clone()));
        Self { sender, pending }
    }

    /// Queue a write for replay.
    pub fn enqueue(&self, op: StoreOp) {
        tracing::debug!(topic_id = %op.topic_id(), op = op.name(), "Queueing store write for retry");
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(op).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            tracing::error!("Retry worker stopped; dropping store write");
        }
    }

    /// Writes queued or currently being replayed.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

async fn replay_loop(
    store: Arc<dyn TopicStore>,
    policy: RetryPolicy,
    mut receiver: mpsc::UnboundedReceiver<StoreOp>,
    pending: Arc<AtomicUsize>,
) {
    while let Some(op) = receiver.recv().await {
        let attempt = || {
            let store = store.clone();
            let op = op.clone();
            async move { op.apply(store.as_ref()) }
        };

        let result = attempt
            .retry(
                ExponentialBuilder::default()
                    .with_max_times(policy.max_retries as usize)
                    .with_min_delay(Duration::from_millis(policy.initial_delay_ms))
                    .with_max_delay(Duration::from_millis(policy.max_delay_ms))
                    .with_factor(policy.multiplier),
            )
            .when(|e| e.is_transient())
            .notify(|err, dur| {
                tracing::warn!(
                    topic_id = %op.topic_id(),
                    op = op.name(),
                    "Store write failed, retrying in {:?}: {}",
                    dur,
                    err
                );
            })
            .await;

        match result {
            Ok(()) => tracing::debug!(topic_id = %op.topic_id(), op = op.name(), "Deferred store write applied"),
            Err(e) => tracing::error!(
                topic_id = %op.topic_id(),
                op = op.name(),
                error = %e,
                "Giving up on store write"
            ),
        }
        pending.fetch_sub(1, Ordering::SeqCst);
    }
}
