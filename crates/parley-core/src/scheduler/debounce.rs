//! Per-conversation debounce timers.
//!
//! Each conversation has at most one pending decision. Arming a new one
//! cancels the old one; a timer that has already claimed its slot runs to
//! completion and cannot be cancelled.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::EvaluationPipeline;

struct PendingDecision {
    generation: u64,
    fire_at: Instant,
    token: CancellationToken,
}

#[derive(Default)]
struct ConversationSlot {
    pending: Mutex<Option<PendingDecision>>,
    /// Held for the duration of a debounce evaluation.
    gate: tokio::sync::Mutex<()>,
}

impl ConversationSlot {
    fn pending(&self) -> std::sync::MutexGuard<'_, Option<PendingDecision>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Take the slot if `generation` is still the armed decision.
    fn claim(&self, generation: u64) -> bool {
        let mut pending = self.pending();
        if pending.as_ref().map(|p| p.generation) != Some(generation) {
            return false;
        }
        pending.take();
        true
    }
}

/// Debounce scheduler for intervention decisions.
pub struct DebounceScheduler {
    slots: RwLock<HashMap<String, Arc<ConversationSlot>>>,
    next_generation: AtomicU64,
    pipeline: Arc<EvaluationPipeline>,
}

impl DebounceScheduler {
    pub fn new(pipeline: Arc<EvaluationPipeline>) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            pipeline,
        }
    }

    fn slot(&self, conversation_id: &str) -> Arc<ConversationSlot> {
        if let Some(slot) = self
            .slots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(conversation_id)
        {
            return slot.clone();
        }
        self.slots
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(conversation_id.to_string())
            .or_default()
            .clone()
    }

    /// Arm a decision for `conversation_id` after `delay`, replacing any
    /// pending one.
    pub fn schedule(self: &Arc<Self>, conversation_id: &str, delay: Duration) -> JoinHandle<()> {
        let slot = self.slot(conversation_id);
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();

        let replaced = slot.pending().replace(PendingDecision {
            generation,
            fire_at: Instant::now() + delay,
            token: token.clone(),
        });
        if let Some(old) = replaced {
            old.token.cancel();
            debug!(conversation_id, "Replaced pending decision");
        }
        debug!(conversation_id, delay_ms = delay.as_millis() as u64, "Armed decision timer");

        let pipeline = self.pipeline.clone();
        let conversation_id = conversation_id.to_string();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            if !slot.claim(generation) {
                return;
            }

            let _gate = slot.gate.lock().await;
            if let Err(e) = pipeline.evaluate(&conversation_id).await {
                warn!(conversation_id = %conversation_id, error = %e, "Decision evaluation failed");
            }
        })
    }

    /// Cancel the pending decision, if any. Returns whether one was cancelled.
    pub fn cancel(&self, conversation_id: &str) -> bool {
        let slot = match self
            .slots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(conversation_id)
        {
            Some(slot) => slot.clone(),
            None => return false,
        };
        let taken = slot.pending().take();
        match taken {
            Some(pending) => {
                pending.token.cancel();
                debug!(conversation_id, "Cancelled pending decision");
                true
            }
            None => false,
        }
    }

    /// Cancel the pending decision and reply right away, skipping the judge.
    pub fn cancel_and_intervene(self: &Arc<Self>, conversation_id: &str) -> JoinHandle<()> {
        self.cancel(conversation_id);

        let pipeline = self.pipeline.clone();
        let conversation_id = conversation_id.to_string();
        tokio::spawn(async move {
            match pipeline.intervene(&conversation_id).await {
                Ok(sent) => debug!(conversation_id = %conversation_id, sent, "Answered mention"),
                Err(e) => warn!(conversation_id = %conversation_id, error = %e, "Mention reply failed"),
            }
        })
    }

    /// Whether a decision is armed and has not fired yet.
    pub fn is_pending(&self, conversation_id: &str) -> bool {
        self.slots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(conversation_id)
            .map(|slot| slot.pending().is_some())
            .unwrap_or(false)
    }

    /// When the pending decision for `conversation_id` will fire.
    pub fn fire_at(&self, conversation_id: &str) -> Option<Instant> {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        slots
            .get(conversation_id)
            .and_then(|slot| slot.pending().as_ref().map(|p| p.fire_at))
    }

    /// Number of conversations with an armed decision.
    pub fn pending_count(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|slot| slot.pending().is_some())
            .count()
    }
}
