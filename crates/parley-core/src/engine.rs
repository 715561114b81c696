//! Engine facade wiring the conversation and scheduling components.

use std::sync::Arc;
use tracing::debug;

use crate::config::ParleyConfig;
use crate::conversation::{ContextBuilder, ConversationTable, TopicSegmenter};
use crate::error::{ParleyError, ParleyResult};
use crate::events::{EventBus, EventSubscriber};
use crate::scheduler::{DebounceScheduler, EvaluationPipeline, InactivitySweeper};
use crate::storage::RetryQueue;
use crate::traits::{Clock, DecisionAuditLog, DecisionOracle, OutboundSender, SystemClock, TopicStore};
use crate::types::{ContextSnapshot, InboundMessage};

/// External collaborators the engine is built from.
pub struct EngineParts {
    pub store: Arc<dyn TopicStore>,
    pub oracle: Arc<dyn DecisionOracle>,
    pub sender: Arc<dyn OutboundSender>,
    pub audit: Arc<dyn DecisionAuditLog>,
    pub clock: Arc<dyn Clock>,
}

impl EngineParts {
    /// Parts using the system clock.
    pub fn new(
        store: Arc<dyn TopicStore>,
        oracle: Arc<dyn DecisionOracle>,
        sender: Arc<dyn OutboundSender>,
        audit: Arc<dyn DecisionAuditLog>,
    ) -> Self {
        Self {
            store,
            oracle,
            sender,
            audit,
            clock: Arc::new(SystemClock),
        }
    }

    /// Builder method to replace the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Conversation engagement engine.
///
/// Framework adapters call [`Engine::handle_message`] for every inbound
/// message; replies and proactive messages leave through the
/// [`OutboundSender`]. Must be created inside a tokio runtime.
///
/// # Example
///
/// ```ignore
/// let engine = Engine::new(config, EngineParts::new(store, oracle, sender, audit));
/// engine.start().await?;
/// engine.handle_message(InboundMessage::new("group-1", "alice", "hi all")).await?;
/// ```
pub struct Engine {
    config: ParleyConfig,
    table: Arc<ConversationTable>,
    segmenter: Arc<TopicSegmenter>,
    scheduler: Arc<DebounceScheduler>,
    sweeper: Arc<InactivitySweeper>,
    retries: RetryQueue,
    events: EventBus,
    clock: Arc<dyn Clock>,
}

impl Engine {
    /// Wire the engine from a configuration and its collaborators.
    pub fn new(config: ParleyConfig, parts: EngineParts) -> Self {
        let events = EventBus::new();
        let table = Arc::new(ConversationTable::new());
        let retries = RetryQueue::new(parts.store.clone(), config.storage.retry.clone());

        let segmenter = Arc::new(TopicSegmenter::new(
            table.clone(),
            parts.store.clone(),
            retries.clone(),
            ContextBuilder::new(config.bot.persona.clone(), config.topic.max_recent_messages),
            events.clone(),
            config.topic.topic_gap(),
        ));

        let pipeline = Arc::new(EvaluationPipeline::new(
            segmenter.clone(),
            parts.oracle.clone(),
            parts.sender.clone(),
            parts.audit,
            parts.clock.clone(),
            events.clone(),
            config.pacing.clone(),
        ));

        let sweeper = Arc::new(InactivitySweeper::new(
            table.clone(),
            segmenter.clone(),
            parts.oracle,
            parts.sender,
            parts.clock.clone(),
            events.clone(),
            config.sweeper.clone(),
            config.bot.clone(),
        ));

        Self {
            scheduler: Arc::new(DebounceScheduler::new(pipeline)),
            config,
            table,
            segmenter,
            sweeper,
            retries,
            events,
            clock: parts.clock,
        }
    }

    /// Ingest one inbound message.
    ///
    /// The message is segmented and persisted before any decision is
    /// scheduled. A mention cancels the pending decision and replies
    /// straight away; anything else re-arms the debounce timer.
    pub async fn handle_message(&self, message: InboundMessage) -> ParleyResult<ContextSnapshot> {
        if message.conversation_id.trim().is_empty() {
            return Err(ParleyError::validation("conversation_id must not be empty"));
        }
        if message.sender_id.trim().is_empty() {
            return Err(ParleyError::validation("sender_id must not be empty"));
        }

        // The decision is armed or cancelled before the conversation is
        // unlocked, so it follows the same order as ingestion.
        let conversation_id = message.conversation_id.as_str();
        let mentioned = message.mentioned;
        let snapshot = self
            .segmenter
            .ingest(
                conversation_id,
                &message.sender_id,
                &message.text,
                message.display_name.as_deref(),
                self.clock.now(),
                |_| {
                    if mentioned {
                        debug!(conversation_id, "Mentioned, replying immediately");
                        self.scheduler.cancel_and_intervene(conversation_id);
                    } else {
                        self.scheduler
                            .schedule(conversation_id, self.config.topic.debounce());
                    }
                },
            )
            .await?;

        Ok(if mentioned {
            snapshot.mentioned()
        } else {
            snapshot
        })
    }

    /// Start background work (the inactivity sweeper).
    pub async fn start(&self) -> ParleyResult<()> {
        self.sweeper.start().await
    }

    /// Stop background work.
    pub async fn shutdown(&self) -> ParleyResult<()> {
        self.sweeper.shutdown().await
    }

    /// Subscribe to engagement events.
    pub fn subscribe(&self) -> EventSubscriber {
        self.events.subscribe()
    }

    /// Get the configuration.
    pub fn config(&self) -> &ParleyConfig {
        &self.config
    }

    /// Get the conversation state table.
    pub fn conversations(&self) -> &Arc<ConversationTable> {
        &self.table
    }

    /// Get the debounce scheduler.
    pub fn scheduler(&self) -> &Arc<DebounceScheduler> {
        &self.scheduler
    }

    /// Get the inactivity sweeper.
    pub fn sweeper(&self) -> &Arc<InactivitySweeper> {
        &self.sweeper
    }

    /// Store writes still waiting to be retried.
    pub fn pending_writes(&self) -> usize {
        self.retries.pending()
    }
}
