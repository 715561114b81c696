//! Topic segmentation.
//!
//! Groups a conversation's messages into topics separated by silence and
//! keeps the topic store in step with the in-memory state.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::{ContextBuilder, ConversationState, ConversationTable};
use crate::error::{ParleyError, ParleyResult};
use crate::events::{EngagementEvent, EventBus, EventKind};
use crate::storage::{RetryQueue, StoreOp};
use crate::traits::TopicStore;
use crate::types::{ChatMessage, ContextSnapshot, Topic, TopicId};

/// Appends messages to topics, rotating topics after a silence.
pub struct TopicSegmenter {
    table: Arc<ConversationTable>,
    store: Arc<dyn TopicStore>,
    retries: RetryQueue,
    builder: ContextBuilder,
    events: EventBus,
    gap: chrono::Duration,
}

impl TopicSegmenter {
    pub fn new(
        table: Arc<ConversationTable>,
        store: Arc<dyn TopicStore>,
        retries: RetryQueue,
        builder: ContextBuilder,
        events: EventBus,
        gap: chrono::Duration,
    ) -> Self {
        Self {
            table,
            store,
            retries,
            builder,
            events,
            gap,
        }
    }

    /// Ingest a message and return the context it produces.
    ///
    /// On an append failure the message stays in memory, the write is
    /// queued for retry and the error is returned.
    pub async fn on_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        text: &str,
        display_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> ParleyResult<ContextSnapshot> {
        self.ingest(conversation_id, sender_id, text, display_name, now, |_| {})
            .await
    }

    /// Like [`on_message`](Self::on_message), then runs `then` with the
    /// snapshot before the conversation's lock is released.
    ///
    /// `then` only runs when the message was persisted.
    pub async fn ingest<F>(
        &self,
        conversation_id: &str,
        sender_id: &str,
        text: &str,
        display_name: Option<&str>,
        now: DateTime<Utc>,
        then: F,
    ) -> ParleyResult<ContextSnapshot>
    where
        F: FnOnce(&ContextSnapshot),
    {
        let slot = self.table.entry(conversation_id, now);
        let mut state = slot.lock().await;

        self.append(conversation_id, &mut state, sender_id, text, display_name, now)?;

        let topic = state
            .open_topic
            .as_ref()
            .ok_or_else(|| ParleyError::no_open_topic(conversation_id))?;
        let snapshot = self
            .builder
            .build(conversation_id, topic, sender_id, text, now, false);
        then(&snapshot);
        Ok(snapshot)
    }

    /// Record a message written by the bot itself.
    pub async fn record(
        &self,
        conversation_id: &str,
        sender_id: &str,
        text: &str,
        display_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> ParleyResult<()> {
        let slot = self.table.entry(conversation_id, now);
        let mut state = slot.lock().await;
        self.append(conversation_id, &mut state, sender_id, text, display_name, now)
    }

    /// Context for the conversation's latest message, if it has one.
    pub async fn latest_context(
        &self,
        conversation_id: &str,
        mentioned: bool,
    ) -> Option<ContextSnapshot> {
        let state = self.table.get(conversation_id).await?;
        let topic = state.open_topic.as_ref()?;
        self.builder.rebuild(conversation_id, topic, mentioned)
    }

    /// Store a summary produced for `topic_id`.
    ///
    /// The in-memory topic is only updated while it is still open.
    pub async fn apply_summary(&self, conversation_id: &str, topic_id: TopicId, summary: &str) {
        self.table
            .update_summary(conversation_id, topic_id, summary)
            .await;
        if let Err(e) = self.store.set_summary(topic_id, summary) {
            tracing::warn!(
                conversation_id,
                topic_id = %topic_id,
                error = %e,
                "Failed to persist topic summary"
            );
            self.retries.enqueue(StoreOp::SetSummary {
                topic_id,
                summary: summary.to_string(),
            });
        }
    }

    fn append(
        &self,
        conversation_id: &str,
        state: &mut ConversationState,
        sender_id: &str,
        text: &str,
        display_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> ParleyResult<()> {
        let expired = match &state.open_topic {
            None => true,
            Some(topic) => topic.is_expired_at(now, self.gap),
        };
        if expired {
            self.rotate(conversation_id, state, now)?;
        }

        let Some(topic) = state.open_topic.as_mut() else {
            return Err(ParleyError::no_open_topic(conversation_id));
        };
        let topic_id = topic.id;
        topic.push(ChatMessage::new(sender_id, text, now).with_display_name(display_name));
        state.last_activity = now;

        if let Err(e) = self
            .store
            .append_message(topic_id, sender_id, text, now, display_name)
        {
            tracing::warn!(
                conversation_id,
                topic_id = %topic_id,
                error = %e,
                "Failed to persist message, queueing for retry"
            );
            self.retries.enqueue(StoreOp::AppendMessage {
                topic_id,
                sender_id: sender_id.to_string(),
                text: text.to_string(),
                time: now,
                display_name: display_name.map(str::to_string),
            });
            return Err(e);
        }
        Ok(())
    }

    /// Archive the open topic (if any) and open a fresh one.
    ///
    /// The new id is obtained first so a store failure leaves the state
    /// untouched.
    fn rotate(
        &self,
        conversation_id: &str,
        state: &mut ConversationState,
        now: DateTime<Utc>,
    ) -> ParleyResult<()> {
        let new_id = self.store.create_topic(conversation_id, now)?;

        if let Some(previous) = state.open_topic.take() {
            self.archive(conversation_id, previous.close());
        }

        tracing::debug!(conversation_id, topic_id = %new_id, "Opened topic");
        state.open_topic = Some(Topic::open(new_id, now));
        self.events.emit(EngagementEvent::new(
            conversation_id,
            EventKind::TopicOpened { topic_id: new_id },
        ));
        Ok(())
    }

    fn archive(&self, conversation_id: &str, topic: Topic) {
        let end_time = topic.last_message_time;
        tracing::info!(
            conversation_id,
            topic_id = %topic.id,
            messages = topic.messages.len(),
            "Archiving topic"
        );

        if let Err(e) = self.store.close_topic(topic.id, end_time) {
            tracing::warn!(conversation_id, topic_id = %topic.id, error = %e, "Failed to close topic");
            self.retries.enqueue(StoreOp::CloseTopic {
                topic_id: topic.id,
                end_time,
            });
        }
        if let Some(summary) = &topic.summary {
            if let Err(e) = self.store.set_summary(topic.id, summary) {
                tracing::warn!(conversation_id, topic_id = %topic.id, error = %e, "Failed to persist summary");
                self.retries.enqueue(StoreOp::SetSummary {
                    topic_id: topic.id,
                    summary: summary.clone(),
                });
            }
        }

        self.events.emit(EngagementEvent::new(
            conversation_id,
            EventKind::TopicArchived {
                topic_id: topic.id,
                end_time,
            },
        ));
    }
}
