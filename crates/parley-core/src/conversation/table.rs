//! Per-conversation state table.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

use crate::types::{Topic, TopicId};

/// Mutable state of one conversation.
#[derive(Debug, Clone)]
pub struct ConversationState {
    /// The topic currently accepting messages.
    pub open_topic: Option<Topic>,
    /// Arrival of the last message, or the last proactive send.
    pub last_activity: DateTime<Utc>,
}

impl ConversationState {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            open_topic: None,
            last_activity: now,
        }
    }

    /// Id of the open topic, if any.
    pub fn topic_id(&self) -> Option<TopicId> {
        self.open_topic.as_ref().map(|t| t.id)
    }
}

type Slot = Arc<Mutex<ConversationState>>;

/// Lock-partitioned map of conversation state.
///
/// The outer lock is only held to find or insert an entry; all work on a
/// conversation happens under that conversation's own mutex, so different
/// conversations never wait on each other. Entries are never evicted.
#[derive(Default)]
pub struct ConversationTable {
    entries: RwLock<HashMap<String, Slot>>,
}

impl ConversationTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&self, conversation_id: &str) -> Option<Slot> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(conversation_id)
            .cloned()
    }

    /// The per-conversation slot, created with `now` as its activity time.
    pub fn entry(&self, conversation_id: &str, now: DateTime<Utc>) -> Slot {
        if let Some(slot) = self.find(conversation_id) {
            return slot;
        }
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ConversationState::new(now))))
            .clone()
    }

    /// Copy of a conversation's state.
    pub async fn get(&self, conversation_id: &str) -> Option<ConversationState> {
        let slot = self.find(conversation_id)?;
        let state = slot.lock().await;
        Some(state.clone())
    }

    /// Mutate a conversation's state, creating it if absent.
    pub async fn upsert<F, R>(&self, conversation_id: &str, now: DateTime<Utc>, mutation: F) -> R
    where
        F: FnOnce(&mut ConversationState) -> R,
    {
        let slot = self.entry(conversation_id, now);
        let mut state = slot.lock().await;
        mutation(&mut state)
    }

    /// `(conversation_id, last_activity)` for every known conversation.
    ///
    /// Conversations added while the snapshot is taken may be missing.
    pub async fn activity_snapshot(&self) -> Vec<(String, DateTime<Utc>)> {
        let slots: Vec<(String, Slot)> = self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(id, slot)| (id.clone(), slot.clone()))
            .collect();

        let mut snapshot = Vec::with_capacity(slots.len());
        for (id, slot) in slots {
            let last_activity = slot.lock().await.last_activity;
            snapshot.push((id, last_activity));
        }
        snapshot
    }

    /// Set the summary of the open topic if it is still `topic_id`.
    ///
    /// Returns whether the in-memory topic was updated.
    pub async fn update_summary(&self, conversation_id: &str, topic_id: TopicId, summary: &str) -> bool {
        let Some(slot) = self.find(conversation_id) else {
            return false;
        };
        let mut state = slot.lock().await;
        match state.open_topic.as_mut() {
            Some(topic) if topic.id == topic_id => {
                topic.summary = Some(summary.to_string());
                true
            }
            _ => false,
        }
    }

    /// Number of known conversations.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether no conversation has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
