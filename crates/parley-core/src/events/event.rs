//! Engagement events.
//!
//! Emitted as conversations move through topics and decisions, so
//! dashboards, memory extractors and tests can observe the engine without
//! reaching into its state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{TopicId, TriggerLevel};

/// An event about one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementEvent {
    /// Unique event ID
    pub event_id: String,
    /// Conversation the event belongs to
    pub conversation_id: String,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// What happened
    pub kind: EventKind,
}

/// What happened in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A new topic was opened
    TopicOpened { topic_id: TopicId },
    /// The previous topic went quiet and was archived
    TopicArchived {
        topic_id: TopicId,
        end_time: DateTime<Utc>,
    },
    /// The judge returned a verdict
    DecisionMade {
        should_intervene: bool,
        trigger_level: TriggerLevel,
        reason: String,
    },
    /// The bot replied, either on a verdict or on a mention
    Intervened { mentioned: bool, messages: usize },
    /// The sweeper restarted an idle conversation
    ProactiveSent { messages: usize },
    /// The judge flagged the context as worth remembering
    SignificantInfo {
        latest_message: String,
        recent_messages: Vec<String>,
    },
}

impl EngagementEvent {
    /// Create a new event stamped with the current time.
    pub fn new(conversation_id: impl Into<String>, kind: EventKind) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            timestamp: Utc::now(),
            kind,
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self.kind {
            EventKind::TopicOpened { .. } => "topic.opened",
            EventKind::TopicArchived { .. } => "topic.archived",
            EventKind::DecisionMade { .. } => "decision.made",
            EventKind::Intervened { .. } => "decision.intervened",
            EventKind::ProactiveSent { .. } => "proactive.sent",
            EventKind::SignificantInfo { .. } => "memory.significant_info",
        }
    }
}
