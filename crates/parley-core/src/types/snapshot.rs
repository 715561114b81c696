//! Context snapshot handed to the decision oracle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TopicId;

/// Immutable input payload for one oracle invocation.
///
/// Owns all of its data: mutating the conversation afterwards never
/// changes a snapshot already handed out. The serialized field names are
/// the ones the judge and chat prompts refer to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    #[serde(skip)]
    pub conversation_id: String,
    #[serde(skip)]
    pub topic_id: Option<TopicId>,
    #[serde(skip)]
    pub built_at: Option<DateTime<Utc>>,
    pub persona: String,
    pub recent_messages: Vec<String>,
    pub topic_summary: Option<String>,
    pub latest_message: String,
    /// Seconds since the previous message in the conversation.
    pub time_since_last_group_message: f64,
    /// Seconds since the previous message from the same sender.
    pub time_since_last_user_message: f64,
    pub is_at_mentioned: bool,
}

impl ContextSnapshot {
    /// Copy of this snapshot with the mention flag set.
    pub fn mentioned(mut self) -> Self {
        self.is_at_mentioned = true;
        self
    }

    /// One-line description stored alongside audit records.
    pub fn summary_line(&self) -> String {
        match &self.topic_summary {
            Some(summary) => format!("{} | {}", summary, self.latest_message),
            None => self.latest_message.clone(),
        }
    }
}
