//! Context snapshot construction.

use chrono::{DateTime, Utc};

use crate::types::{ContextSnapshot, Topic};

/// Builds the immutable payload handed to the decision oracle.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    persona: String,
    max_recent: usize,
}

impl ContextBuilder {
    /// Create a builder with the bot persona and recent-message window.
    pub fn new(persona: impl Into<String>, max_recent: usize) -> Self {
        Self {
            persona: persona.into(),
            max_recent,
        }
    }

    /// Snapshot `topic` as seen when `trigger_text` from `trigger_sender`
    /// arrived at `now`.
    ///
    /// The trigger is expected to be the topic's latest message. Gap fields
    /// are zero for topics with fewer than two messages.
    pub fn build(
        &self,
        conversation_id: &str,
        topic: &Topic,
        trigger_sender: &str,
        trigger_text: &str,
        now: DateTime<Utc>,
        mentioned: bool,
    ) -> ContextSnapshot {
        let messages = &topic.messages;
        let skip = messages.len().saturating_sub(self.max_recent);
        let recent_messages = messages[skip..].iter().map(|m| m.formatted()).collect();

        let (group_gap, user_gap) = match messages.split_last() {
            Some((_, earlier)) if !earlier.is_empty() => {
                let group = earlier.last().map(|m| seconds_between(m.timestamp, now));
                let user = earlier
                    .iter()
                    .rev()
                    .find(|m| m.sender_id == trigger_sender)
                    .map(|m| seconds_between(m.timestamp, now));
                (group.unwrap_or(0.0), user.unwrap_or(0.0))
            }
            _ => (0.0, 0.0),
        };

        ContextSnapshot {
            conversation_id: conversation_id.to_string(),
            topic_id: Some(topic.id),
            built_at: Some(now),
            persona: self.persona.clone(),
            recent_messages,
            topic_summary: topic.summary.clone(),
            latest_message: trigger_text.to_string(),
            time_since_last_group_message: group_gap,
            time_since_last_user_message: user_gap,
            is_at_mentioned: mentioned,
        }
    }

    /// Snapshot using the topic's latest message as the trigger.
    ///
    /// `None` for a topic without messages.
    pub fn rebuild(&self, conversation_id: &str, topic: &Topic, mentioned: bool) -> Option<ContextSnapshot> {
        let latest = topic.latest()?;
        Some(self.build(
            conversation_id,
            topic,
            &latest.sender_id,
            &latest.text,
            latest.timestamp,
            mentioned,
        ))
    }
}

fn seconds_between(earlier: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (now - earlier).num_milliseconds().max(0);
    millis as f64 / 1000.0
}
