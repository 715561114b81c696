//! Topic types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ChatMessage;

/// Identifier assigned to a topic by the topic store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(pub i64);

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One contiguous segment of a conversation.
///
/// While open a topic is owned by its conversation's state entry; once
/// archived only the topic store keeps it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub start_time: DateTime<Utc>,
    /// Absent while the topic is open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub last_message_time: DateTime<Utc>,
}

impl Topic {
    /// Open a new, empty topic.
    pub fn open(id: TopicId, start_time: DateTime<Utc>) -> Self {
        Self {
            id,
            start_time,
            end_time: None,
            messages: Vec::new(),
            summary: None,
            last_message_time: start_time,
        }
    }

    /// Whether the topic is still accepting messages.
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Append a message and advance `last_message_time`.
    pub fn push(&mut self, message: ChatMessage) {
        self.last_message_time = message.timestamp;
        self.messages.push(message);
    }

    /// Whether a message arriving at `now` belongs to a new topic.
    ///
    /// A gap exactly equal to the threshold still continues the topic.
    pub fn is_expired_at(&self, now: DateTime<Utc>, gap: chrono::Duration) -> bool {
        now - self.last_message_time > gap
    }

    /// Close the topic. The end time is the arrival of its last message.
    pub fn close(mut self) -> Self {
        self.end_time = Some(self.last_message_time);
        self
    }

    /// The most recent message, if any.
    pub fn latest(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_gap_boundary_is_strict() {
        let mut topic = Topic::open(TopicId(1), at(0));
        topic.push(ChatMessage::new("a", "hi", at(0)));

        let gap = Duration::seconds(600);
        assert!(!topic.is_expired_at(at(600), gap));
        assert!(topic.is_expired_at(at(601), gap));
    }

    #[test]
    fn test_close_uses_last_message_time() {
        let mut topic = Topic::open(TopicId(7), at(0));
        topic.push(ChatMessage::new("a", "hi", at(0)));
        topic.push(ChatMessage::new("b", "yo", at(50)));

        let closed = topic.close();
        assert!(!closed.is_open());
        assert_eq!(closed.end_time, Some(at(50)));
    }
}
