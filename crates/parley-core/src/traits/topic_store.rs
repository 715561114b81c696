//! Topic store trait.

use chrono::{DateTime, Utc};

use crate::error::ParleyResult;
use crate::types::TopicId;

/// Durable record of topics and their messages.
///
/// Calls are synchronous: message ingestion must be durable before any
/// decision is scheduled.
pub trait TopicStore: Send + Sync {
    /// Create a topic and return its id.
    fn create_topic(&self, conversation_id: &str, start_time: DateTime<Utc>)
        -> ParleyResult<TopicId>;

    /// Append a message to a topic.
    fn append_message(
        &self,
        topic_id: TopicId,
        sender_id: &str,
        text: &str,
        time: DateTime<Utc>,
        display_name: Option<&str>,
    ) -> ParleyResult<()>;

    /// Replace the topic summary.
    fn set_summary(&self, topic_id: TopicId, summary: &str) -> ParleyResult<()>;

    /// Mark the topic as archived.
    fn close_topic(&self, topic_id: TopicId, end_time: DateTime<Utc>) -> ParleyResult<()>;
}
