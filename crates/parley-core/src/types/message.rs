//! Chat and prompt message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message as it lives inside a topic.
///
/// Immutable once appended; ordering is arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a new chat message.
    pub fn new(
        sender_id: impl Into<String>,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            sender_id: sender_id.into(),
            display_name: None,
            text: text.into(),
            timestamp,
        }
    }

    /// Set the display name. Empty names are treated as absent.
    pub fn with_display_name(mut self, name: Option<impl Into<String>>) -> Self {
        self.display_name = name.map(Into::into).filter(|n: &String| !n.is_empty());
        self
    }

    /// Name shown in prompts: the display name when present, the sender id otherwise.
    pub fn speaker(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.sender_id)
    }

    /// `speaker: text`, the line format used in context snapshots.
    pub fn formatted(&self) -> String {
        format!("{}: {}", self.speaker(), self.text)
    }
}

/// An inbound event handed to the engine by a framework adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub conversation_id: String,
    pub sender_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub text: String,
    /// Whether the bot was explicitly addressed.
    #[serde(default)]
    pub mentioned: bool,
}

impl InboundMessage {
    /// Create a new inbound message.
    pub fn new(
        conversation_id: impl Into<String>,
        sender_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            sender_id: sender_id.into(),
            display_name: None,
            text: text.into(),
            mentioned: false,
        }
    }

    /// Set the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Mark the message as mentioning the bot.
    pub fn mentioning(mut self) -> Self {
        self.mentioned = true;
        self
    }
}

/// Role of a message sent to an LLM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    #[default]
    User,
    Assistant,
}

/// A message in an LLM prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speaker_prefers_display_name() {
        let now = Utc::now();
        let named = ChatMessage::new("10001", "hi", now).with_display_name(Some("Alice"));
        assert_eq!(named.formatted(), "Alice: hi");

        let anonymous = ChatMessage::new("10001", "hi", now).with_display_name(Some(""));
        assert_eq!(anonymous.display_name, None);
        assert_eq!(anonymous.formatted(), "10001: hi");
    }

    #[test]
    fn test_inbound_defaults_from_json() {
        let msg: InboundMessage =
            serde_json::from_str(r#"{"conversation_id":"g","sender_id":"u","text":"yo"}"#)
                .unwrap();
        assert!(!msg.mentioned);
        assert!(msg.display_name.is_none());
    }
}
