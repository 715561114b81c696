//! Typed oracle results.
//!
//! The oracle boundary validates raw model output into these types; the
//! rest of the engine never touches untyped JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::error::{ParleyError, ParleyResult};

/// How strongly the judge felt the bot should speak.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum TriggerLevel {
    #[default]
    Low,
    Medium,
    High,
}

// Accepts any casing.
impl<'de> Deserialize<'de> for TriggerLevel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.trim().parse().map_err(serde::de::Error::custom)
    }
}

/// Result of the judge step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub should_intervene: bool,
    #[serde(default)]
    pub trigger_level: TriggerLevel,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub has_significant_info: bool,
}

impl Verdict {
    /// A verdict that keeps the bot silent.
    pub fn silent(reason: impl Into<String>) -> Self {
        Self {
            should_intervene: false,
            trigger_level: TriggerLevel::Low,
            reason: reason.into(),
            has_significant_info: false,
        }
    }

    /// A verdict that asks the bot to speak.
    pub fn intervene(level: TriggerLevel, reason: impl Into<String>) -> Self {
        Self {
            should_intervene: true,
            trigger_level: level,
            reason: reason.into(),
            has_significant_info: false,
        }
    }

    /// Builder method to flag the context as worth remembering.
    pub fn with_significant_info(mut self) -> Self {
        self.has_significant_info = true;
        self
    }
}

/// Result of the respond step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub messages: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl ChatReply {
    /// Create a reply from outgoing lines.
    pub fn new(messages: Vec<String>) -> Self {
        Self {
            messages,
            summary: None,
        }
    }

    /// Builder method to attach a topic summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Drop blank lines and blank summaries; fail if nothing remains to say.
    pub fn validated(self) -> ParleyResult<Self> {
        let messages: Vec<String> = self
            .messages
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        let summary = self
            .summary
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        if messages.is_empty() && summary.is_none() {
            return Err(ParleyError::invalid_reply(
                "chat reply contained neither messages nor a summary",
            ));
        }
        Ok(Self { messages, summary })
    }
}

/// Result of the proactive step. An empty message list means "stay quiet".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProactiveTopic {
    #[serde(default)]
    pub messages: Vec<String>,
}

impl ProactiveTopic {
    /// Create a proactive topic from outgoing lines, dropping blank ones.
    pub fn new(messages: Vec<String>) -> Self {
        Self {
            messages: messages
                .into_iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    /// Whether there is nothing to send.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// One row of the decision audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub conversation_id: String,
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub should_intervene: bool,
    pub trigger_level: TriggerLevel,
    pub reason: String,
    pub has_significant_info: bool,
    pub context_summary: String,
}

impl DecisionRecord {
    /// Build a record from a completed judge call.
    pub fn new(
        conversation_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        model: impl Into<String>,
        verdict: &Verdict,
        context_summary: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            timestamp,
            model: model.into(),
            should_intervene: verdict.should_intervene,
            trigger_level: verdict.trigger_level,
            reason: verdict.reason.clone(),
            has_significant_info: verdict.has_significant_info,
            context_summary: context_summary.into(),
        }
    }
}
