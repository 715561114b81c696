//! Prompt-driven decision oracle.
//!
//! A small judge model decides whether to speak; a larger chat model writes
//! the reply and the proactive openers. Context snapshots travel as the JSON
//! user message and every reply is requested in JSON mode.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

#[cfg(feature = "openai")]
use parley_core::config::ParleyConfig;
use parley_core::config::PromptConfig;
use parley_core::error::{ParleyError, ParleyResult};
use parley_core::traits::{DecisionOracle, GenerationOptions, Llm};
use parley_core::types::{ChatReply, ContextSnapshot, ProactiveTopic, PromptMessage, Verdict};

use crate::json::parse_model_json;

#[derive(Debug, Deserialize)]
struct RawReply {
    #[serde(default)]
    messages: Vec<String>,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawProactive {
    #[serde(default)]
    messages: Vec<String>,
}

/// [`DecisionOracle`] backed by two LLMs.
pub struct LlmOracle {
    judge: Arc<dyn Llm>,
    chat: Arc<dyn Llm>,
    prompts: PromptConfig,
}

impl LlmOracle {
    /// Create an oracle from a judge model, a chat model and prompts.
    pub fn new(judge: Arc<dyn Llm>, chat: Arc<dyn Llm>, prompts: PromptConfig) -> Self {
        Self {
            judge,
            chat,
            prompts,
        }
    }

    /// Build both models as OpenAI-compatible providers from the config.
    #[cfg(feature = "openai")]
    pub fn from_config(config: &ParleyConfig) -> ParleyResult<Self> {
        let judge = crate::OpenAIProvider::new(config.llm.judge.clone())?;
        let chat = crate::OpenAIProvider::new(config.llm.chat.clone())?;
        Ok(Self::new(Arc::new(judge), Arc::new(chat), config.prompts.clone()))
    }

    async fn complete(&self, llm: &dyn Llm, system: &str, user: String) -> ParleyResult<String> {
        let messages = [PromptMessage::system(system), PromptMessage::user(user)];
        let options = if llm.supports_json_mode() {
            Some(GenerationOptions::json())
        } else {
            None
        };
        let response = llm.generate(&messages, options).await?;
        response
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ParleyError::oracle(format!("{} returned no content", llm.model_name())))
    }
}

#[async_trait]
impl DecisionOracle for LlmOracle {
    async fn judge(&self, context: &ContextSnapshot) -> ParleyResult<Verdict> {
        let payload = serde_json::to_string(context)?;
        let raw = self
            .complete(self.judge.as_ref(), &self.prompts.judge_system, payload)
            .await?;

        let verdict: Verdict = parse_model_json(&raw)
            .map_err(|e| ParleyError::invalid_verdict(format!("Unusable judge output: {}", e)))?;
        tracing::debug!(
            conversation_id = %context.conversation_id,
            should_intervene = verdict.should_intervene,
            trigger_level = %verdict.trigger_level,
            "Parsed verdict"
        );
        Ok(verdict)
    }

    async fn respond(&self, context: &ContextSnapshot) -> ParleyResult<ChatReply> {
        let mut payload = serde_json::to_value(context)?;
        if let Some(object) = payload.as_object_mut() {
            object.insert("should_return_summary".to_string(), serde_json::Value::Bool(true));
        }
        let raw = self
            .complete(self.chat.as_ref(), &self.prompts.chat_system, payload.to_string())
            .await?;

        let reply: RawReply = parse_model_json(&raw)
            .map_err(|e| ParleyError::invalid_reply(format!("Unusable chat output: {}", e)))?;
        ChatReply {
            messages: reply.messages,
            summary: reply.summary,
        }
        .validated()
    }

    async fn proactive_topic(&self) -> ParleyResult<ProactiveTopic> {
        let raw = self
            .complete(
                self.chat.as_ref(),
                &self.prompts.proactive_system,
                self.prompts.proactive_kickoff.clone(),
            )
            .await?;
        let parsed: RawProactive = parse_model_json(&raw)
            .map_err(|e| ParleyError::invalid_reply(format!("Unusable proactive output: {}", e)))?;
        Ok(ProactiveTopic::new(parsed.messages))
    }

    fn model_name(&self) -> &str {
        self.judge.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::error::ErrorCode;
    use parley_core::traits::{LlmResponse, ResponseFormat};
    use parley_core::types::{PromptRole, TriggerLevel};
    use std::sync::Mutex;

    /// Llm returning a canned completion and recording its prompts.
    struct CannedLlm {
        name: &'static str,
        output: Option<String>,
        prompts: Mutex<Vec<Vec<PromptMessage>>>,
        json_requested: Mutex<bool>,
    }

    impl CannedLlm {
        fn new(name: &'static str, output: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                name,
                output: output.map(str::to_string),
                prompts: Mutex::default(),
                json_requested: Mutex::new(false),
            })
        }

        fn last_user_json(&self) -> serde_json::Value {
            let prompts = self.prompts.lock().unwrap();
            let last = prompts.last().unwrap();
            assert_eq!(last[0].role, PromptRole::System);
            serde_json::from_str(&last[1].content).unwrap()
        }
    }

    #[async_trait]
    impl Llm for CannedLlm {
        async fn generate(
            &self,
            messages: &[PromptMessage],
            options: Option<GenerationOptions>,
        ) -> ParleyResult<LlmResponse> {
            self.prompts.lock().unwrap().push(messages.to_vec());
            *self.json_requested.lock().unwrap() =
                options.and_then(|o| o.response_format) == Some(ResponseFormat::Json);
            Ok(LlmResponse {
                content: self.output.clone(),
                usage: None,
            })
        }

        fn model_name(&self) -> &str {
            self.name
        }
    }

    fn snapshot() -> ContextSnapshot {
        ContextSnapshot {
            conversation_id: "g".to_string(),
            topic_id: None,
            built_at: None,
            persona: "a cheerful cat".to_string(),
            recent_messages: vec!["A: anyone seen my keys?".to_string()],
            topic_summary: None,
            latest_message: "anyone seen my keys?".to_string(),
            time_since_last_group_message: 0.0,
            time_since_last_user_message: 0.0,
            is_at_mentioned: false,
        }
    }

    fn oracle(judge: Arc<CannedLlm>, chat: Arc<CannedLlm>) -> LlmOracle {
        LlmOracle::new(judge, chat, PromptConfig::default())
    }

    #[tokio::test]
    async fn test_judge_sends_snapshot_and_parses_verdict() {
        let judge = CannedLlm::new(
            "judge-mini",
            Some(r#"```json
{"should_intervene": true, "trigger_level": "High", "reason": "question", "has_significant_info": true}
```"#),
        );
        let oracle = oracle(judge.clone(), CannedLlm::new("chat", None));

        let verdict = oracle.judge(&snapshot()).await.unwrap();
        assert!(verdict.should_intervene);
        assert_eq!(verdict.trigger_level, TriggerLevel::High);
        assert!(verdict.has_significant_info);
        assert_eq!(oracle.model_name(), "judge-mini");

        let sent = judge.last_user_json();
        assert_eq!(sent["latest_message"], "anyone seen my keys?");
        assert_eq!(sent["is_at_mentioned"], false);
        assert!(sent.get("conversation_id").is_none());
        assert!(*judge.json_requested.lock().unwrap());
    }

    #[tokio::test]
    async fn test_malformed_verdict_is_an_error() {
        let oracle = oracle(
            CannedLlm::new("judge", Some(r#"{"trigger_level": "low"}"#)),
            CannedLlm::new("chat", None),
        );
        let err = oracle.judge(&snapshot()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::OrcInvalidVerdict);

        let oracle = oracle_with_judge_output(None);
        assert_eq!(
            oracle.judge(&snapshot()).await.unwrap_err().code(),
            ErrorCode::OrcUnavailable
        );
    }

    fn oracle_with_judge_output(output: Option<&str>) -> LlmOracle {
        oracle(CannedLlm::new("judge", output), CannedLlm::new("chat", None))
    }

    #[tokio::test]
    async fn test_respond_requests_summary() {
        let chat = CannedLlm::new(
            "chat-large",
            Some(r#"{"messages": ["check the couch", "  "], "summary": "lost keys"}"#),
        );
        let oracle = oracle(CannedLlm::new("judge", None), chat.clone());

        let reply = oracle.respond(&snapshot().mentioned()).await.unwrap();
        assert_eq!(reply.messages, vec!["check the couch"]);
        assert_eq!(reply.summary.as_deref(), Some("lost keys"));

        let sent = chat.last_user_json();
        assert_eq!(sent["should_return_summary"], true);
        assert_eq!(sent["is_at_mentioned"], true);
    }

    #[tokio::test]
    async fn test_empty_reply_is_rejected() {
        let oracle = oracle(
            CannedLlm::new("judge", None),
            CannedLlm::new("chat", Some(r#"{"messages": []}"#)),
        );
        let err = oracle.respond(&snapshot()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::OrcInvalidReply);
    }

    #[tokio::test]
    async fn test_proactive_topic_uses_chat_model() {
        let chat = CannedLlm::new("chat", Some(r#"{"messages": ["so... pizza tonight?"]}"#));
        let oracle = oracle(CannedLlm::new("judge", None), chat.clone());

        let topic = oracle.proactive_topic().await.unwrap();
        assert_eq!(topic.messages, vec!["so... pizza tonight?"]);

        let prompts = chat.prompts.lock().unwrap();
        assert_eq!(prompts[0][1].content, PromptConfig::default().proactive_kickoff);
    }
}
