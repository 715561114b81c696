//! OpenAI-compatible LLM provider implementation.

use async_trait::async_trait;

use parley_core::error::{ParleyError, ParleyResult};
use parley_core::traits::{GenerationOptions, Llm, LlmConfig, LlmResponse, ResponseFormat, TokenUsage};
use parley_core::types::{PromptMessage, PromptRole};

#[cfg(feature = "openai")]
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
        ResponseFormat as OpenAIResponseFormat,
    },
    Client,
};

/// OpenAI (or any OpenAI-compatible endpoint) chat completion provider.
pub struct OpenAIProvider {
    #[cfg(feature = "openai")]
    client: Client<OpenAIConfig>,
    config: LlmConfig,
}

impl OpenAIProvider {
    /// Create a new provider.
    ///
    /// The API key comes from the config or `OPENAI_API_KEY`; `base_url`
    /// points the client at a compatible endpoint.
    pub fn new(config: LlmConfig) -> ParleyResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                ParleyError::Configuration(
                    "OpenAI API key not found. Set OPENAI_API_KEY or provide api_key in the llm config."
                        .to_string(),
                )
            })?;

        #[cfg(feature = "openai")]
        let client = {
            let openai_config = match config.base_url {
                Some(ref base_url) => OpenAIConfig::new()
                    .with_api_key(api_key)
                    .with_api_base(base_url),
                None => OpenAIConfig::new().with_api_key(api_key),
            };
            Client::with_config(openai_config)
        };
        #[cfg(not(feature = "openai"))]
        let _ = api_key;

        let mut config = config;
        if config.model.is_empty() {
            config.model = "gpt-4o-mini".to_string();
        }

        Ok(Self {
            #[cfg(feature = "openai")]
            client,
            config,
        })
    }

    /// Reasoning models reject sampling parameters.
    fn is_reasoning_model(&self) -> bool {
        let model = self.config.model.to_lowercase();
        ["o1", "o3", "gpt-5"].iter().any(|m| model.contains(m))
    }

    #[cfg(feature = "openai")]
    fn to_openai(message: &PromptMessage) -> ChatCompletionRequestMessage {
        let content = message.content.clone();
        match message.role {
            PromptRole::System => ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(content),
                name: None,
            }),
            PromptRole::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(content),
                name: None,
            }),
            PromptRole::Assistant => {
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content: Some(ChatCompletionRequestAssistantMessageContent::Text(content)),
                    ..Default::default()
                })
            }
        }
    }
}

#[async_trait]
impl Llm for OpenAIProvider {
    #[cfg(feature = "openai")]
    async fn generate(
        &self,
        messages: &[PromptMessage],
        options: Option<GenerationOptions>,
    ) -> ParleyResult<LlmResponse> {
        let options = options.unwrap_or_default();

        let mut request = CreateChatCompletionRequest {
            model: self.config.model.clone(),
            messages: messages.iter().map(Self::to_openai).collect(),
            ..Default::default()
        };

        if !self.is_reasoning_model() {
            request.temperature = Some(options.temperature.unwrap_or(self.config.temperature));
            request.top_p = Some(options.top_p.unwrap_or(self.config.top_p));
            request.max_tokens = Some(options.max_tokens.unwrap_or(self.config.max_tokens));
        }
        if options.response_format == Some(ResponseFormat::Json) {
            request.response_format = Some(OpenAIResponseFormat::JsonObject);
        }

        tracing::debug!(model = %self.config.model, messages = messages.len(), "Requesting completion");

        let timeout = std::time::Duration::from_secs(self.config.timeout_secs);
        let response = tokio::time::timeout(timeout, self.client.chat().create(request))
            .await
            .map_err(|_| ParleyError::llm(format!("OpenAI request timed out after {:?}", timeout)))?
            .map_err(|e| ParleyError::llm(format!("OpenAI API error: {}", e)))?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| ParleyError::llm("No response choices returned"))?;

        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(LlmResponse {
            content: choice.message.content.clone(),
            usage,
        })
    }

    #[cfg(not(feature = "openai"))]
    async fn generate(
        &self,
        _messages: &[PromptMessage],
        _options: Option<GenerationOptions>,
    ) -> ParleyResult<LlmResponse> {
        Err(ParleyError::Configuration(
            "OpenAI feature not enabled. Enable the 'openai' feature.".to_string(),
        ))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn supports_json_mode(&self) -> bool {
        true
    }
}
