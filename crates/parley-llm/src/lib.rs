//! parley-llm - LLM-backed decision oracle for parley.
//!
//! # Components
//!
//! - [`OpenAIProvider`] (feature: `openai`) - any OpenAI-compatible chat endpoint
//! - [`LlmOracle`] - judge/chat/proactive prompts over two [`Llm`]s
//!
//! # Example
//!
//! ```ignore
//! use parley_llm::LlmOracle;
//!
//! let config = ParleyConfig::from_file("parley.toml")?.with_env_overrides();
//! let oracle = LlmOracle::from_config(&config)?;
//! ```

pub mod json;
mod openai;
mod oracle;

pub use openai::OpenAIProvider;
pub use oracle::LlmOracle;

// Re-export core types for convenience
pub use parley_core::traits::{GenerationOptions, Llm, LlmConfig, LlmResponse, ResponseFormat};
