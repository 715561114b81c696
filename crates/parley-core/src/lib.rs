//! parley-core - Conversation engagement engine for group-chat bots.
//!
//! This crate segments each conversation into topics, debounces bursts of
//! messages into a single intervention decision, and restarts conversations
//! that have gone quiet. The decision itself is delegated to a
//! [`DecisionOracle`]; delivery to a [`OutboundSender`].
//!
//! # Example
//!
//! ```ignore
//! use parley_core::{Engine, EngineParts, InboundMessage, ParleyConfig};
//!
//! let engine = Engine::new(ParleyConfig::default(), EngineParts::new(store, oracle, sender, audit));
//! engine.start().await?;
//!
//! // Every inbound message goes through the engine
//! engine.handle_message(InboundMessage::new("group-1", "alice", "anyone up for lunch?")).await?;
//! ```

pub mod config;
pub mod conversation;
pub mod engine;
pub mod error;
pub mod events;
pub mod scheduler;
pub mod storage;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::ParleyConfig;
pub use conversation::{ContextBuilder, ConversationState, ConversationTable, TopicSegmenter};
pub use engine::{Engine, EngineParts};
pub use error::{ErrorCode, ParleyError, ParleyResult};
pub use events::{EngagementEvent, EventBus, EventKind, EventSubscriber};
pub use scheduler::{DebounceScheduler, EvaluationPipeline, InactivitySweeper};
pub use storage::{RetryQueue, SqliteAuditLog, SqliteTopicStore};
pub use traits::{
    Clock, DecisionAuditLog, DecisionOracle, Llm, LlmConfig, ManualClock, OutboundSender,
    SystemClock, TopicStore,
};
pub use types::{
    ChatMessage, ChatReply, ContextSnapshot, DecisionRecord, InboundMessage, ProactiveTopic,
    PromptMessage, PromptRole, Topic, TopicId, TriggerLevel, Verdict,
};
