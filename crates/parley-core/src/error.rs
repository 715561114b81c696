//! Error types for parley operations.
//!
//! Every fallible operation in the crate returns [`ParleyResult`]. Errors
//! carry a structured [`ErrorCode`] so adapters can map them without
//! matching on message text.

use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for parley operations.
pub type ParleyResult<T> = Result<T, ParleyError>;

/// Main error type for all parley operations.
#[derive(Error, Debug)]
pub enum ParleyError {
    /// Input validation failed.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: ErrorCode,
        details: HashMap<String, String>,
        suggestion: Option<String>,
    },

    /// Conversation or topic not found.
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        code: ErrorCode,
        conversation_id: Option<String>,
    },

    /// The decision oracle failed or returned something unusable.
    #[error("Oracle error: {message}")]
    Oracle {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// LLM provider call failed.
    #[error("LLM error: {message}")]
    Llm {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Topic store or audit log operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Outbound delivery failed.
    #[error("Send error: {message}")]
    Send {
        message: String,
        code: ErrorCode,
        conversation_id: Option<String>,
    },

    /// Scheduler could not be created, started or stopped.
    #[error("Scheduler error: {message}")]
    Scheduler { message: String, code: ErrorCode },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Parse error.
    #[error("Parse error: {message}")]
    Parse { message: String, code: ErrorCode },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Validation (VAL_xxx)
    ValInvalidInput,
    ValMissingField,
    ValInvalidConfig,

    // Conversation (CONV_xxx)
    ConvNotFound,
    ConvNoOpenTopic,
    ConvTopicNotFound,

    // Oracle (ORC_xxx)
    OrcUnavailable,
    OrcInvalidVerdict,
    OrcInvalidReply,

    // LLM (LLM_xxx)
    LlmConnectionFailed,
    LlmGenerationFailed,
    LlmInvalidResponse,

    // Database (DB_xxx)
    DbConnectionFailed,
    DbOperationFailed,

    // Outbound (SEND_xxx)
    SendFailed,
    SendClosed,

    // Scheduler (SCHED_xxx)
    SchedCreateFailed,
    SchedStartFailed,
    SchedShutdownFailed,

    // Parse (PARSE_xxx)
    ParseInvalidJson,
    ParseMissingField,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValMissingField => "VAL_002",
            ErrorCode::ValInvalidConfig => "VAL_003",
            ErrorCode::ConvNotFound => "CONV_001",
            ErrorCode::ConvNoOpenTopic => "CONV_002",
            ErrorCode::ConvTopicNotFound => "CONV_003",
            ErrorCode::OrcUnavailable => "ORC_001",
            ErrorCode::OrcInvalidVerdict => "ORC_002",
            ErrorCode::OrcInvalidReply => "ORC_003",
            ErrorCode::LlmConnectionFailed => "LLM_001",
            ErrorCode::LlmGenerationFailed => "LLM_002",
            ErrorCode::LlmInvalidResponse => "LLM_003",
            ErrorCode::DbConnectionFailed => "DB_001",
            ErrorCode::DbOperationFailed => "DB_002",
            ErrorCode::SendFailed => "SEND_001",
            ErrorCode::SendClosed => "SEND_002",
            ErrorCode::SchedCreateFailed => "SCHED_001",
            ErrorCode::SchedStartFailed => "SCHED_002",
            ErrorCode::SchedShutdownFailed => "SCHED_003",
            ErrorCode::ParseInvalidJson => "PARSE_001",
            ErrorCode::ParseMissingField => "PARSE_002",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl ParleyError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            details: HashMap::new(),
            suggestion: None,
        }
    }

    /// Create a validation error with suggestion.
    pub fn validation_with_suggestion(
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            details: HashMap::new(),
            suggestion: Some(suggestion.into()),
        }
    }

    /// Create a conversation-not-found error.
    pub fn not_found(conversation_id: impl Into<String>) -> Self {
        let id = conversation_id.into();
        Self::NotFound {
            message: format!("Conversation '{}' not found", id),
            code: ErrorCode::ConvNotFound,
            conversation_id: Some(id),
        }
    }

    /// Create a no-open-topic error.
    pub fn no_open_topic(conversation_id: impl Into<String>) -> Self {
        let id = conversation_id.into();
        Self::NotFound {
            message: format!("Conversation '{}' has no open topic", id),
            code: ErrorCode::ConvNoOpenTopic,
            conversation_id: Some(id),
        }
    }

    /// Create a topic-not-found error.
    pub fn topic_not_found(topic_id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            message: format!("Topic {} does not exist", topic_id),
            code: ErrorCode::ConvTopicNotFound,
            conversation_id: None,
        }
    }

    /// Create an oracle error.
    pub fn oracle(message: impl Into<String>) -> Self {
        Self::Oracle {
            message: message.into(),
            code: ErrorCode::OrcUnavailable,
            source: None,
        }
    }

    /// Create an oracle error for a verdict that failed validation.
    pub fn invalid_verdict(message: impl Into<String>) -> Self {
        Self::Oracle {
            message: message.into(),
            code: ErrorCode::OrcInvalidVerdict,
            source: None,
        }
    }

    /// Create an oracle error for a chat reply that failed validation.
    pub fn invalid_reply(message: impl Into<String>) -> Self {
        Self::Oracle {
            message: message.into(),
            code: ErrorCode::OrcInvalidReply,
            source: None,
        }
    }

    /// Create an LLM error.
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
            code: ErrorCode::LlmGenerationFailed,
            source: None,
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            code: ErrorCode::ParseInvalidJson,
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            code: ErrorCode::DbOperationFailed,
            source: None,
        }
    }

    /// Create an outbound send error.
    pub fn send(conversation_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Send {
            message: message.into(),
            code: ErrorCode::SendFailed,
            conversation_id: Some(conversation_id.into()),
        }
    }

    /// Create a scheduler error.
    pub fn scheduler(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Scheduler {
            message: message.into(),
            code,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { code, .. } => *code,
            Self::NotFound { code, .. } => *code,
            Self::Oracle { code, .. } => *code,
            Self::Llm { code, .. } => *code,
            Self::Database { code, .. } => *code,
            Self::Send { code, .. } => *code,
            Self::Scheduler { code, .. } => *code,
            Self::Parse { code, .. } => *code,
            Self::Configuration(_) => ErrorCode::ValInvalidConfig,
            _ => ErrorCode::Internal,
        }
    }

    /// Whether a retry of the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::DbConnectionFailed
                | ErrorCode::DbOperationFailed
                | ErrorCode::LlmConnectionFailed
                | ErrorCode::OrcUnavailable
                | ErrorCode::SendFailed
        )
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Validation { suggestion, .. } => suggestion.as_deref(),
            Self::Database { .. } => Some("Please check the storage path and disk space"),
            Self::Llm { .. } => Some("Please check your LLM provider configuration"),
            Self::Oracle { .. } => Some("Please check the judge and chat prompts and models"),
            Self::Configuration(_) => Some("Please check your parley configuration file"),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for ParleyError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            code: ErrorCode::DbOperationFailed,
            source: Some(Box::new(err)),
        }
    }
}
