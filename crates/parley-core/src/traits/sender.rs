//! Outbound sender and decision audit log traits.

use async_trait::async_trait;

use crate::error::ParleyResult;
use crate::types::DecisionRecord;

/// Framework adapter that delivers bot messages to a conversation.
///
/// Pacing between messages is controlled by the caller.
#[async_trait]
pub trait OutboundSender: Send + Sync {
    /// Send one message.
    async fn send(&self, conversation_id: &str, text: &str) -> ParleyResult<()>;
}

/// Write-only sink for completed judge calls.
pub trait DecisionAuditLog: Send + Sync {
    /// Record a decision. Failures are logged by the caller and otherwise ignored.
    fn record(&self, record: &DecisionRecord) -> ParleyResult<()>;
}
