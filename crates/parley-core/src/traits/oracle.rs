//! Decision oracle trait.

use async_trait::async_trait;

use crate::error::ParleyResult;
use crate::types::{ChatReply, ContextSnapshot, ProactiveTopic, Verdict};

/// Opaque component that decides whether and how the bot speaks.
///
/// Implementations validate raw model output at this boundary; malformed
/// output is an `Err`, never a partially filled value.
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    /// Judge whether the bot should intervene in the given context.
    async fn judge(&self, context: &ContextSnapshot) -> ParleyResult<Verdict>;

    /// Produce the outbound chat lines (and optionally a topic summary).
    async fn respond(&self, context: &ContextSnapshot) -> ParleyResult<ChatReply>;

    /// Produce messages that restart an idle conversation.
    async fn proactive_topic(&self) -> ParleyResult<ProactiveTopic>;

    /// Model name recorded in the decision audit log.
    fn model_name(&self) -> &str;
}
