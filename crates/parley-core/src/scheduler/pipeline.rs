//! Evaluation pipeline run when a debounce timer fires or the bot is
//! mentioned.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::PacingConfig;
use crate::conversation::TopicSegmenter;
use crate::error::{ParleyError, ParleyResult};
use crate::events::{EngagementEvent, EventBus, EventKind};
use crate::traits::{Clock, DecisionAuditLog, DecisionOracle, OutboundSender};
use crate::types::{ContextSnapshot, DecisionRecord, Verdict};

/// Collaborators shared by every evaluation.
pub struct EvaluationPipeline {
    segmenter: Arc<TopicSegmenter>,
    oracle: Arc<dyn DecisionOracle>,
    sender: Arc<dyn OutboundSender>,
    audit: Arc<dyn DecisionAuditLog>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    pacing: PacingConfig,
}

impl EvaluationPipeline {
    pub fn new(
        segmenter: Arc<TopicSegmenter>,
        oracle: Arc<dyn DecisionOracle>,
        sender: Arc<dyn OutboundSender>,
        audit: Arc<dyn DecisionAuditLog>,
        clock: Arc<dyn Clock>,
        events: EventBus,
        pacing: PacingConfig,
    ) -> Self {
        Self {
            segmenter,
            oracle,
            sender,
            audit,
            clock,
            events,
            pacing,
        }
    }

    /// Judge the conversation's current context and reply if asked to.
    ///
    /// Returns `None` when the conversation has nothing to judge.
    pub async fn evaluate(&self, conversation_id: &str) -> ParleyResult<Option<Verdict>> {
        let Some(context) = self.segmenter.latest_context(conversation_id, false).await else {
            debug!(conversation_id, "No context to evaluate");
            return Ok(None);
        };

        let verdict = self.oracle.judge(&context).await?;
        info!(
            conversation_id,
            should_intervene = verdict.should_intervene,
            trigger_level = %verdict.trigger_level,
            reason = %verdict.reason,
            "Judge verdict"
        );

        let record = DecisionRecord::new(
            conversation_id,
            self.clock.now(),
            self.oracle.model_name(),
            &verdict,
            context.summary_line(),
        );
        if let Err(e) = self.audit.record(&record) {
            warn!(conversation_id, error = %e, "Failed to write decision audit record");
        }

        self.events.emit(EngagementEvent::new(
            conversation_id,
            EventKind::DecisionMade {
                should_intervene: verdict.should_intervene,
                trigger_level: verdict.trigger_level,
                reason: verdict.reason.clone(),
            },
        ));
        if verdict.has_significant_info {
            self.events.emit(EngagementEvent::new(
                conversation_id,
                EventKind::SignificantInfo {
                    latest_message: context.latest_message.clone(),
                    recent_messages: context.recent_messages.clone(),
                },
            ));
        }

        if verdict.should_intervene {
            self.reply(&context).await?;
        }
        Ok(Some(verdict))
    }

    /// Reply to a mention without consulting the judge.
    ///
    /// Returns the number of messages sent.
    pub async fn intervene(&self, conversation_id: &str) -> ParleyResult<usize> {
        let context = self
            .segmenter
            .latest_context(conversation_id, true)
            .await
            .ok_or_else(|| ParleyError::no_open_topic(conversation_id))?;
        self.reply(&context).await
    }

    async fn reply(&self, context: &ContextSnapshot) -> ParleyResult<usize> {
        let conversation_id = context.conversation_id.as_str();
        let reply = self.oracle.respond(context).await?;

        if let (Some(summary), Some(topic_id)) = (&reply.summary, context.topic_id) {
            self.segmenter
                .apply_summary(conversation_id, topic_id, summary)
                .await;
        }

        for text in &reply.messages {
            tokio::time::sleep(typing_delay(&self.pacing, text)).await;
            self.sender.send(conversation_id, text).await?;
        }

        if !reply.messages.is_empty() {
            self.events.emit(EngagementEvent::new(
                conversation_id,
                EventKind::Intervened {
                    mentioned: context.is_at_mentioned,
                    messages: reply.messages.len(),
                },
            ));
        }
        Ok(reply.messages.len())
    }
}

/// Delay before sending `text`: a random base plus a per-character cost.
pub fn typing_delay(pacing: &PacingConfig, text: &str) -> Duration {
    let base = if pacing.max_delay_ms > pacing.min_delay_ms {
        rand::thread_rng().gen_range(pacing.min_delay_ms..=pacing.max_delay_ms)
    } else {
        pacing.min_delay_ms
    };
    let chars = text.chars().count() as u64;
    Duration::from_millis(base + pacing.per_char_ms * chars)
}
