//! Inactivity sweeper.
//!
//! Periodically looks for conversations that have gone quiet and asks the
//! oracle for something to restart them with. Runs as a
//! tokio-cron-scheduler repeated job; [`InactivitySweeper::sweep_once`]
//! can also be called directly.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};

use crate::config::{BotConfig, SweeperConfig};
use crate::conversation::{ConversationTable, TopicSegmenter};
use crate::error::{ErrorCode, ParleyError, ParleyResult};
use crate::events::{EngagementEvent, EventBus, EventKind};
use crate::traits::{Clock, DecisionOracle, OutboundSender};

/// Restarts idle conversations with proactive messages.
pub struct InactivitySweeper {
    table: Arc<ConversationTable>,
    segmenter: Arc<TopicSegmenter>,
    oracle: Arc<dyn DecisionOracle>,
    sender: Arc<dyn OutboundSender>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    config: SweeperConfig,
    bot: BotConfig,
    scheduler: Mutex<Option<JobScheduler>>,
    /// Held for the whole of a sweep.
    sweeping: Mutex<()>,
}

impl InactivitySweeper {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        table: Arc<ConversationTable>,
        segmenter: Arc<TopicSegmenter>,
        oracle: Arc<dyn DecisionOracle>,
        sender: Arc<dyn OutboundSender>,
        clock: Arc<dyn Clock>,
        events: EventBus,
        config: SweeperConfig,
        bot: BotConfig,
    ) -> Self {
        Self {
            table,
            segmenter,
            oracle,
            sender,
            clock,
            events,
            config,
            bot,
            scheduler: Mutex::new(None),
            sweeping: Mutex::new(()),
        }
    }

    /// Get the sweeper configuration.
    pub fn config(&self) -> &SweeperConfig {
        &self.config
    }

    /// Run one sweep over every known conversation.
    ///
    /// Returns how many conversations received proactive messages. A call
    /// made while another sweep is still running returns 0 without
    /// looking at any conversation.
    pub async fn sweep_once(&self) -> usize {
        let Ok(_sweeping) = self.sweeping.try_lock() else {
            debug!("Previous sweep still running, skipping");
            return 0;
        };

        let now = self.clock.now();
        let threshold = self.config.inactivity_threshold();

        let idle: Vec<String> = self
            .table
            .activity_snapshot()
            .await
            .into_iter()
            .filter(|(_, last_activity)| now - *last_activity > threshold)
            .map(|(id, _)| id)
            .collect();

        let mut restarted = 0;
        for conversation_id in idle {
            match self.restart(&conversation_id).await {
                Ok(0) => {}
                Ok(sent) => {
                    info!(conversation_id = %conversation_id, sent, "Sent proactive topic");
                    restarted += 1;
                }
                Err(e) => {
                    warn!(conversation_id = %conversation_id, error = %e, "Proactive restart failed");
                }
            }
        }
        restarted
    }

    async fn restart(&self, conversation_id: &str) -> ParleyResult<usize> {
        let proactive = self.oracle.proactive_topic().await?;
        if proactive.is_empty() {
            debug!(conversation_id, "Oracle had nothing to say");
            return Ok(0);
        }

        let now = self.clock.now();
        self.table
            .upsert(conversation_id, now, |state| state.last_activity = now)
            .await;

        for (i, text) in proactive.messages.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.message_delay()).await;
            }
            self.sender.send(conversation_id, text).await?;

            if let Err(e) = self
                .segmenter
                .record(
                    conversation_id,
                    &self.bot.sender_id,
                    text,
                    Some(self.bot.name.as_str()),
                    self.clock.now(),
                )
                .await
            {
                warn!(conversation_id, error = %e, "Failed to record proactive message");
            }
        }

        self.events.emit(EngagementEvent::new(
            conversation_id,
            EventKind::ProactiveSent {
                messages: proactive.messages.len(),
            },
        ));
        Ok(proactive.messages.len())
    }

    /// Start the periodic sweep job.
    ///
    /// Does nothing when the sweeper is disabled or already running.
    pub async fn start(self: &Arc<Self>) -> ParleyResult<()> {
        if !self.config.enabled {
            info!("Inactivity sweeper disabled");
            return Ok(());
        }
        let mut slot = self.scheduler.lock().await;
        if slot.is_some() {
            return Ok(());
        }

        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| ParleyError::scheduler(ErrorCode::SchedCreateFailed, e.to_string()))?;

        let sweeper = Arc::clone(self);
        let job = Job::new_repeated_async(self.config.interval(), move |_uuid, _lock| {
            let sweeper = sweeper.clone();
            Box::pin(async move {
                debug!("Starting inactivity sweep");
                let restarted = sweeper.sweep_once().await;
                debug!(restarted, "Inactivity sweep complete");
            })
        })
        .map_err(|e| ParleyError::scheduler(ErrorCode::SchedCreateFailed, e.to_string()))?;

        scheduler
            .add(job)
            .await
            .map_err(|e| ParleyError::scheduler(ErrorCode::SchedStartFailed, e.to_string()))?;
        scheduler
            .start()
            .await
            .map_err(|e| ParleyError::scheduler(ErrorCode::SchedStartFailed, e.to_string()))?;

        info!(
            interval_seconds = self.config.interval_seconds,
            inactivity_minutes = self.config.inactivity_minutes,
            "Inactivity sweeper started"
        );
        *slot = Some(scheduler);
        Ok(())
    }

    /// Stop the periodic sweep job.
    pub async fn shutdown(&self) -> ParleyResult<()> {
        let Some(mut scheduler) = self.scheduler.lock().await.take() else {
            return Ok(());
        };
        info!("Shutting down inactivity sweeper");
        scheduler.shutdown().await.map_err(|e| {
            error!(error = %e, "Sweeper shutdown failed");
            ParleyError::scheduler(ErrorCode::SchedShutdownFailed, e.to_string())
        })
    }

    /// Whether the periodic job is running.
    pub async fn is_running(&self) -> bool {
        self.scheduler.lock().await.is_some()
    }
}
