//! Shared fakes for engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parley_core::config::PacingConfig;
use parley_core::{
    ChatReply, ContextSnapshot, DecisionOracle, Engine, EngineParts, ManualClock, OutboundSender,
    ParleyConfig, ParleyError, ParleyResult, ProactiveTopic, SqliteAuditLog, SqliteTopicStore,
    TopicId, TopicStore, Verdict,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn t0() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

pub fn at(secs: i64) -> DateTime<Utc> {
    t0() + chrono::Duration::seconds(secs)
}

/// Defaults with no typing delay and the periodic sweep left to the test.
pub fn test_config() -> ParleyConfig {
    let mut config = ParleyConfig::default();
    config.pacing = PacingConfig::instant();
    config.sweeper.enabled = false;
    config.bot.sender_id = "parley".to_string();
    config.bot.name = "Parley".to_string();
    config
}

/// Let spawned tasks make progress without moving the paused clock much.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// Oracle with scripted answers that records what it was asked.
pub struct ScriptedOracle {
    pub verdict: Mutex<Verdict>,
    pub reply: Mutex<ChatReply>,
    pub proactive: Mutex<ProactiveTopic>,
    pub fail_judge: AtomicBool,
    pub judge_delay: Mutex<Duration>,
    pub proactive_delay: Mutex<Duration>,
    pub judged: Mutex<Vec<ContextSnapshot>>,
    pub responded: Mutex<Vec<ContextSnapshot>>,
    pub proactive_calls: AtomicUsize,
    active_judges: AtomicUsize,
    pub max_concurrent_judges: AtomicUsize,
}

impl Default for ScriptedOracle {
    fn default() -> Self {
        Self {
            verdict: Mutex::new(Verdict::silent("just chatter")),
            reply: Mutex::new(ChatReply::new(vec!["hello there".to_string()])),
            proactive: Mutex::new(ProactiveTopic::default()),
            fail_judge: AtomicBool::new(false),
            judge_delay: Mutex::new(Duration::ZERO),
            proactive_delay: Mutex::new(Duration::ZERO),
            judged: Mutex::default(),
            responded: Mutex::default(),
            proactive_calls: AtomicUsize::new(0),
            active_judges: AtomicUsize::new(0),
            max_concurrent_judges: AtomicUsize::new(0),
        }
    }
}

impl ScriptedOracle {
    pub fn judge_count(&self) -> usize {
        self.judged.lock().unwrap().len()
    }

    pub fn respond_count(&self) -> usize {
        self.responded.lock().unwrap().len()
    }

    pub fn set_verdict(&self, verdict: Verdict) {
        *self.verdict.lock().unwrap() = verdict;
    }

    pub fn set_reply(&self, reply: ChatReply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn set_proactive(&self, lines: &[&str]) {
        *self.proactive.lock().unwrap() =
            ProactiveTopic::new(lines.iter().map(|l| l.to_string()).collect());
    }
}

#[async_trait]
impl DecisionOracle for ScriptedOracle {
    async fn judge(&self, context: &ContextSnapshot) -> ParleyResult<Verdict> {
        let active = self.active_judges.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_judges.fetch_max(active, Ordering::SeqCst);

        let delay = *self.judge_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.judged.lock().unwrap().push(context.clone());
        self.active_judges.fetch_sub(1, Ordering::SeqCst);

        if self.fail_judge.load(Ordering::SeqCst) {
            return Err(ParleyError::oracle("model unavailable"));
        }
        Ok(self.verdict.lock().unwrap().clone())
    }

    async fn respond(&self, context: &ContextSnapshot) -> ParleyResult<ChatReply> {
        self.responded.lock().unwrap().push(context.clone());
        Ok(self.reply.lock().unwrap().clone())
    }

    async fn proactive_topic(&self) -> ParleyResult<ProactiveTopic> {
        self.proactive_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.proactive_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(self.proactive.lock().unwrap().clone())
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Sender that keeps every delivered line.
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSender {
    pub fn lines(&self, conversation_id: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == conversation_id)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn total(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl OutboundSender for RecordingSender {
    async fn send(&self, conversation_id: &str, text: &str) -> ParleyResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push((conversation_id.to_string(), text.to_string()));
        Ok(())
    }
}

/// Topic store whose message appends can be switched to fail.
pub struct FlakyStore {
    pub inner: SqliteTopicStore,
    pub fail_appends: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteTopicStore::in_memory().unwrap(),
            fail_appends: AtomicBool::new(false),
        }
    }
}

impl TopicStore for FlakyStore {
    fn create_topic(&self, conversation_id: &str, start_time: DateTime<Utc>) -> ParleyResult<TopicId> {
        self.inner.create_topic(conversation_id, start_time)
    }

    fn append_message(
        &self,
        topic_id: TopicId,
        sender_id: &str,
        text: &str,
        time: DateTime<Utc>,
        display_name: Option<&str>,
    ) -> ParleyResult<()> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(ParleyError::database("database is locked"));
        }
        self.inner
            .append_message(topic_id, sender_id, text, time, display_name)
    }

    fn set_summary(&self, topic_id: TopicId, summary: &str) -> ParleyResult<()> {
        self.inner.set_summary(topic_id, summary)
    }

    fn close_topic(&self, topic_id: TopicId, end_time: DateTime<Utc>) -> ParleyResult<()> {
        self.inner.close_topic(topic_id, end_time)
    }
}

/// An engine wired to in-memory stores and scripted collaborators.
pub struct Harness {
    pub engine: Engine,
    pub store: Arc<SqliteTopicStore>,
    pub audit: Arc<SqliteAuditLog>,
    pub oracle: Arc<ScriptedOracle>,
    pub sender: Arc<RecordingSender>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ParleyConfig) -> Self {
        let store = Arc::new(SqliteTopicStore::in_memory().unwrap());
        let audit = Arc::new(SqliteAuditLog::in_memory().unwrap());
        let oracle = Arc::new(ScriptedOracle::default());
        let sender = Arc::new(RecordingSender::default());
        let clock = Arc::new(ManualClock::new(t0()));

        let parts = EngineParts::new(store.clone(), oracle.clone(), sender.clone(), audit.clone())
            .with_clock(clock.clone());
        Self {
            engine: Engine::new(config, parts),
            store,
            audit,
            oracle,
            sender,
            clock,
        }
    }
}
