//! Configuration system for parley.
//!
//! Configuration is read from a TOML, JSON or YAML file, overlaid with
//! `PARLEY_*` environment variables, then validated.

use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ParleyError, ParleyResult};
use crate::traits::LlmConfig;

/// Upper bound for minute-based windows (one year).
pub const MAX_WINDOW_MINUTES: u64 = 60 * 24 * 365;

/// Minutes as a chrono duration, saturating at [`MAX_WINDOW_MINUTES`].
fn window(minutes: u64) -> ChronoDuration {
    ChronoDuration::minutes(minutes.min(MAX_WINDOW_MINUTES) as i64)
}

/// Bot identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Human-readable bot name.
    pub name: String,
    /// Sender id used when the bot's own messages are appended to a topic.
    pub sender_id: String,
    /// Persona descriptor copied into every context snapshot.
    pub persona: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "parley".to_string(),
            sender_id: "bot".to_string(),
            persona: "A friendly regular of the group who chimes in when it has something to add."
                .to_string(),
        }
    }
}

/// Topic segmentation and debounce settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    /// Silence after which the next message opens a new topic (default: 10).
    pub topic_gap_minutes: u64,
    /// Quiet period before the judge is consulted (default: 3.0).
    pub debounce_seconds: f64,
    /// Messages included in a context snapshot (default: 10).
    pub max_recent_messages: usize,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            topic_gap_minutes: 10,
            debounce_seconds: 3.0,
            max_recent_messages: 10,
        }
    }
}

impl TopicConfig {
    /// Topic gap as a chrono duration.
    pub fn topic_gap(&self) -> ChronoDuration {
        window(self.topic_gap_minutes)
    }

    /// Debounce delay.
    pub fn debounce(&self) -> Duration {
        let max = (MAX_WINDOW_MINUTES * 60) as f64;
        Duration::try_from_secs_f64(self.debounce_seconds.clamp(0.0, max)).unwrap_or(Duration::ZERO)
    }
}

/// Inactivity sweeper settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    /// Whether the sweeper runs at all (default: true).
    pub enabled: bool,
    /// Seconds between sweeps (default: 60).
    pub interval_seconds: u64,
    /// Idle minutes before a proactive message is attempted (default: 15).
    pub inactivity_minutes: u64,
    /// Delay between consecutive proactive messages (default: 1000).
    pub message_delay_ms: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 60,
            inactivity_minutes: 15,
            message_delay_ms: 1000,
        }
    }
}

impl SweeperConfig {
    /// Sweep interval.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// Idle threshold as a chrono duration.
    pub fn inactivity_threshold(&self) -> ChronoDuration {
        window(self.inactivity_minutes)
    }

    /// Delay between proactive messages.
    pub fn message_delay(&self) -> Duration {
        Duration::from_millis(self.message_delay_ms)
    }
}

/// Simulated typing delay applied before each reply line.
///
/// Delay = uniform(`min_delay_ms`, `max_delay_ms`) + `per_char_ms` * chars.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub per_char_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 300,
            max_delay_ms: 1200,
            per_char_ms: 50,
        }
    }
}

impl PacingConfig {
    /// No delay at all; useful for tests and replays.
    pub fn instant() -> Self {
        Self {
            min_delay_ms: 0,
            max_delay_ms: 0,
            per_char_ms: 0,
        }
    }
}

/// Models used by the LLM oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// Small model that judges whether to speak.
    pub judge: LlmConfig,
    /// Larger model that writes replies and proactive topics.
    pub chat: LlmConfig,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            judge: LlmConfig {
                temperature: 0.2,
                ..LlmConfig::for_model("gpt-4o-mini")
            },
            chat: LlmConfig::for_model("gpt-4o"),
        }
    }
}

/// System prompts for the three oracle calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub judge_system: String,
    pub chat_system: String,
    pub proactive_system: String,
    /// User turn sent with the proactive prompt.
    pub proactive_kickoff: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            judge_system: "You watch a group chat as the persona described in the input. \
Decide whether the persona should join the conversation now. \
Answer with a JSON object: {\"should_intervene\": bool, \"trigger_level\": \"low\"|\"medium\"|\"high\", \
\"reason\": string, \"has_significant_info\": bool}. \
Set has_significant_info when the messages reveal something about a member worth remembering."
                .to_string(),
            chat_system: "You are the persona described in the input, chatting in a group. \
Reply naturally and briefly, split into short chat lines. \
Answer with a JSON object: {\"messages\": [string], \"summary\": string}. \
When should_return_summary is true, summary is a one-sentence summary of the current topic."
                .to_string(),
            proactive_system: "You are the persona of a group chat that has gone quiet. \
Start a light new topic in one to three short lines. \
Answer with a JSON object: {\"messages\": [string]}."
                .to_string(),
            proactive_kickoff: "The group has been quiet for a while. Say something.".to_string(),
        }
    }
}

/// Retry policy for store writes that failed during ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Initial delay before first retry (milliseconds).
    pub initial_delay_ms: u64,
    /// Maximum delay between retries (milliseconds).
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff.
    pub multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database holding topics, messages and decision logs.
    pub database_path: PathBuf,
    /// Retry policy for deferred writes.
    pub retry: RetryPolicy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let parley_dir = dirs::home_dir()
            .map(|h| h.join(".parley"))
            .unwrap_or_else(|| PathBuf::from(".parley"));

        Self {
            database_path: parley_dir.join("parley.db"),
            retry: RetryPolicy::default(),
        }
    }
}

/// Main parley configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParleyConfig {
    pub bot: BotConfig,
    pub topic: TopicConfig,
    pub sweeper: SweeperConfig,
    pub pacing: PacingConfig,
    pub llm: LlmSection,
    pub prompts: PromptConfig,
    pub storage: StorageConfig,
}

impl ParleyConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> ParleyResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| ParleyError::Configuration(e.to_string()))
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| ParleyError::Configuration(e.to_string())),
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| ParleyError::Configuration(e.to_string())),
            _ => Err(ParleyError::Configuration(
                "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
            )),
        }
    }

    /// Load configuration from environment variables on top of the defaults.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Overlay environment variables on this configuration.
    ///
    /// Reads:
    /// - `PARLEY_BOT_NAME`, `PARLEY_BOT_SENDER_ID`, `PARLEY_PERSONA`
    /// - `PARLEY_TOPIC_GAP_MINUTES`, `PARLEY_DEBOUNCE_SECONDS`, `PARLEY_MAX_RECENT_MESSAGES`
    /// - `PARLEY_SWEEP_INTERVAL_SECONDS`, `PARLEY_INACTIVITY_MINUTES`, `PARLEY_DISABLE_SWEEPER`
    /// - `PARLEY_JUDGE_MODEL`, `PARLEY_CHAT_MODEL`, `PARLEY_LLM_BASE_URL`, `OPENAI_API_KEY`
    /// - `PARLEY_DB_PATH`
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(name) = std::env::var("PARLEY_BOT_NAME") {
            self.bot.name = name;
        }
        if let Ok(id) = std::env::var("PARLEY_BOT_SENDER_ID") {
            self.bot.sender_id = id;
        }
        if let Ok(persona) = std::env::var("PARLEY_PERSONA") {
            self.bot.persona = persona;
        }

        if let Some(minutes) = env_parse("PARLEY_TOPIC_GAP_MINUTES") {
            self.topic.topic_gap_minutes = minutes;
        }
        if let Some(seconds) = env_parse("PARLEY_DEBOUNCE_SECONDS") {
            self.topic.debounce_seconds = seconds;
        }
        if let Some(max) = env_parse("PARLEY_MAX_RECENT_MESSAGES") {
            self.topic.max_recent_messages = max;
        }

        if let Some(seconds) = env_parse("PARLEY_SWEEP_INTERVAL_SECONDS") {
            self.sweeper.interval_seconds = seconds;
        }
        if let Some(minutes) = env_parse("PARLEY_INACTIVITY_MINUTES") {
            self.sweeper.inactivity_minutes = minutes;
        }
        if std::env::var("PARLEY_DISABLE_SWEEPER").is_ok() {
            self.sweeper.enabled = false;
        }

        if let Ok(model) = std::env::var("PARLEY_JUDGE_MODEL") {
            self.llm.judge.model = model;
        }
        if let Ok(model) = std::env::var("PARLEY_CHAT_MODEL") {
            self.llm.chat.model = model;
        }
        if let Ok(base_url) = std::env::var("PARLEY_LLM_BASE_URL") {
            self.llm.judge.base_url = Some(base_url.clone());
            self.llm.chat.base_url = Some(base_url);
        }
        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            self.llm.judge.api_key.get_or_insert_with(|| api_key.clone());
            self.llm.chat.api_key.get_or_insert(api_key);
        }

        if let Ok(path) = std::env::var("PARLEY_DB_PATH") {
            self.storage.database_path = PathBuf::from(path);
        }

        self
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> ParleyResult<()> {
        if self.topic.topic_gap_minutes == 0 {
            return Err(ParleyError::validation_with_suggestion(
                "topic.topic_gap_minutes must be positive",
                "Use 10 for the usual ten-minute topic gap",
            ));
        }
        if self.topic.topic_gap_minutes > MAX_WINDOW_MINUTES {
            return Err(ParleyError::validation(format!(
                "topic.topic_gap_minutes must be at most {}",
                MAX_WINDOW_MINUTES
            )));
        }
        let debounce = self.topic.debounce_seconds;
        if !debounce.is_finite() || debounce < 0.0 || debounce > (MAX_WINDOW_MINUTES * 60) as f64 {
            return Err(ParleyError::validation(
                "topic.debounce_seconds must be a non-negative number of at most one year",
            ));
        }
        if self.topic.max_recent_messages == 0 {
            return Err(ParleyError::validation(
                "topic.max_recent_messages must be at least 1",
            ));
        }
        if self.sweeper.interval_seconds == 0 {
            return Err(ParleyError::validation(
                "sweeper.interval_seconds must be positive",
            ));
        }
        if self.sweeper.inactivity_minutes > MAX_WINDOW_MINUTES {
            return Err(ParleyError::validation(format!(
                "sweeper.inactivity_minutes must be at most {}",
                MAX_WINDOW_MINUTES
            )));
        }
        if self.pacing.min_delay_ms > self.pacing.max_delay_ms {
            return Err(ParleyError::validation(
                "pacing.min_delay_ms must not exceed pacing.max_delay_ms",
            ));
        }
        if self.bot.sender_id.is_empty() {
            return Err(ParleyError::validation("bot.sender_id must not be empty"));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
