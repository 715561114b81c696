//! parley-bot - stdio adapter for the parley engine.
//!
//! Reads [`parley_core::InboundMessage`] JSON lines from stdin and writes bot
//! messages as JSON lines to stdout. Logs go to stderr. The bot keeps
//! running after stdin closes until it receives Ctrl+C or SIGTERM.
//!
//! # Example
//!
//! ```text
//! $ echo '{"conversation_id":"g","sender_id":"u1","text":"hi","mentioned":true}' | parley-bot parley.toml
//! {"conversation_id":"g","text":"hey!"}
//! ```

pub mod stdio;

pub use stdio::{parse_inbound, pump_inbound, run, JsonLinesSender, PumpStats};
