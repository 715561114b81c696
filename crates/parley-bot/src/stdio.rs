//! JSON-lines transport over stdin/stdout.
//!
//! Each inbound line is an [`InboundMessage`]; each outbound line is
//! `{"conversation_id": ..., "text": ...}`.

use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use parley_core::{Engine, InboundMessage, OutboundSender, ParleyError, ParleyResult};

#[derive(Serialize)]
struct OutboundLine<'a> {
    conversation_id: &'a str,
    text: &'a str,
}

/// [`OutboundSender`] that writes one JSON object per line.
pub struct JsonLinesSender<W> {
    writer: Mutex<W>,
}

impl<W> JsonLinesSender<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl JsonLinesSender<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

#[async_trait]
impl<W> OutboundSender for JsonLinesSender<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&self, conversation_id: &str, text: &str) -> ParleyResult<()> {
        let mut line = serde_json::to_vec(&OutboundLine {
            conversation_id,
            text,
        })?;
        line.push(b'\n');

        // Lines from concurrent conversations must not interleave.
        let mut writer = self.writer.lock().await;
        writer
            .write_all(&line)
            .await
            .map_err(|e| ParleyError::send(conversation_id, e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| ParleyError::send(conversation_id, e.to_string()))
    }
}

/// Counters for one [`pump_inbound`] run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PumpStats {
    pub accepted: usize,
    pub malformed: usize,
    pub rejected: usize,
}

/// Parse one inbound line. Blank lines yield `None`.
pub fn parse_inbound(line: &str) -> Option<ParleyResult<InboundMessage>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(serde_json::from_str(line).map_err(ParleyError::from))
}

/// Feed every line of `reader` into the engine until EOF.
///
/// Malformed lines and rejected messages are logged and skipped.
pub async fn pump_inbound<R>(engine: &Engine, reader: R) -> ParleyResult<PumpStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = PumpStats::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let message = match parse_inbound(&line) {
            None => continue,
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                warn!(error = %e, "Skipping malformed inbound line");
                stats.malformed += 1;
                continue;
            }
        };

        let conversation_id = message.conversation_id.clone();
        match engine.handle_message(message).await {
            Ok(snapshot) => {
                debug!(
                    conversation_id = %conversation_id,
                    mentioned = snapshot.is_at_mentioned,
                    "Accepted message"
                );
                stats.accepted += 1;
            }
            Err(e) => {
                warn!(conversation_id = %conversation_id, error = %e, "Engine rejected message");
                stats.rejected += 1;
            }
        }
    }

    Ok(stats)
}

/// Pump `reader` into the engine, then keep the engine running until
/// `shutdown` resolves.
///
/// Input closing does not stop the engine: armed decisions and the
/// inactivity sweeper keep running until shutdown is requested.
pub async fn run<R, S>(engine: &Engine, reader: R, shutdown: S) -> ParleyResult<()>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    tokio::select! {
        result = pump_inbound(engine, reader) => {
            let stats = result?;
            info!(
                accepted = stats.accepted,
                malformed = stats.malformed,
                rejected = stats.rejected,
                "Input closed, running until shutdown"
            );
        }
        _ = &mut shutdown => {
            info!("Shutdown requested before input closed");
            return Ok(());
        }
    }

    shutdown.await;
    Ok(())
}
