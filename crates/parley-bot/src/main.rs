//! parley-bot - JSON-lines chat bot binary.

use std::sync::Arc;

use parley_bot::{run, JsonLinesSender};
use parley_core::{Engine, EngineParts, ParleyConfig, SqliteAuditLog, SqliteTopicStore};
use parley_llm::LlmOracle;
use tokio::io::BufReader;
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Config file from the first argument or `PARLEY_CONFIG`, then env overrides.
fn load_config() -> Result<ParleyConfig, Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PARLEY_CONFIG").ok());
    let config = match path {
        Some(path) => {
            info!(path = %path, "Loading config file");
            ParleyConfig::from_file(path)?.with_env_overrides()
        }
        None => ParleyConfig::from_env(),
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Stdout carries bot messages, so logs go to stderr
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive(Level::INFO.into())
                .add_directive("parley_bot=debug".parse().unwrap()),
        )
        .init();

    let config = load_config()?;

    let store = Arc::new(SqliteTopicStore::new(&config.storage.database_path)?);
    let audit = Arc::new(SqliteAuditLog::new(&config.storage.database_path)?);
    let oracle = Arc::new(LlmOracle::from_config(&config)?);
    let sender = Arc::new(JsonLinesSender::stdout());

    info!(
        bot = %config.bot.name,
        database = %config.storage.database_path.display(),
        judge_model = %config.llm.judge.model,
        chat_model = %config.llm.chat.model,
        "Starting parley-bot"
    );
    let engine = Engine::new(config, EngineParts::new(store, oracle, sender, audit));
    engine.start().await?;

    let stdin = BufReader::new(tokio::io::stdin());
    match run(&engine, stdin, shutdown_signal()).await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!(error = %e, "Failed reading input"),
    }

    engine.shutdown().await?;
    if engine.pending_writes() > 0 {
        info!(pending = engine.pending_writes(), "Exiting with unreplayed writes");
    }

    info!("Bot stopped cleanly");
    Ok(())
}
