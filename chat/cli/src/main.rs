//! Chat CLI - Terminal Client for the Companion Chat Stream
//!
//! Reads lines from stdin and sends each one as a user message; prints the
//! conversation to stdout as it streams in. Input is accepted at any time,
//! including while the connection is down. Connection status and errors go
//! to stderr so stdout stays a clean transcript.
//!
//! # Usage
//!
//! ```bash
//! # Connect to a local backend
//! CHAT_TOKEN=... chat-cli
//!
//! # Another server, keeping a JSONL transcript
//! chat-cli --token ... --base-url https://chat.example.com --transcript chat.jsonl
//!
//! # Verbose logging
//! RUST_LOG=debug chat-cli --token ...
//! ```
//!
//! Type `/quit` (or send EOF) to leave.

mod render;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use chat_core::{
    load_config_from_path, AuthToken, ChatError, ChatSession, ConfigOverrides, ConnectionState,
    HistorySink, JsonlHistory, NoopHistory, SessionNotice, Snapshot, WebSocketConnector,
};

use render::TranscriptRenderer;

/// Chat CLI - talk to the companion over its streaming chat channel
#[derive(Parser, Debug)]
#[command(name = "chat-cli")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Bearer token for the chat stream
    #[arg(short = 't', long, env = "CHAT_TOKEN", hide_env_values = true)]
    token: String,

    /// Configuration file path (defaults to the XDG config location)
    #[arg(short = 'c', long, env = "CHAT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Backend base URL, e.g. http://localhost:8000
    #[arg(short = 'u', long, value_name = "URL")]
    base_url: Option<String>,

    /// Wait for the server greeting before treating the channel as open
    #[arg(long)]
    require_ack: bool,

    /// Maximum number of messages held while disconnected
    #[arg(long, value_name = "N")]
    queue_capacity: Option<usize>,

    /// Append completed messages to this file as JSON lines
    #[arg(long, value_name = "FILE")]
    transcript: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "CHAT_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("chat_cli={level},chat_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// One line of stderr for a session notice; `None` ends the loop
fn describe(notice: &SessionNotice) -> Option<String> {
    match notice {
        SessionNotice::StateChanged(ConnectionState::Closed) => None,
        SessionNotice::StateChanged(state) => Some(format!("[{state}]")),
        SessionNotice::SendFailed { text, reason } => {
            Some(format!("[not delivered: {text:?} ({reason})]"))
        }
        SessionNotice::ServerError(message) => Some(format!("[server error: {message}]")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config_path = args.config.clone().or_else(chat_core::default_config_path);
    let mut config = load_config_from_path(config_path).context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(url) = args.base_url.clone() {
        overrides = overrides.with_base_url(url);
    }
    if args.require_ack {
        overrides = overrides.with_require_ack(true);
    }
    if let Some(capacity) = args.queue_capacity {
        overrides = overrides.with_queue_capacity(capacity);
    }
    overrides
        .apply(&mut config)
        .context("Invalid command-line override")?;

    let endpoint = config.endpoint().context("Invalid chat endpoint")?;
    info!(endpoint = %endpoint, source = %config.source(), "Configuration resolved");

    let history: Arc<dyn HistorySink> = match args.transcript {
        Some(path) => Arc::new(JsonlHistory::new(path)),
        None => Arc::new(NoopHistory),
    };

    let session = ChatSession::with_history(
        config.connection.clone(),
        Arc::new(WebSocketConnector::new()),
        AuthToken::new(args.token),
        history,
    );

    let (snapshots_tx, mut snapshots) = mpsc::unbounded_channel::<Snapshot>();
    session.subscribe(move |snapshot| {
        let _ = snapshots_tx.send(snapshot.clone());
    });
    let mut notices = session.notices();

    session.open(endpoint)?;

    let mut renderer = TranscriptRenderer::default();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            Some(snapshot) = snapshots.recv() => {
                let text = renderer.render(&snapshot);
                if !text.is_empty() {
                    stdout.write_all(text.as_bytes()).await?;
                    stdout.flush().await?;
                }
            }
            notice = notices.recv() => match notice {
                Ok(notice) => match describe(&notice) {
                    Some(line) => eprintln!("{line}"),
                    None => break,
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Status notices dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "/quit" {
                    break;
                }
                match session.send(line) {
                    Ok(()) => {}
                    Err(ChatError::Backpressure { capacity }) => {
                        eprintln!("[offline queue full ({capacity}); message not sent]");
                    }
                    Err(e) => eprintln!("[{e}]"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.close();
    info!("Chat session closed");
    Ok(())
}
