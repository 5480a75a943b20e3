//! Chat with a model over stdin, keeping the conversation on disk and its
//! history bounded by summarization.
//!
//! Reads the API key from the `OPENROUTER_KEY` environment variable. Each
//! line read from stdin is one user message; the reply is printed to stdout.
//! Logs go to stderr and are filtered with `RUST_LOG`.
//!
//! # Examples
//!
//! ```sh
//! # Start a new conversation in ./conversations
//! chat-pruner
//!
//! # Resume an existing one
//! chat-pruner --conversation conversation_20250101_120000
//!
//! # Prune earlier, and skip pruning when no summary can be had
//! chat-pruner --trigger-size 10 --limit 4096 --defer-summary
//! ```

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use chat_pruner::agent::{ConversationSession, SessionConfig, SessionContext};
use chat_pruner::context::{PruneTrigger, SummaryFallback};
use chat_pruner::error::SessionError;
use chat_pruner::store::FileStore;
use chat_pruner::{ClientOptions, DEFAULT_MODEL, OPENROUTER_URL, OpenRouterClient};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

/// Chat with a model while keeping the stored history bounded.
///
/// Reads the API key from the OPENROUTER_KEY environment variable.
#[derive(Parser)]
#[command(name = "chat-pruner")]
struct Cli {
    // ── Conversation ───────────────────────────────────────────
    /// Conversation id to resume (a new one is created if omitted)
    #[arg(long)]
    conversation: Option<String>,

    /// Directory holding conversation files
    #[arg(long, default_value = "conversations")]
    dir: PathBuf,

    /// System prompt for new conversations
    #[arg(long)]
    system: Option<String>,

    // ── Model ──────────────────────────────────────────────────
    /// Model to use for replies and summaries
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Chat-completions endpoint
    #[arg(long, default_value = OPENROUTER_URL)]
    endpoint: String,

    /// Maximum tokens per response (0 = provider default)
    #[arg(long, default_value_t = 0)]
    max_tokens: u32,

    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f32>,

    // ── Pruning ────────────────────────────────────────────────
    /// Turn count above which pruning is considered
    #[arg(long, default_value_t = 20)]
    trigger_size: usize,

    /// Stored size in bytes above which pruning happens
    #[arg(long, default_value_t = 250)]
    limit: u64,

    /// Skip pruning when the model cannot summarize, instead of truncating
    #[arg(long)]
    defer_summary: bool,

    // ── Calls ──────────────────────────────────────────────────
    /// Per-call timeout in seconds
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,

    /// Retries for transient failures
    #[arg(long, default_value_t = 0)]
    retries: u32,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

fn build_context(cli: &Cli) -> Result<SessionContext, String> {
    let api_key = std::env::var("OPENROUTER_KEY")
        .map_err(|_| "OPENROUTER_KEY environment variable is not set".to_string())?;

    let timeout = Duration::from_secs(cli.timeout_secs);
    let client = OpenRouterClient::new(
        api_key,
        ClientOptions {
            endpoint: cli.endpoint.clone(),
            model: cli.model.clone(),
            max_tokens: cli.max_tokens,
            temperature: cli.temperature,
            request_timeout: timeout,
        },
    )
    .map_err(|e| e.to_string())?;

    let store = FileStore::new(&cli.dir)
        .map_err(|e| format!("failed to open '{}': {e}", cli.dir.display()))?;

    let mut config = match &cli.system {
        Some(system) => SessionConfig::new(system.as_str()),
        None => SessionConfig::default(),
    }
    .with_trigger(PruneTrigger::new(cli.trigger_size, cli.limit))
    .with_timeout(timeout)
    .with_retries(cli.retries);
    if cli.defer_summary {
        config = config.with_fallback(SummaryFallback::Defer);
    }

    Ok(SessionContext::new(config, Arc::new(client), Arc::new(store)))
}

async fn run(cli: Cli) -> Result<(), String> {
    let ctx = build_context(&cli)?;
    let mut session = ConversationSession::open(ctx, cli.conversation.as_deref());
    info!(
        "conversation {} ({} turns) in {}",
        session.id(),
        session.transcript().len(),
        cli.dir.display()
    );

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout
            .write_all(b"> ")
            .await
            .map_err(|e| format!("failed to write prompt: {e}"))?;
        stdout
            .flush()
            .await
            .map_err(|e| format!("failed to write prompt: {e}"))?;

        let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| format!("failed to read stdin: {e}"))?
        else {
            break;
        };
        if matches!(line.trim(), "exit" | "quit") {
            break;
        }

        match session.submit(&line).await {
            Ok(reply) => {
                stdout
                    .write_all(format!("{reply}\n").as_bytes())
                    .await
                    .map_err(|e| format!("failed to write reply: {e}"))?;
            }
            Err(SessionError::EmptyInput) => continue,
            Err(e) => eprintln!("Error: {e}"),
        }
    }

    println!();
    info!("conversation saved as {}", session.id());
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
