//! Self-pruning chat transcripts for LLM-backed assistants.
//!
//! `chat-pruner` keeps a persisted conversation between a user and a
//! language-model assistant bounded in size. Before each new user turn, the
//! [`PruningPolicy`](context::pruning::PruningPolicy) checks the transcript
//! against a [`PruneTrigger`](context::pruning::PruneTrigger); when the
//! conversation is both long enough and large enough on disk, the oldest half
//! (minus the system turn) is replaced by a single assistant summary turn.
//!
//! The core abstraction is the
//! [`ConversationSession`](agent::session::ConversationSession), which owns
//! one [`Transcript`](transcript::Transcript) and drives the
//! prune → append → generate → persist cycle.
//!
//! # Getting started
//!
//! ```ignore
//! use std::sync::Arc;
//! use chat_pruner::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api_key = std::env::var("OPENROUTER_KEY")?;
//!     let client = OpenRouterClient::new(api_key, ClientOptions::default())?;
//!     let store = FileStore::new("conversations")?;
//!
//!     let context = SessionContext::new(
//!         SessionConfig::default(),
//!         Arc::new(client),
//!         Arc::new(store),
//!     );
//!     let mut session = ConversationSession::open(context, None);
//!
//!     let reply = session.submit("What is a B-tree?").await?;
//!     println!("{reply}");
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Turns and transcripts:** [`Turn`], [`Role`], and
//!   [`Transcript`](transcript::Transcript), which enforces the leading
//!   system turn.
//! - **When and how history is compressed:** [`context::pruning`].
//! - **How summaries are produced:** [`context::summarizer`], including the
//!   deterministic truncation fallback.
//! - **Calling the model:** the [`CompletionGateway`](api::gateway::CompletionGateway)
//!   trait, the bundled [`OpenRouterClient`], and the timeout/retry
//!   [`CallPolicy`](api::gateway::CallPolicy).
//! - **Persistence:** [`TranscriptStore`](store::TranscriptStore) with
//!   [`FileStore`](store::FileStore) and [`MemoryStore`](store::MemoryStore).
//! - **Serving many conversations:** [`SessionHub`](agent::hub::SessionHub)
//!   serializes submits per conversation id.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`agent`] | Session orchestration, the id-keyed hub, config, events |
//! | [`context`] | Pruning policy and summarizer |
//! | [`api`] | Completion gateway trait, call policy, retry with backoff |
//! | [`store`] | Transcript persistence port and its implementations |
//! | [`transcript`] | The ordered turn sequence and its invariants |
//! | [`error`] | Typed errors for each layer |

pub mod agent;
pub mod api;
pub mod context;
pub mod error;
pub mod prelude;
pub mod store;
pub mod transcript;

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::error::GatewayError;

// ── Constants ──────────────────────────────────────────────────────

pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default model for all LLM calls.
pub const DEFAULT_MODEL: &str = "meta-llama/llama-3.3-70b-instruct";

// ── Turn types ─────────────────────────────────────────────────────

/// Role of a turn in the conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One role-tagged message. Content is opaque text and is never re-parsed.
///
/// Serializes as `{"role": "...", "content": "..."}`, which is both the
/// persisted format and the chat-completions wire format.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    role: Role,
    content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body. Optional generation parameters are omitted
/// from serialization when unset.
#[derive(Serialize, Debug)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Turn],
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

// ── Response types ─────────────────────────────────────────────────

/// Raw API response (internal deserialization target).
#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Token usage statistics.
#[derive(Deserialize, Debug, Clone)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

/// Pull the first choice's text out of a raw response body.
///
/// A missing choice list, an empty one, or a choice without text all count
/// as [`GatewayError::EmptyResult`].
pub(crate) fn parse_completion(text: &str) -> Result<String, GatewayError> {
    let parsed: RawChatResponse = serde_json::from_str(text)
        .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

    if let Some(err) = parsed.error {
        return Err(GatewayError::Api(err.message));
    }

    if let Some(ref usage) = parsed.usage {
        debug!(
            "Token usage: prompt={}, completion={}, total={}",
            usage.prompt_tokens.unwrap_or(0),
            usage.completion_tokens.unwrap_or(0),
            usage.total_tokens.unwrap_or(0),
        );
    }

    parsed
        .choices
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(GatewayError::EmptyResult)
}

// ── Client ─────────────────────────────────────────────────────────

/// Settings for [`OpenRouterClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Chat-completions endpoint. Any OpenAI-compatible URL works.
    pub endpoint: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Maximum tokens per response (0 = provider default).
    pub max_tokens: u32,
    /// Sampling temperature (`None` = provider default).
    pub temperature: Option<f32>,
    /// HTTP-level request timeout.
    pub request_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            endpoint: OPENROUTER_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 0,
            temperature: None,
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Async HTTP client for an OpenAI-compatible chat completions API.
pub struct OpenRouterClient {
    pub(crate) client: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) options: ClientOptions,
}

impl OpenRouterClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<String>, options: ClientOptions) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .user_agent("chat-pruner/0.1")
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| GatewayError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            options,
        })
    }

    pub fn model(&self) -> &str {
        &self.options.model
    }

    /// Send the turns as one chat completion request and return the reply text.
    pub async fn chat(&self, turns: &[Turn]) -> Result<String, GatewayError> {
        let body = ChatRequest {
            model: &self.options.model,
            messages: turns,
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
        };
        debug!(
            "LLM request: model={}, messages={}, max_tokens={}",
            body.model,
            turns.len(),
            body.max_tokens,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(&body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(&self.options.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(self.options.request_timeout)
                } else {
                    GatewayError::Network(e.to_string())
                }
            })?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| GatewayError::Network(format!("failed to read response: {e}")))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let content = parse_completion(&text)?;
        debug!("LLM output: {} chars", content.len());
        Ok(content)
    }
}
