//! Chat-completion summarization for announcements.
//!
//! Condenses a ticket into one spoken sentence. Never fails: every error
//! is logged in full and answered with a themed fallback line so the
//! pipeline always has something to speak.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use super::prompt::PromptSpec;
use crate::config::SummarizerConfig;

// ---------------------------------------------------------------------------
// Fallback lines
// ---------------------------------------------------------------------------

/// Why the model's words were replaced by a fixed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    VoidInput,
    ModelUnavailable,
    ModelError,
}

impl Fallback {
    pub fn key(self) -> &'static str {
        match self {
            Fallback::VoidInput => "void-input",
            Fallback::ModelUnavailable => "model-unavailable",
            Fallback::ModelError => "model-error",
        }
    }

    pub fn announcement(self) -> &'static str {
        match self {
            Fallback::VoidInput => "ShadowDesk senses a void... an empty request arrived.",
            Fallback::ModelUnavailable => "ShadowDesk calls into the dark, but no oracle answers.",
            Fallback::ModelError => "ShadowDesk falters, unable to conjure the words.",
        }
    }
}

// ---------------------------------------------------------------------------
// SummarizeError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("no API key configured for the summarization service")]
    MissingCredential,

    #[error("cannot reach summarization service: {0}")]
    Connect(String),

    #[error("summarization service rejected the request ({status}): {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("summarization service returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("summarization request timed out")]
    Timeout,

    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("failed to parse completion: {0}")]
    Parse(String),

    #[error("model returned an empty completion")]
    EmptyResponse,
}

impl SummarizeError {
    /// Misconfiguration and unreachable services read as "unavailable";
    /// everything else is a service error.
    pub fn fallback(&self) -> Fallback {
        match self {
            SummarizeError::MissingCredential
            | SummarizeError::Connect(_)
            | SummarizeError::Rejected { .. } => Fallback::ModelUnavailable,
            SummarizeError::Status { .. }
            | SummarizeError::Timeout
            | SummarizeError::Request(_)
            | SummarizeError::Parse(_)
            | SummarizeError::EmptyResponse => Fallback::ModelError,
        }
    }
}

impl From<reqwest::Error> for SummarizeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SummarizeError::Timeout
        } else if e.is_connect() {
            SummarizeError::Connect(e.to_string())
        } else if e.is_decode() {
            SummarizeError::Parse(e.to_string())
        } else {
            SummarizeError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// CompletionClient
// ---------------------------------------------------------------------------

/// One chat-completion round trip: system + user message in, text out.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &PromptSpec) -> Result<String, SummarizeError>;
}

/// Calls an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct ChatCompletionClient {
    client: Client,
    config: SummarizerConfig,
}

impl ChatCompletionClient {
    pub fn new(config: SummarizerConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client with timeout: {e}");
                Client::new()
            });

        Self { client, config }
    }
}

#[async_trait]
impl CompletionClient for ChatCompletionClient {
    async fn complete(&self, prompt: &PromptSpec) -> Result<String, SummarizeError> {
        let key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(SummarizeError::MissingCredential)?;

        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": prompt.system_instruction },
                { "role": "user",   "content": prompt.user_content }
            ],
            "temperature": self.config.temperature
        });

        let url = format!("{}/v1/chat/completions", self.config.base_url.trim_end_matches('/'));
        let resp = self.client.post(&url).bearer_auth(key).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                    SummarizeError::Rejected { status, body }
                }
                _ => SummarizeError::Status { status, body },
            });
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| SummarizeError::Parse(e.to_string()))?;

        let text = data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| SummarizeError::Parse("missing choices[0].message.content".into()))?
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(SummarizeError::EmptyResponse);
        }
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Summarizer
// ---------------------------------------------------------------------------

/// Wraps a [`CompletionClient`] and never returns an error.
pub struct Summarizer {
    client: Box<dyn CompletionClient>,
}

impl Summarizer {
    pub fn new(client: impl CompletionClient + 'static) -> Self {
        Self {
            client: Box::new(client),
        }
    }

    /// Produce the announcement for `prompt`, or a themed fallback line.
    pub async fn summarize(&self, prompt: &PromptSpec) -> String {
        let t_start = Instant::now();

        match self.client.complete(prompt).await {
            Ok(text) => {
                let latency_ms = t_start.elapsed().as_secs_f64() * 1000.0;
                info!(
                    "Summarized {} chars with {} ({latency_ms:.0}ms): {text}",
                    prompt.user_content.len(),
                    prompt.template_version,
                );
                text
            }
            Err(e) => {
                let fallback = e.fallback();
                warn!("Summarization failed ({}): {e}", fallback.key());
                fallback.announcement().to_string()
            }
        }
    }
}
