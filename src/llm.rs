//! Generative language backend
//!
//! `LanguageBackend` is the capability the metadata extractor needs:
//! `complete(prompt) -> text`, plus token usage when the backend reports it.
//! `OpenAiBackend` talks to any OpenAI-compatible chat completions endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::retry::{with_retry, RetryPolicy, Transient};
use crate::settings::{LlmSettings, Settings};
use crate::utils::safe_truncate;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("language backend request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("language backend error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("language backend timed out after {0:?}")]
    Timeout(Duration),
    #[error("language backend returned no content")]
    EmptyResponse,
    #[error("no API key configured (set OPENAI_API_KEY or llm.api_key)")]
    MissingApiKey,
}

impl Transient for LlmError {
    fn is_transient(&self) -> bool {
        match self {
            LlmError::Request(e) => !e.is_builder() && !e.is_decode(),
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            LlmError::Timeout(_) => true,
            LlmError::EmptyResponse | LlmError::MissingApiKey => false,
        }
    }

    fn timed_out(after: Duration) -> Self {
        LlmError::Timeout(after)
    }
}

/// System + user message pair
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    /// Estimated USD cost at the configured per-1000-token prices
    pub fn cost(&self, llm: &LlmSettings) -> f64 {
        self.prompt_tokens as f64 * llm.prompt_cost_per_1k / 1000.0
            + self.completion_tokens as f64 * llm.completion_cost_per_1k / 1000.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

#[async_trait]
pub trait LanguageBackend: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<Completion, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat completions client
pub struct OpenAiBackend {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    api_key: String,
    policy: RetryPolicy,
}

impl OpenAiBackend {
    pub fn new(settings: &Settings) -> Result<Self, LlmError> {
        let llm = &settings.llm;
        let api_key = llm.resolved_api_key().ok_or(LlmError::MissingApiKey)?;
        let timeout = Duration::from_secs(llm.timeout_secs);
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", llm.base_url.trim_end_matches('/')),
            model: llm.model.clone(),
            temperature: llm.temperature,
            api_key,
            policy: RetryPolicy::from_settings(settings).with_timeout(timeout),
        })
    }

    async fn complete_once(&self, prompt: &Prompt) -> Result<Completion, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: &prompt.system },
                ChatMessage { role: "user", content: &prompt.user },
            ],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, body: safe_truncate(&body, 500).to_string() });
        }

        let api_response: ChatResponse = response.json().await?;
        let text = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        Ok(Completion { text, usage: api_response.usage })
    }
}

#[async_trait]
impl LanguageBackend for OpenAiBackend {
    async fn complete(&self, prompt: &Prompt) -> Result<Completion, LlmError> {
        with_retry(&self.policy, "chat completion", move || self.complete_once(prompt)).await
    }
}
