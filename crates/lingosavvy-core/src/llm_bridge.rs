//! LLM Bridge — single-shot completion calls to the generative text service.
//! One request per analysis: no streaming, no tools, no retry. reqwest only.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-pro";
pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const OPENROUTER_DEFAULT_MODEL: &str = "openai/gpt-3.5-turbo";

/// The generative call failed before any text came back.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("no API key configured for {0}")]
    MissingApiKey(&'static str),
    #[error("{provider} request: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("{provider} response envelope: {detail}")]
    Envelope { provider: &'static str, detail: String },
    #[error("{0} returned no text")]
    EmptyResponse(&'static str),
}

/// A plain prompt-in, text-out completion service.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    /// Provider name for logs.
    fn provider(&self) -> &'static str;

    /// Submits `prompt` and returns the model's raw text.
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError>;
}

// ---------------------------------------------------------------------------
// Gemini (generateContent)
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContentOut<'a>>,
}

#[derive(Serialize)]
struct GeminiContentOut<'a> {
    parts: Vec<GeminiPartOut<'a>>,
}

#[derive(Serialize)]
struct GeminiPartOut<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

/// Google Generative Language client.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    /// Point at a different endpoint root (proxies, local fakes).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

/// Concatenates the text parts of the first candidate.
fn gemini_text(body: &str) -> Result<String, UpstreamError> {
    const PROVIDER: &str = "gemini";
    let parsed: GeminiResponse = serde_json::from_str(body).map_err(|e| UpstreamError::Envelope {
        provider: PROVIDER,
        detail: e.to_string(),
    })?;
    let text: String = parsed
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content)
        .and_then(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.text)
        .collect();
    if text.trim().is_empty() {
        return Err(UpstreamError::EmptyResponse(PROVIDER));
    }
    Ok(text)
}

#[async_trait]
impl GenerativeClient for GeminiClient {
    fn provider(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        let provider = self.provider();
        if self.api_key.trim().is_empty() {
            return Err(UpstreamError::MissingApiKey(provider));
        }
        let body = GeminiRequest {
            contents: vec![GeminiContentOut {
                parts: vec![GeminiPartOut { text: prompt }],
            }],
        };

        let res = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|source| UpstreamError::Transport { provider, source })?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|source| UpstreamError::Transport { provider, source })?;
        if !status.is_success() {
            return Err(UpstreamError::Status {
                provider,
                status: status.as_u16(),
                body: text,
            });
        }
        gemini_text(&text)
    }
}

// ---------------------------------------------------------------------------
// OpenRouter (chat completions)
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenRouterRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OpenRouterResponse {
    choices: Option<Vec<OpenRouterChoice>>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterChoice {
    message: Option<OpenRouterMessage>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterMessage {
    content: Option<String>,
}

/// OpenRouter chat-completions client. The prompt goes in as one user message.
#[derive(Clone)]
pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    url: String,
}

impl OpenRouterClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            url: OPENROUTER_URL.to_string(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

fn openrouter_text(body: &str) -> Result<String, UpstreamError> {
    const PROVIDER: &str = "openrouter";
    let parsed: OpenRouterResponse = serde_json::from_str(body).map_err(|e| UpstreamError::Envelope {
        provider: PROVIDER,
        detail: e.to_string(),
    })?;
    parsed
        .choices
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .filter(|s| !s.trim().is_empty())
        .ok_or(UpstreamError::EmptyResponse(PROVIDER))
}

#[async_trait]
impl GenerativeClient for OpenRouterClient {
    fn provider(&self) -> &'static str {
        "openrouter"
    }

    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        let provider = self.provider();
        if self.api_key.trim().is_empty() {
            return Err(UpstreamError::MissingApiKey(provider));
        }
        let body = OpenRouterRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
        };

        let res = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|source| UpstreamError::Transport { provider, source })?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|source| UpstreamError::Transport { provider, source })?;
        if !status.is_success() {
            return Err(UpstreamError::Status {
                provider,
                status: status.as_u16(),
                body: text,
            });
        }
        openrouter_text(&text)
    }
}
