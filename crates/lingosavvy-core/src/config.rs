//! Gateway configuration.
//!
//! Precedence: environment (`LINGO__*`) > TOML file (`LINGO_CONFIG`, default
//! `config/gateway.toml`) > built-in defaults.
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | host | 127.0.0.1 | Bind address. |
//! | port | 4000 | HTTP port. |
//! | llm_provider | gemini | `gemini` or `openrouter`. |
//! | llm_model | provider default | Model id passed to the provider. |
//! | llm_api_key | unset | Falls back to GEMINI_API_KEY / OPENROUTER_API_KEY. |
//! | history_enabled | true | Record analyses for authenticated callers. |
//! | history_path | ./data/history | Sled directory. |
//! | auth_tokens | empty | Array of `{ token, username }` tables. |
//! | cors_origins | localhost:3000, localhost:5173 | Allowed browser origins. |

use crate::history::HISTORY_DEFAULT_PATH;
use crate::llm_bridge::{
    GeminiClient, GenerativeClient, OpenRouterClient, GEMINI_DEFAULT_MODEL, OPENROUTER_DEFAULT_MODEL,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

const DEFAULT_CONFIG_PATH: &str = "config/gateway";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Gemini,
    OpenRouter,
}

impl LlmProvider {
    fn default_model(self) -> &'static str {
        match self {
            LlmProvider::Gemini => GEMINI_DEFAULT_MODEL,
            LlmProvider::OpenRouter => OPENROUTER_DEFAULT_MODEL,
        }
    }

    fn key_env(self) -> &'static str {
        match self {
            LlmProvider::Gemini => "GEMINI_API_KEY",
            LlmProvider::OpenRouter => "OPENROUTER_API_KEY",
        }
    }
}

/// One bearer token issued to a user. Kept as an array entry rather than a
/// map key so tokens are never case-folded by the config loader.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenEntry {
    pub token: String,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub llm_provider: LlmProvider,
    #[serde(default)]
    pub llm_model: Option<String>,
    #[serde(default)]
    pub llm_api_key: Option<String>,
    pub history_enabled: bool,
    pub history_path: String,
    #[serde(default)]
    pub auth_tokens: Vec<TokenEntry>,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl GatewayConfig {
    /// Load from `LINGO_CONFIG` (or `config/gateway`) and the environment.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        let config_path = std::env::var("LINGO_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&config_path))
    }

    /// Load with an explicit file path; a missing file is not an error.
    pub fn load_from(path: &Path) -> Result<Self, ::config::ConfigError> {
        let builder = ::config::Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 4000_i64)?
            .set_default("llm_provider", "gemini")?
            .set_default("history_enabled", true)?
            .set_default("history_path", HISTORY_DEFAULT_PATH)?
            .set_default(
                "cors_origins",
                vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            )?
            .add_source(::config::File::from(path).required(false))
            .add_source(::config::Environment::with_prefix("LINGO").separator("__"));

        builder.build()?.try_deserialize()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn model(&self) -> String {
        self.llm_model
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.llm_provider.default_model().to_string())
    }

    /// Configured key, falling back to the provider's conventional env var.
    pub fn api_key(&self) -> Option<String> {
        self.llm_api_key
            .clone()
            .or_else(|| std::env::var(self.llm_provider.key_env()).ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Token -> username map for [`crate::identity::TokenRegistry`].
    pub fn token_map(&self) -> HashMap<String, String> {
        self.auth_tokens
            .iter()
            .map(|e| (e.token.clone(), e.username.clone()))
            .collect()
    }

    /// Client for the configured provider. A missing key surfaces on first call.
    pub fn generative_client(&self) -> Arc<dyn GenerativeClient> {
        let key = self.api_key().unwrap_or_default();
        match self.llm_provider {
            LlmProvider::Gemini => Arc::new(GeminiClient::new(key, self.model())),
            LlmProvider::OpenRouter => Arc::new(OpenRouterClient::new(key, self.model())),
        }
    }
}
