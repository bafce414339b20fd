//! Category oracle: the external generator that invents categories and
//! renders slow-path membership judgements.
//!
//! Providers are fallible and latent; `CategoryOracle` wraps them so that
//! callers never see a failure. Category requests retry with exponential
//! backoff and fall back to a fixed local table on exhaustion; membership
//! judgements fail closed (an unreachable oracle never awards points).

mod ollama;
mod openai;

use crate::types::Category;
use async_trait::async_trait;
use rand::prelude::*;
use serde::Deserialize;
use std::time::Duration;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

pub type OracleResult<T> = Result<T, OracleError>;

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Response parsing failed: {0}")]
    ParseError(String),
}

/// Trait that all oracle providers must implement
#[async_trait]
pub trait OracleProvider: Send + Sync {
    /// Invent a category (name + example answers) for the given level.
    async fn generate_category(&self, level: u32, timeout: Duration) -> OracleResult<Category>;

    /// Judge whether `word` is a valid member of the named category.
    async fn validate_word(
        &self,
        category: &str,
        word: &str,
        timeout: Duration,
    ) -> OracleResult<bool>;

    /// Get the name of this provider
    fn name(&self) -> &str;
}

/// Colors cycled through generated categories (display tokens only).
const CATEGORY_COLORS: &[&str] = &[
    "#00f3ff", "#ff003c", "#facc15", "#a855f7", "#22c55e", "#ff8a00",
];

/// Local fallback table used when every oracle attempt fails.
const CLASSIC_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "FRUITS",
        &["apple", "banana", "orange", "mango", "grape", "watermelon", "cherry"],
    ),
    (
        "ANIMALS",
        &["lion", "tiger", "elephant", "dog", "cat", "zebra", "monkey"],
    ),
    (
        "COLORS",
        &["red", "blue", "green", "yellow", "pink", "purple", "white"],
    ),
    (
        "COUNTRIES",
        &["india", "usa", "japan", "france", "brazil", "canada", "germany"],
    ),
];

/// Deterministic-contract fallback pick (random entry from the fixed table).
pub fn fallback_category() -> Category {
    let mut rng = rand::rng();
    let (name, examples) = CLASSIC_CATEGORIES[rng.random_range(0..CLASSIC_CATEGORIES.len())];
    Category::new(name, examples.iter().copied(), "#00f3ff")
}

pub fn random_color() -> String {
    let mut rng = rand::rng();
    CATEGORY_COLORS[rng.random_range(0..CATEGORY_COLORS.len())].to_string()
}

/// Expected shape of a provider's category reply.
#[derive(Debug, Deserialize)]
struct CategoryReply {
    category: String,
    #[serde(default)]
    examples: Vec<String>,
}

/// Parse a category generation reply, tolerating markdown fences.
pub(crate) fn parse_category_reply(raw: &str) -> OracleResult<Category> {
    let cleaned = raw.replace("```json", "").replace("```", "");
    let reply: CategoryReply = serde_json::from_str(cleaned.trim())
        .map_err(|e| OracleError::ParseError(e.to_string()))?;
    if reply.category.trim().is_empty() {
        return Err(OracleError::ParseError("empty category name".to_string()));
    }
    Ok(Category::new(&reply.category, reply.examples, &random_color()))
}

/// Parse a YES/NO membership judgement.
pub(crate) fn parse_judgement(raw: &str) -> bool {
    raw.to_uppercase().contains("YES")
}

/// Wrapper giving the round machine an infallible category source.
pub struct CategoryOracle {
    provider: Option<Box<dyn OracleProvider>>,
    timeout: Duration,
    retries: u32,
    backoff: Duration,
}

impl CategoryOracle {
    pub fn new(provider: Box<dyn OracleProvider>, timeout: Duration, retries: u32) -> Self {
        Self {
            provider: Some(provider),
            timeout,
            retries,
            backoff: Duration::from_millis(250),
        }
    }

    /// Oracle that only ever serves the fallback table (no provider
    /// configured). Membership judgements fail closed.
    pub fn fallback_only() -> Self {
        Self {
            provider: None,
            timeout: Duration::from_secs(1),
            retries: 0,
            backoff: Duration::from_millis(250),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Request a category. Never fails and never blocks indefinitely: each
    /// attempt is bounded by the configured timeout, attempts are retried
    /// with exponential backoff, and exhaustion falls back to the local
    /// table.
    pub async fn request_category(&self, level: u32) -> Category {
        let Some(provider) = &self.provider else {
            return fallback_category();
        };

        let mut delay = self.backoff;
        for attempt in 0..=self.retries {
            match provider.generate_category(level, self.timeout).await {
                Ok(category) => {
                    tracing::debug!(
                        provider = provider.name(),
                        category = %category.name,
                        "oracle produced category"
                    );
                    return category;
                }
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        attempt,
                        "category generation failed: {e}"
                    );
                }
            }
            if attempt < self.retries {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }

        tracing::warn!("oracle exhausted, serving fallback category");
        fallback_category()
    }

    /// Slow-path membership judgement. Fails closed: any provider error,
    /// timeout, or missing provider yields `false`.
    pub async fn validate_word(&self, category: &str, word: &str) -> bool {
        let Some(provider) = &self.provider else {
            return false;
        };

        match provider.validate_word(category, word, self.timeout).await {
            Ok(valid) => valid,
            Err(e) => {
                tracing::warn!(provider = provider.name(), word, "judgement failed: {e}");
                false
            }
        }
    }
}

/// Configuration for oracle providers
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub ollama_base_url: Option<String>,
    pub ollama_model: String,
    pub timeout: Duration,
    pub retries: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            ollama_base_url: Some("http://localhost:11434".to_string()),
            ollama_model: "llama3.2".to_string(),
            timeout: Duration::from_secs(8),
            retries: 2,
        }
    }
}

impl OracleConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok().and_then(|key| {
            let trimmed = key.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        });

        let openai_model = std::env::var("OPENAI_MODEL")
            .ok()
            .and_then(|model| {
                let trimmed = model.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .unwrap_or_else(|| "gpt-4o-mini".to_string());

        let ollama_base_url = match std::env::var("OLLAMA_BASE_URL") {
            Ok(url) => {
                let trimmed = url.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Err(_) => Some("http://localhost:11434".to_string()),
        };

        let ollama_model = std::env::var("OLLAMA_MODEL")
            .ok()
            .and_then(|model| {
                let trimmed = model.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .unwrap_or_else(|| "llama3.2".to_string());

        Self {
            openai_api_key,
            openai_model,
            ollama_base_url,
            ollama_model,
            timeout: std::env::var("ORACLE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(8)),
            retries: std::env::var("ORACLE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        }
    }

    /// Build a `CategoryOracle` with the first configured provider
    /// (OpenAI preferred, then Ollama).
    pub fn build_oracle(&self) -> OracleResult<CategoryOracle> {
        if let Some(api_key) = &self.openai_api_key {
            let provider = OpenAiProvider::new(api_key.clone(), self.openai_model.clone());
            return Ok(CategoryOracle::new(
                Box::new(provider),
                self.timeout,
                self.retries,
            ));
        }

        if let Some(base_url) = &self.ollama_base_url {
            let provider = OllamaProvider::new(base_url.clone(), self.ollama_model.clone());
            return Ok(CategoryOracle::new(
                Box::new(provider),
                self.timeout,
                self.retries,
            ));
        }

        Err(OracleError::ConfigError(
            "No oracle providers configured. Set OPENAI_API_KEY or OLLAMA_BASE_URL".to_string(),
        ))
    }
}
