pub mod providers;

use crate::config::LlmConfig;
use crate::error::AnalyticsError;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;

/// System message applied to every LLM call.
pub const SYSTEM_PROMPT: &str = "You are a SQL analytics warehouse expert. \
    Always start queries with SELECT and use [schema].[Table Name] for tables. \
    Use case-insensitive comparisons for string values and column names.";

#[derive(Debug)]
pub enum LlmError {
    ConnectionError(String),
    ResponseError(String),
    ConfigError(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ConnectionError(msg) => write!(f, "LLM connection error: {}", msg),
            LlmError::ResponseError(msg) => write!(f, "LLM response error: {}", msg),
            LlmError::ConfigError(msg) => write!(f, "LLM configuration error: {}", msg),
        }
    }
}

impl Error for LlmError {}

impl From<LlmError> for AnalyticsError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::ConfigError(msg) => AnalyticsError::ConfigMissing(msg),
            other => AnalyticsError::LlmFailed(other.to_string()),
        }
    }
}

/// A chat-completion model: one system message, one user prompt, one reply.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError>;
}

pub struct LlmManager {
    model: Box<dyn ChatModel + Send + Sync>,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let model: Box<dyn ChatModel + Send + Sync> = match config.backend.as_str() {
            "azure" => Box::new(providers::azure::AzureOpenAiProvider::new(config)?),
            "ollama" => Box::new(providers::ollama::OllamaProvider::new(config)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self { model })
    }

    /// Wraps an already-constructed model; used by tests to script replies.
    pub fn from_model(model: Box<dyn ChatModel + Send + Sync>) -> Self {
        Self { model }
    }

    pub async fn ask(&self, prompt: &str) -> Result<String, LlmError> {
        self.model.complete(SYSTEM_PROMPT, prompt).await
    }
}
