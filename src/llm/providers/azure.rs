use crate::config::LlmConfig;
use crate::llm::{ChatModel, LlmError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_API_VERSION: &str = "2023-05-15";

/// Azure OpenAI chat-completions provider.
pub struct AzureOpenAiProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    deployment: String,
    api_version: String,
}

#[derive(Serialize)]
struct ChatRequest {
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

impl AzureOpenAiProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let endpoint = config.api_url.clone().ok_or_else(|| {
            LlmError::ConfigError("API URL is required for the azure LLM backend".to_string())
        })?;

        let api_key = config.api_key.clone().ok_or_else(|| {
            LlmError::ConfigError("API key is required for the azure LLM backend".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            deployment: config.deployment.clone(),
            api_version: config
                .api_version
                .clone()
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
        })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            self.api_version
        )
    }
}

#[async_trait]
impl ChatModel for AzureOpenAiProvider {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            // Slightly above zero to encourage an attempt on thin schemas.
            temperature: 0.2,
            max_tokens: 1000,
        };

        let response = self
            .client
            .post(self.completions_url())
            .header("api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LlmError::ResponseError(format!(
                "API responded with status code: {}",
                response.status()
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseError(e.to_string()))?;

        match chat_response.choices.into_iter().next() {
            Some(choice) => Ok(choice.message.content),
            None => Err(LlmError::ResponseError("No choices in response".to_string())),
        }
    }
}
