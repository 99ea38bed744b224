use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::ServerConfig;
use crate::version::user_agent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// A single system instruction, the shape most prompts here use.
    pub fn instruction(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(prompt)],
            ..Default::default()
        }
    }

    pub fn with_user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::user(content));
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Completion API key not configured")]
    NotConfigured,
    #[error("Completion request failed: {0}")]
    RequestFailed(String),
    #[error("Completion request timed out")]
    Timeout,
    #[error("Completion response parse error: {0}")]
    ParseError(String),
    #[error("Failed to build completion client: {0}")]
    ClientBuild(String),
}

/// `complete(prompt) -> text` against the external completion service.
#[async_trait]
pub trait ClassifierAdapter: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ClassifierError>;
}

/// Client for an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct OpenAiClassifier {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiClassifier {
    pub fn from_config(config: &ServerConfig) -> Result<Self, ClassifierError> {
        Self::new(
            &config.openai_base_url,
            config.openai_api_key.clone(),
            &config.openai_model,
            config.classifier_timeout(),
        )
    }

    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent())
            .build()
            .map_err(|e| ClassifierError::ClientBuild(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        })
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl ClassifierAdapter for OpenAiClassifier {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ClassifierError> {
        let api_key = self.api_key.as_deref().ok_or(ClassifierError::NotConfigured)?;
        let url = format!("{}/v1/chat/completions", self.base_url);

        let body = ChatCompletionRequest {
            model: &self.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifierError::Timeout
                } else {
                    ClassifierError::RequestFailed(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ClassifierError::RequestFailed(format!("HTTP {status}: {text}")));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::ParseError(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ClassifierError::ParseError("no content in response".to_string()))?;
        debug!(model = %self.model, chars = content.len(), "Completion received.");
        Ok(content)
    }
}
