//! Completion Capability
//!
//! The engine's only content source. A completion client takes a system prompt, a user
//! prompt and an operation label and returns a structured JSON payload, or `None` when
//! the model produced nothing usable. Clients never retry; repair and retry belong to the
//! slot generation loop.

use crate::error::EngineError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Completion capability used by subject and body generation.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Request a structured completion.
    ///
    /// `Ok(None)` means the model answered but the answer held no usable payload.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        operation: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Value>, EngineError>;

    /// Model identifier for logs and reports
    fn model_name(&self) -> &str;
}

/// Provider backends speaking the chat-completions wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderType {
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "ollama")]
    Ollama,
    #[serde(rename = "local")]
    LocalCustom,
}

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

/// Completion options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub temperature: Option<f32>, // 0.0-2.0
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: Some(0.9),
            max_tokens: Some(1200),
            top_p: None,
        }
    }
}

/// Provider configuration as it appears in `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_type")]
    pub provider_type: ProviderType,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub default_options: CompletionOptions,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_provider_type() -> ProviderType {
    ProviderType::Ollama
}

fn default_model() -> String {
    "llama3.1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: default_provider_type(),
            model: default_model(),
            api_key: None,
            endpoint: None,
            default_options: CompletionOptions::default(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("Model name cannot be empty".to_string());
        }
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(format!("Invalid endpoint URL: {}", endpoint));
            }
        }
        if self.provider_type == ProviderType::LocalCustom && self.endpoint.is_none() {
            return Err("Local provider requires an endpoint".to_string());
        }
        if let Some(temperature) = self.default_options.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(format!("Temperature out of range: {}", temperature));
            }
        }
        Ok(())
    }

    /// Base URL of the chat-completions API for this provider.
    pub fn base_url(&self) -> String {
        match (&self.endpoint, self.provider_type) {
            (Some(endpoint), _) => endpoint.trim_end_matches('/').to_string(),
            (None, ProviderType::OpenAI) => "https://api.openai.com/v1".to_string(),
            (None, ProviderType::Ollama) => "http://localhost:11434/v1".to_string(),
            (None, ProviderType::LocalCustom) => "http://localhost:8080/v1".to_string(),
        }
    }

    /// API key from config, falling back to `MAILWEAVE_API_KEY` then `OPENAI_API_KEY`.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("MAILWEAVE_API_KEY").ok())
            .or_else(|| {
                (self.provider_type == ProviderType::OpenAI)
                    .then(|| std::env::var("OPENAI_API_KEY").ok())
                    .flatten()
            })
            .filter(|key| !key.trim().is_empty())
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    response_format: ResponseFormat,
    stream: bool,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

fn role_to_string(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    }
}

fn map_http_error(error: reqwest::Error) -> EngineError {
    if let Some(status) = error.status() {
        match status.as_u16() {
            401 => EngineError::ProviderAuthFailed(format!("Authentication failed: {}", error)),
            429 => EngineError::ProviderRateLimit(format!("Rate limit exceeded: {}", error)),
            404 => EngineError::ProviderModelNotFound(format!("Model not found: {}", error)),
            _ => EngineError::ProviderRequestFailed(format!(
                "Request failed with status {}: {}",
                status, error
            )),
        }
    } else if error.is_timeout() {
        EngineError::ProviderRequestFailed(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        EngineError::ProviderRequestFailed(format!("Connection error: {}", error))
    } else {
        EngineError::ProviderError(format!("HTTP error: {}", error))
    }
}

const PROVIDER_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn build_provider_http_client(request_timeout: Duration) -> Result<Client, EngineError> {
    Client::builder()
        .no_proxy()
        .connect_timeout(PROVIDER_HTTP_CONNECT_TIMEOUT)
        .timeout(request_timeout)
        .build()
        .map_err(|e| EngineError::ProviderError(format!("Failed to create HTTP client: {}", e)))
}

/// Extract a JSON object from model output, tolerating code fences and leading prose.
pub fn parse_structured_content(content: &str) -> Option<Value> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return value.is_object().then_some(value);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&trimmed[start..=end])
        .ok()
        .filter(Value::is_object)
}

/// Chat-completions client for OpenAI, Ollama (OpenAI-compatible endpoint) and custom
/// local servers.
pub struct ChatCompletionsClient {
    client: Client,
    model: String,
    api_key: Option<String>,
    base_url: String,
    options: CompletionOptions,
}

impl ChatCompletionsClient {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::ConfigError)?;
        let api_key = config.resolve_api_key();
        if config.provider_type == ProviderType::OpenAI && api_key.is_none() {
            return Err(EngineError::ConfigError(
                "OpenAI provider requires an API key (config, MAILWEAVE_API_KEY or OPENAI_API_KEY)"
                    .to_string(),
            ));
        }
        let client =
            build_provider_http_client(Duration::from_secs(config.request_timeout_secs.max(1)))?;
        Ok(Self {
            client,
            model: config.model.clone(),
            api_key,
            base_url: config.base_url(),
            options: config.default_options.clone(),
        })
    }

    async fn send(&self, messages: Vec<ChatMessage>) -> Result<Option<String>, EngineError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages
                .into_iter()
                .map(|msg| OpenAIMessage {
                    role: role_to_string(msg.role).to_string(),
                    content: msg.content,
                })
                .collect(),
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
            top_p: self.options.top_p,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
            stream: false,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let mut request_builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");
        if let Some(api_key) = &self.api_key {
            request_builder =
                request_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request_builder
            .json(&request)
            .send()
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(match status.as_u16() {
                401 => EngineError::ProviderAuthFailed(format!(
                    "Authentication failed: {}",
                    error_text
                )),
                429 => {
                    EngineError::ProviderRateLimit(format!("Rate limit exceeded: {}", error_text))
                }
                404 => {
                    EngineError::ProviderModelNotFound(format!("Model not found: {}", error_text))
                }
                _ => EngineError::ProviderRequestFailed(format!(
                    "Request failed with status {}: {}",
                    status, error_text
                )),
            });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| EngineError::ProviderError(format!("Failed to parse response: {}", e)))?;

        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content))
    }
}

#[async_trait]
impl CompletionClient for ChatCompletionsClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        operation: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Value>, EngineError> {
        let messages = vec![
            ChatMessage {
                role: MessageRole::System,
                content: system_prompt.to_string(),
            },
            ChatMessage {
                role: MessageRole::User,
                content: user_prompt.to_string(),
            },
        ];

        let start = Instant::now();
        let content = tokio::select! {
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            result = self.send(messages) => result?,
        };

        let parsed = content.as_deref().and_then(parse_structured_content);
        if parsed.is_none() {
            warn!(
                operation,
                model = %self.model,
                "Completion returned no structured payload"
            );
        }
        debug!(
            operation,
            model = %self.model,
            duration_ms = start.elapsed().as_millis(),
            "Completion received"
        );
        Ok(parsed)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// Scripted client for unit tests
#[cfg(test)]
pub struct MockCompletionClient {
    responses: parking_lot::Mutex<std::collections::VecDeque<Result<Option<Value>, EngineError>>>,
    calls: parking_lot::Mutex<Vec<(String, String)>>,
}

#[cfg(test)]
impl MockCompletionClient {
    pub fn new(responses: Vec<Result<Option<Value>, EngineError>>) -> Self {
        Self {
            responses: parking_lot::Mutex::new(responses.into()),
            calls: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Operation labels and user prompts received, in order
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
        operation: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Value>, EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        self.calls
            .lock()
            .push((operation.to_string(), user_prompt.to_string()));
        self.responses.lock().pop_front().unwrap_or(Ok(None))
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}
