//! OpenAI-compatible chat completions provider
//!
//! Speaks the `/chat/completions` protocol used by OpenAI, DeepSeek and most
//! self-hosted inference servers.
//!
//! # Examples
//!
//! ```no_run
//! use agent_llm::{CompletionRequest, Message, LLMProvider};
//! use agent_llm::providers::{OpenAIConfig, OpenAIProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads DEEPSEEK_API_KEY and optionally DEEPSEEK_API_BASE
//!     let provider = OpenAIProvider::with_config(OpenAIConfig::deepseek_from_env()?)?;
//!
//!     let request = CompletionRequest::builder("deepseek-chat")
//!         .system("你是一位资深的股票技术分析师")
//!         .add_message(Message::user("请分析以下行情数据"))
//!         .temperature(0.7)
//!         .build();
//!
//!     let response = provider.complete(request).await?;
//!     println!("{}", response.message.content);
//!     Ok(())
//! }
//! ```

use crate::{
    CompletionRequest, CompletionResponse, LLMError, LLMProvider, Message, Result, StopReason,
    TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_DEEPSEEK_API_BASE: &str = "https://api.deepseek.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 180;

/// Configuration for an OpenAI-compatible provider
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// API key for authentication
    pub api_key: String,

    /// Base URL for the API (default: "https://api.openai.com/v1")
    pub api_base: String,

    /// Request timeout in seconds (default: 180)
    pub timeout_secs: u64,

    /// Name reported by [`LLMProvider::name`]
    pub provider_name: String,
}

impl OpenAIConfig {
    /// Create a new config with the given API key and default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Preset for the DeepSeek platform
    pub fn deepseek(api_key: impl Into<String>) -> Self {
        Self::new(api_key)
            .with_api_base(DEFAULT_DEEPSEEK_API_BASE)
            .with_provider_name("deepseek")
    }

    /// DeepSeek preset from `DEEPSEEK_API_KEY` and optional `DEEPSEEK_API_BASE`
    pub fn deepseek_from_env() -> Result<Self> {
        let api_key = std::env::var("DEEPSEEK_API_KEY").map_err(|_| {
            LLMError::ConfigurationError("DEEPSEEK_API_KEY environment variable not set".to_string())
        })?;

        let mut config = Self::deepseek(api_key);
        if let Ok(api_base) = std::env::var("DEEPSEEK_API_BASE") {
            config.api_base = api_base;
        }
        Ok(config)
    }

    /// Set custom API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the name reported in logs and by [`LLMProvider::name`]
    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = name.into();
        self
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            provider_name: "openai".to_string(),
        }
    }
}

/// OpenAI-compatible provider
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    /// Create a new provider with custom configuration
    pub fn with_config(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a new provider with API key and default settings
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(OpenAIConfig::new(api_key))
    }

    /// Get the current configuration
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    #[instrument(skip(self, request), fields(provider = %self.config.provider_name, model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        debug!("Sending chat completion to {}", self.config.api_base);

        let wire_request = ChatRequest {
            model: request.model.clone(),
            messages: build_chat_messages(request.system.as_deref(), &request.messages),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.api_base))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&wire_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;

            return Err(match status.as_u16() {
                401 => LLMError::AuthenticationFailed,
                429 => LLMError::RateLimitExceeded(error_text),
                400 => LLMError::InvalidRequest(error_text),
                404 => LLMError::ModelNotFound(request.model),
                _ => LLMError::RequestFailed(format!("HTTP {status}: {error_text}")),
            });
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            LLMError::UnexpectedResponse(format!("Failed to parse response: {e}"))
        })?;

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::UnexpectedResponse("No choices in response".to_string()))?;

        debug!(
            "Received response - finish_reason: {:?}, tokens: {}/{}",
            choice.finish_reason, chat_response.usage.prompt_tokens, chat_response.usage.completion_tokens
        );

        Ok(CompletionResponse {
            message: Message::assistant(choice.message.content.unwrap_or_default()),
            stop_reason: map_stop_reason(choice.finish_reason.as_deref()),
            usage: TokenUsage {
                input_tokens: chat_response.usage.prompt_tokens,
                output_tokens: chat_response.usage.completion_tokens,
            },
        })
    }

    fn name(&self) -> &str {
        &self.config.provider_name
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: ChatUsage,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

/// System prompt goes first in the messages array
fn build_chat_messages(system: Option<&str>, messages: &[Message]) -> Vec<ChatMessage> {
    system
        .map(|s| ChatMessage {
            role: "system",
            content: s.to_string(),
        })
        .into_iter()
        .chain(messages.iter().map(|m| ChatMessage {
            role: m.role.as_str(),
            content: m.content.clone(),
        }))
        .collect()
}

/// A missing or null finish reason counts as a normal end of turn
fn map_stop_reason(reason: Option<&str>) -> StopReason {
    match reason {
        None | Some("stop") => StopReason::EndTurn,
        Some("length") => StopReason::MaxTokens,
        Some("content_filter") => {
            debug!("Content filtered by provider safety systems");
            StopReason::ContentFilter
        }
        Some(reason) => {
            debug!("Unknown stop reason: {}", reason);
            StopReason::EndTurn
        }
    }
}
