//! Agent executor for role calls
//!
//! The AgentExecutor implements the role call contract:
//! 1. Build one chat completion from the role's system prompt and context
//! 2. Send it, bounded by the configured timeout and the caller's cancellation token
//! 3. Extract the structured payload and check it against the role's schema
//! 4. Collapse any failure into a degraded [`RoleResult`]
//!
//! There is no retry inside this layer.

use crate::error::{Result, RuntimeError};
use crate::extract::extract_payload;
use crate::result::{DegradeCause, OutputSchema, RoleResult};
use agent_llm::{
    CompletionRequest, CompletionResponse, LLMError, LLMProvider, Message, StopReason,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

const DEFAULT_MODEL: &str = "deepseek-chat";
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(180);

/// Sampling parameters for one call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: usize,
}

impl SamplingParams {
    pub const fn new(temperature: f32, max_tokens: usize) -> Self {
        Self {
            temperature,
            max_tokens,
        }
    }

    /// Same token budget with a different temperature
    pub const fn with_temperature(self, temperature: f32) -> Self {
        Self {
            temperature,
            ..self
        }
    }
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self::new(0.7, 4000)
    }
}

/// One role-scoped request
#[derive(Debug, Clone)]
pub struct RoleRequest {
    /// Role name, used for logging only
    pub role: String,
    pub system_prompt: String,
    /// Rendered context text sent as the user message
    pub context: String,
    pub sampling: SamplingParams,
}

impl RoleRequest {
    pub fn new(
        role: impl Into<String>,
        system_prompt: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            system_prompt: system_prompt.into(),
            context: context.into(),
            sampling: SamplingParams::default(),
        }
    }

    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }
}

/// A call that produced no usable reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFailure {
    pub cause: DegradeCause,
    /// Error description, kept as the degraded result's raw text
    pub message: String,
}

impl CallFailure {
    fn transport(err: LLMError) -> Self {
        Self {
            cause: DegradeCause::Transport,
            message: format!("错误: {err}"),
        }
    }

    fn timeout(limit: Duration) -> Self {
        Self {
            cause: DegradeCause::Timeout,
            message: format!("错误: 调用超时 ({}s)", limit.as_secs()),
        }
    }

    fn cancelled() -> Self {
        Self {
            cause: DegradeCause::Cancelled,
            message: "错误: 调用已取消".to_string(),
        }
    }

    /// Degraded result carrying the error description
    pub fn into_result(self) -> RoleResult {
        RoleResult::degraded(self.message, self.cause)
    }
}

/// Configuration for role calls
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Model to use
    pub model: String,

    /// Deadline for a single provider call; `None` waits indefinitely
    pub call_timeout: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            call_timeout: Some(DEFAULT_CALL_TIMEOUT),
        }
    }
}

/// Executes role calls against a language-model provider
///
/// Stateless apart from its configuration; clones share the provider.
#[derive(Clone)]
pub struct AgentExecutor {
    provider: Arc<dyn LLMProvider>,
    config: ExecutorConfig,
}

impl AgentExecutor {
    /// Create a new agent executor
    pub fn new(provider: Arc<dyn LLMProvider>, config: ExecutorConfig) -> Self {
        Self { provider, config }
    }

    pub fn builder() -> AgentExecutorBuilder {
        AgentExecutorBuilder::new()
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run one structured role call
    ///
    /// Never fails: unparseable replies, missing required fields, transport
    /// errors, timeouts and cancellation all yield [`RoleResult::Degraded`].
    #[instrument(skip_all, fields(role = %request.role))]
    pub async fn invoke(
        &self,
        request: &RoleRequest,
        schema: &OutputSchema,
        cancel: &CancellationToken,
    ) -> RoleResult {
        match self.complete_text(request, cancel).await {
            Ok(reply) => Self::parse_reply(reply, schema),
            Err(failure) => failure.into_result(),
        }
    }

    /// Run one free-text call, as used for debate turns
    #[instrument(skip_all, fields(role = %request.role))]
    pub async fn invoke_text(
        &self,
        request: &RoleRequest,
        cancel: &CancellationToken,
    ) -> std::result::Result<String, CallFailure> {
        self.complete_text(request, cancel).await
    }

    /// Turn a raw reply into a role result checked against `schema`
    pub fn parse_reply(reply: String, schema: &OutputSchema) -> RoleResult {
        let Some(mut fields) = extract_payload(&reply) else {
            warn!("Reply holds no JSON object, keeping raw text");
            return RoleResult::degraded(reply, DegradeCause::Unparseable);
        };

        match schema.validate(&mut fields) {
            Ok(()) => RoleResult::structured(fields),
            Err(field) => {
                warn!(field, "Reply is missing a required field, keeping raw text");
                RoleResult::degraded(reply, DegradeCause::MissingFields)
            }
        }
    }

    async fn complete_text(
        &self,
        request: &RoleRequest,
        cancel: &CancellationToken,
    ) -> std::result::Result<String, CallFailure> {
        let completion = CompletionRequest::builder(&self.config.model)
            .system(request.system_prompt.clone())
            .add_message(Message::user(request.context.clone()))
            .max_tokens(request.sampling.max_tokens)
            .temperature(request.sampling.temperature)
            .build();

        let call = async {
            match self.config.call_timeout {
                Some(limit) => {
                    match tokio::time::timeout(limit, self.provider.complete(completion)).await {
                        Ok(result) => result.map_err(CallFailure::transport),
                        Err(_) => Err(CallFailure::timeout(limit)),
                    }
                }
                None => self
                    .provider
                    .complete(completion)
                    .await
                    .map_err(CallFailure::transport),
            }
        };

        let outcome: std::result::Result<CompletionResponse, CallFailure> = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(CallFailure::cancelled()),
            outcome = call => outcome,
        };

        match outcome {
            Ok(response) => {
                if response.stop_reason == StopReason::MaxTokens {
                    warn!(
                        max_tokens = request.sampling.max_tokens,
                        "Reply stopped at the token budget"
                    );
                }
                debug!(
                    provider = self.provider.name(),
                    tokens = response.usage.total(),
                    "Role call completed"
                );
                Ok(response.message.content)
            }
            Err(failure) => {
                warn!(cause = %failure.cause, error = %failure.message, "Role call failed");
                Err(failure)
            }
        }
    }
}

/// Builder for AgentExecutor
pub struct AgentExecutorBuilder {
    provider: Option<Arc<dyn LLMProvider>>,
    config: ExecutorConfig,
}

impl AgentExecutorBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            provider: None,
            config: ExecutorConfig::default(),
        }
    }

    /// Set the LLM provider
    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the full configuration
    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the per-call deadline
    pub fn call_timeout(mut self, limit: Duration) -> Self {
        self.config.call_timeout = Some(limit);
        self
    }

    /// Wait for the provider without a deadline
    pub fn without_timeout(mut self) -> Self {
        self.config.call_timeout = None;
        self
    }

    /// Build the executor
    pub fn build(self) -> Result<AgentExecutor> {
        let provider = self.provider.ok_or(RuntimeError::MissingProvider)?;
        if self.config.model.trim().is_empty() {
            return Err(RuntimeError::MissingModel);
        }
        Ok(AgentExecutor::new(provider, self.config))
    }
}

impl Default for AgentExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
