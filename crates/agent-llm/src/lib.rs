//! Language-model boundary for the equity research desk
//!
//! This crate provides the provider-agnostic types used to talk to a chat
//! completion service. It includes:
//!
//! - Message types for role-tagged conversations
//! - Completion request/response types with sampling parameters
//! - The `LLMProvider` trait every backend implements
//! - An OpenAI-compatible HTTP provider (behind the `openai` feature), which
//!   also serves DeepSeek and local deployments

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;

// Re-export main types
pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{Message, Role};
pub use provider::LLMProvider;

// Provider implementations (feature-gated)
#[cfg(feature = "openai")]
pub mod providers;
