//! Concrete LLM provider implementations
//!
//! DeepSeek and most hosted or local chat services speak the OpenAI chat
//! completions protocol, so a single client covers them.

pub mod openai;

pub use openai::{OpenAIConfig, OpenAIProvider};
