//! Role-call runtime
//!
//! This crate implements the contract every role agent is built on: one
//! role-scoped request to the language model, bounded by a timeout and a
//! cancellation token, whose reply is validated into a [`RoleResult`].
//! Failures never escape as errors. A reply that cannot be parsed, a failed
//! transport call, an elapsed timeout and a cancelled call all collapse into
//! [`RoleResult::Degraded`], which downstream stages consume like any other
//! result.

pub mod error;
pub mod executor;
pub mod extract;
pub mod result;

// Re-export key types
pub use error::{Result, RuntimeError};
pub use executor::{
    AgentExecutor, AgentExecutorBuilder, CallFailure, ExecutorConfig, RoleRequest, SamplingParams,
};
pub use extract::extract_payload;
pub use result::{DegradeCause, OutputSchema, RAW_RESPONSE_FIELD, RoleResult};
