//! Error types for the runtime

use thiserror::Error;

/// Result type for runtime construction
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors raised while assembling an executor
///
/// Calls made through a built executor never fail; see [`crate::RoleResult`].
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// No provider was supplied to the builder
    #[error("Executor initialization failed: provider not set")]
    MissingProvider,

    /// The model identifier is empty
    #[error("Executor initialization failed: model not set")]
    MissingModel,
}
