//! Error types for equity analysis runs
//!
//! These are control-flow failures: any of them aborts the current item's
//! pipeline run. Degraded role output is not an error and never appears here.

use thiserror::Error;

/// Equity analysis specific errors
#[derive(Debug, Error)]
pub enum EquityError {
    /// The market-data source refused or failed the request
    #[error("Data source error: {0}")]
    DataSource(String),

    /// Invalid security identifier provided
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Filesystem error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Report rendering or persistence failed
    #[error("Report error: {0}")]
    ReportError(String),

    /// Template rendering failed
    #[error("Template error: {0}")]
    TemplateError(#[from] minijinja::Error),

    /// Composing or delivering a notification failed
    #[error("Notification error: {0}")]
    NotifyError(String),

    /// A stage exceeded its deadline
    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: String, secs: u64 },

    /// The run was cancelled between stages
    #[error("Analysis cancelled")]
    Cancelled,
}

/// Result type alias for equity operations
pub type Result<T> = std::result::Result<T, EquityError>;

impl From<agent_utils::ConfigError> for EquityError {
    fn from(err: agent_utils::ConfigError) -> Self {
        EquityError::ConfigError(err.to_string())
    }
}

impl From<agent_runtime::RuntimeError> for EquityError {
    fn from(err: agent_runtime::RuntimeError) -> Self {
        EquityError::ConfigError(err.to_string())
    }
}
