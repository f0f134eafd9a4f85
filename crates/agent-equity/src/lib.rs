//! Multi-agent equity research desk
//!
//! This crate turns market data about one A-share security into a structured
//! investment recommendation. It includes:
//!
//! - Market data collection from Tushare Pro, with per-run snapshot files
//! - Technical, fundamental and news analysts running concurrently
//! - Bull and bear researchers and a bounded-round debate with a synthesis
//! - A trader producing the final [`Decision`] and a risk manager assessing it
//! - Markdown and JSON reports, batch summaries and a report index
//! - Optional email delivery of batch summaries
//!
//! # Architecture
//!
//! [`BatchRunner`] drives [`PipelineOrchestrator`] once per security. The
//! orchestrator runs six ordered stages over the role agents, each of which
//! is a fixed prompt bound to [`agent_runtime::AgentExecutor`]. Role calls
//! never fail: unusable replies become degraded results and flow on to the
//! next stage. Only a failed data collection, a report that cannot be written
//! or cancellation aborts a security's run.
//!
//! # Example
//!
//! ```rust,ignore
//! use agent_equity::{BatchRunner, EquityConfig, MarkdownReportWriter, PipelineOrchestrator, TushareClient};
//! use agent_llm::providers::{OpenAIConfig, OpenAIProvider};
//! use agent_runtime::AgentExecutor;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Arc::new(EquityConfig::from_env()?);
//!     let provider = OpenAIProvider::with_config(OpenAIConfig::deepseek_from_env()?)?;
//!     let executor = AgentExecutor::builder()
//!         .provider(Arc::new(provider))
//!         .model(&config.model)
//!         .call_timeout(config.call_timeout)
//!         .build()?;
//!
//!     let pipeline = PipelineOrchestrator::builder()
//!         .config(Arc::clone(&config))
//!         .executor(executor)
//!         .source(Arc::new(TushareClient::from_config(&config)?))
//!         .renderer(Arc::new(MarkdownReportWriter::from_config(&config)))
//!         .build()?;
//!
//!     let report = BatchRunner::new(pipeline)
//!         .run(&config.watchlist, &CancellationToken::new())
//!         .await;
//!     println!("{} analysed", report.succeeded());
//!     Ok(())
//! }
//! ```

pub mod agents;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod notify;
pub mod prompts;
pub mod report;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use agents::{
    Action, AnalystKind, AnalystReport, DebateState, Decision, RiskAssessment, RiskLevel, Side,
};
pub use config::{AnalysisMode, EmailConfig, EquityConfig, ScheduleEntry};
pub use data::{MarketDataSource, SnapshotCache, StockContext, TushareClient};
pub use engine::{
    AnalysisResult, BatchReport, BatchRunner, BatchSummary, NoopObserver, PipelineEvent,
    PipelineObserver, PipelineOrchestrator, Stage, TracingObserver,
};
pub use error::{EquityError, Result};
pub use notify::EmailNotifier;
pub use report::{MarkdownReportWriter, ReportRenderer};
