//! Report rendering
//!
//! The pipeline hands a finished [`AnalysisDraft`] to a [`ReportRenderer`]
//! and keeps the returned artifact paths; batch runs add a summary document.

pub mod format;
pub mod markdown;

use crate::engine::batch::BatchSummary;
use crate::engine::result::{AnalysisDraft, ReportArtifact};
use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

pub use markdown::MarkdownReportWriter;

#[async_trait]
pub trait ReportRenderer: Send + Sync {
    /// Persist the report of one analysis
    async fn render(&self, draft: &AnalysisDraft<'_>) -> Result<ReportArtifact>;

    /// Persist the summary of a batch
    async fn render_summary(&self, summary: &BatchSummary) -> Result<PathBuf>;
}
