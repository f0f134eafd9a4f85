//! Pipeline orchestration and batch runs

pub mod batch;
pub mod events;
pub mod pipeline;
pub mod result;

pub use batch::{ActionCounts, BatchReport, BatchRunner, BatchSummary, ItemFailure, SummaryEntry};
pub use events::{NoopObserver, PipelineEvent, PipelineObserver, Stage, TracingObserver};
pub use pipeline::{PipelineOrchestrator, PipelineOrchestratorBuilder};
pub use result::{AnalysisDraft, AnalysisResult, ReportArtifact};
