//! Progress events emitted by the pipeline and batch runner
//!
//! The core only calls [`PipelineObserver::on_event`]; rendering is left to
//! the observer.

use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

/// The six ordered stages of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    DataCollection,
    Analysts,
    Debate,
    Decision,
    Risk,
    Report,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Self::DataCollection,
        Self::Analysts,
        Self::Debate,
        Self::Decision,
        Self::Risk,
        Self::Report,
    ];

    /// One-based position in the run
    pub fn index(self) -> usize {
        match self {
            Self::DataCollection => 1,
            Self::Analysts => 2,
            Self::Debate => 3,
            Self::Decision => 4,
            Self::Risk => 5,
            Self::Report => 6,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::DataCollection => "数据收集",
            Self::Analysts => "分析师团队分析",
            Self::Debate => "研究员辩论",
            Self::Decision => "交易决策",
            Self::Risk => "风险评估",
            Self::Report => "生成报告",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.index(), Self::ALL.len(), self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    StageStarted {
        symbol: String,
        stage: Stage,
    },
    StageCompleted {
        symbol: String,
        stage: Stage,
        elapsed: Duration,
    },
    /// A role produced a degraded result; the run continues
    DegradedResult {
        symbol: String,
        role: String,
        reason: String,
    },
    RoleScored {
        symbol: String,
        role: String,
        score: u8,
    },
    /// A security's run failed and was left out of the batch
    ItemFailed {
        symbol: String,
        error: String,
    },
    BatchCompleted {
        requested: usize,
        succeeded: usize,
    },
}

pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

/// Renders events as tracing records
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::StageStarted { symbol, stage } => {
                info!(%symbol, stage = stage.index(), "{stage}");
            }
            PipelineEvent::StageCompleted {
                symbol,
                stage,
                elapsed,
            } => {
                info!(
                    %symbol,
                    stage = stage.index(),
                    elapsed_ms = elapsed.as_millis(),
                    "{} completed",
                    stage.label()
                );
            }
            PipelineEvent::DegradedResult {
                symbol,
                role,
                reason,
            } => warn!(%symbol, %role, %reason, "Degraded result, continuing"),
            PipelineEvent::RoleScored {
                symbol,
                role,
                score,
            } => info!(%symbol, %role, score, "{role} score: {score}/10"),
            PipelineEvent::ItemFailed { symbol, error } => {
                warn!(%symbol, %error, "Analysis failed, skipping");
            }
            PipelineEvent::BatchCompleted {
                requested,
                succeeded,
            } => info!(
                requested,
                succeeded, "Batch completed: {succeeded}/{requested}"
            ),
        }
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {
    fn on_event(&self, _event: &PipelineEvent) {}
}
