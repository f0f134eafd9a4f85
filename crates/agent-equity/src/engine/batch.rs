//! Batch runs over several securities
//!
//! One security failing never aborts the batch. Failed items are logged,
//! reported to the observer and left out of the returned results.

use crate::agents::{Action, RiskLevel};
use crate::data::china_now;
use crate::engine::events::PipelineEvent;
use crate::engine::pipeline::PipelineOrchestrator;
use crate::engine::result::AnalysisResult;
use crate::error::EquityError;
use chrono::{DateTime, FixedOffset};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// One security whose run failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub symbol: String,
    pub error: String,
}

/// One summary table row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryEntry {
    pub symbol: String,
    pub name: String,
    pub action: Option<Action>,
    pub confidence: Option<u8>,
    pub risk_level: Option<RiskLevel>,
    pub report: PathBuf,
}

impl SummaryEntry {
    fn from_result(result: &AnalysisResult) -> Self {
        Self {
            symbol: result.symbol().to_string(),
            name: result.name().to_string(),
            action: result.decision.action,
            confidence: result.decision.confidence,
            risk_level: result.risk.overall_risk_level,
            report: result.report.markdown.clone(),
        }
    }
}

/// Number of results per action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActionCounts {
    pub buy: usize,
    pub hold: usize,
    pub sell: usize,
    /// Results whose action could not be read
    pub unknown: usize,
}

impl ActionCounts {
    pub fn get(&self, action: Action) -> usize {
        match action {
            Action::Buy => self.buy,
            Action::Hold => self.hold,
            Action::Sell => self.sell,
        }
    }
}

/// Aggregate of one batch, rendered as the summary document
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub generated_at: DateTime<FixedOffset>,
    pub requested: usize,
    pub entries: Vec<SummaryEntry>,
    pub failures: Vec<ItemFailure>,
}

impl BatchSummary {
    pub fn new(requested: usize, results: &[AnalysisResult], failures: &[ItemFailure]) -> Self {
        Self {
            generated_at: china_now(),
            requested,
            entries: results.iter().map(SummaryEntry::from_result).collect(),
            failures: failures.to_vec(),
        }
    }

    pub fn counts(&self) -> ActionCounts {
        self.entries
            .iter()
            .fold(ActionCounts::default(), |mut counts, entry| {
                match entry.action {
                    Some(Action::Buy) => counts.buy += 1,
                    Some(Action::Hold) => counts.hold += 1,
                    Some(Action::Sell) => counts.sell += 1,
                    None => counts.unknown += 1,
                }
                counts
            })
    }
}

/// Outcome of a batch
#[derive(Debug)]
pub struct BatchReport {
    /// Successful analyses in input order
    pub results: Vec<AnalysisResult>,
    pub failures: Vec<ItemFailure>,
    /// Present when at least one security succeeded
    pub summary: Option<BatchSummary>,
    pub summary_path: Option<PathBuf>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.len()
    }
}

/// Runs the pipeline over several securities
#[derive(Clone)]
pub struct BatchRunner {
    pipeline: PipelineOrchestrator,
    concurrency: usize,
}

impl BatchRunner {
    /// Concurrency defaults to the configured `batch_concurrency`
    pub fn new(pipeline: PipelineOrchestrator) -> Self {
        let concurrency = pipeline.config().batch_concurrency;
        Self {
            pipeline,
            concurrency,
        }
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn pipeline(&self) -> &PipelineOrchestrator {
        &self.pipeline
    }

    /// Analyse `symbols` with at most `concurrency` runs in flight
    ///
    /// Once `cancel` fires no new security is started; those not started
    /// are recorded as cancelled failures.
    pub async fn run(&self, symbols: &[String], cancel: &CancellationToken) -> BatchReport {
        info!(
            count = symbols.len(),
            concurrency = self.concurrency,
            "Batch analysis started"
        );

        let outcomes: Vec<_> = stream::iter(0..symbols.len())
            .map(|index| {
                let symbol = &symbols[index];
                async move {
                    if cancel.is_cancelled() {
                        return (symbol, Err(EquityError::Cancelled));
                    }
                    info!(
                        symbol = %symbol,
                        "[{}/{}] Analysing", index + 1, symbols.len()
                    );
                    (symbol, self.pipeline.analyze(symbol, cancel).await)
                }
            })
            .buffered(self.concurrency.max(1))
            .collect()
            .await;

        let mut results = Vec::new();
        let mut failures = Vec::new();
        for (symbol, outcome) in outcomes {
            match outcome {
                Ok(result) => results.push(result),
                Err(e) => {
                    error!(%symbol, error = %e, "Analysis failed");
                    self.pipeline
                        .observer()
                        .on_event(&PipelineEvent::ItemFailed {
                            symbol: symbol.clone(),
                            error: e.to_string(),
                        });
                    failures.push(ItemFailure {
                        symbol: symbol.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let (summary, summary_path) = if results.is_empty() {
            warn!("No security was analysed successfully, skipping summary");
            (None, None)
        } else {
            let summary = BatchSummary::new(symbols.len(), &results, &failures);
            let path = match self.pipeline.renderer().render_summary(&summary).await {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(error = %e, "Failed to write batch summary");
                    None
                }
            };
            (Some(summary), path)
        };

        self.pipeline
            .observer()
            .on_event(&PipelineEvent::BatchCompleted {
                requested: symbols.len(),
                succeeded: results.len(),
            });

        BatchReport {
            results,
            failures,
            summary,
            summary_path,
        }
    }
}
