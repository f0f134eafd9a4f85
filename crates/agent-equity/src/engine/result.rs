//! Result of one completed pipeline run

use crate::agents::{AnalystReport, DebateState, Decision, RiskAssessment};
use crate::config::AnalysisMode;
use crate::data::model::StockContext;
use chrono::{DateTime, FixedOffset};
use serde::{Serialize, Serializer};
use std::path::PathBuf;
use std::time::Duration;

/// Files written for one analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportArtifact {
    pub markdown: PathBuf,
    pub json: PathBuf,
}

/// Everything a renderer needs before the report exists
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AnalysisDraft<'a> {
    #[serde(rename = "stock_data")]
    pub context: &'a StockContext,
    #[serde(rename = "analyst_results")]
    pub analysts: &'a AnalystReport,
    #[serde(rename = "debate_results")]
    pub debate: &'a DebateState,
    #[serde(rename = "trading_decision")]
    pub decision: &'a Decision,
    #[serde(rename = "risk_assessment")]
    pub risk: &'a RiskAssessment,
    pub mode: AnalysisMode,
    #[serde(rename = "analysis_time")]
    pub analyzed_at: DateTime<FixedOffset>,
    #[serde(rename = "duration_seconds", serialize_with = "seconds")]
    pub duration: Duration,
}

/// A fully populated analysis of one security
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    #[serde(rename = "stock_data")]
    pub context: StockContext,
    #[serde(rename = "analyst_results")]
    pub analysts: AnalystReport,
    #[serde(rename = "debate_results")]
    pub debate: DebateState,
    #[serde(rename = "trading_decision")]
    pub decision: Decision,
    #[serde(rename = "risk_assessment")]
    pub risk: RiskAssessment,
    pub mode: AnalysisMode,
    #[serde(rename = "analysis_time")]
    pub analyzed_at: DateTime<FixedOffset>,
    #[serde(rename = "duration_seconds", serialize_with = "seconds")]
    pub duration: Duration,
    pub report: ReportArtifact,
}

impl AnalysisResult {
    pub fn symbol(&self) -> &str {
        &self.context.symbol
    }

    pub fn name(&self) -> &str {
        self.context.name()
    }

    pub fn draft(&self) -> AnalysisDraft<'_> {
        AnalysisDraft {
            context: &self.context,
            analysts: &self.analysts,
            debate: &self.debate,
            decision: &self.decision,
            risk: &self.risk,
            mode: self.mode,
            analyzed_at: self.analyzed_at,
            duration: self.duration,
        }
    }
}

fn seconds<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}
