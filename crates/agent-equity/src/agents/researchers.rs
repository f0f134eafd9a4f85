//! Bull and bear researchers
//!
//! Researchers argue a single fixed stance from the analyst results alone;
//! they never see raw market data or each other's output.

use crate::agents::analysts::AnalystReport;
use crate::agents::role::RoleSpec;
use crate::data::model::StockContext;
use crate::prompts::{context, render, system};
use agent_runtime::{AgentExecutor, OutputSchema, RoleResult, SamplingParams};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use tokio_util::sync::CancellationToken;

pub const BULL: RoleSpec = RoleSpec {
    name: "bull",
    label: "看涨研究员",
    system_prompt: system::BULL_RESEARCHER,
    schema: OutputSchema {
        fields: &[
            "bull_points",
            "upside_potential",
            "catalysts",
            "buy_thesis",
            "price_target",
            "bull_confidence",
            "summary",
        ],
        required: &["bull_confidence", "summary"],
        score: Some("bull_confidence"),
    },
};

pub const BEAR: RoleSpec = RoleSpec {
    name: "bear",
    label: "看跌研究员",
    system_prompt: system::BEAR_RESEARCHER,
    schema: OutputSchema {
        fields: &[
            "bear_points",
            "downside_risk",
            "negative_catalysts",
            "sell_thesis",
            "valuation_concern",
            "bear_confidence",
            "summary",
        ],
        required: &["bear_confidence", "summary"],
        score: Some("bear_confidence"),
    },
};

/// Debate side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bull,
    Bear,
}

impl Side {
    pub fn spec(self) -> &'static RoleSpec {
        match self {
            Self::Bull => &BULL,
            Self::Bear => &BEAR,
        }
    }

    /// Label used when the side speaks in the debate
    pub fn label(self) -> &'static str {
        match self {
            Self::Bull => "看涨方",
            Self::Bear => "看跌方",
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            Self::Bull => Self::Bear,
            Self::Bear => Self::Bull,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().name)
    }
}

/// Context shared by both researchers
pub fn research_context(ctx: &StockContext, report: &AnalystReport) -> String {
    render(
        "research",
        context::RESEARCH,
        &json!({
            "symbol": ctx.symbol,
            "name": ctx.name(),
            "industry": ctx.industry(),
            "technical": report.technical,
            "fundamental": report.fundamental,
            "news": report.news,
        }),
    )
}

/// Produces the opening position of each side
#[derive(Clone)]
pub struct Researcher {
    executor: AgentExecutor,
    sampling: SamplingParams,
}

impl Researcher {
    pub fn new(executor: AgentExecutor, sampling: SamplingParams) -> Self {
        Self { executor, sampling }
    }

    /// Argue `side` from the analyst results
    pub async fn research(
        &self,
        side: Side,
        ctx: &StockContext,
        report: &AnalystReport,
        cancel: &CancellationToken,
    ) -> RoleResult {
        side.spec()
            .call(
                &self.executor,
                research_context(ctx, report),
                self.sampling,
                cancel,
            )
            .await
    }

    /// Both opening positions, produced concurrently as `(bull, bear)`
    pub async fn open(
        &self,
        ctx: &StockContext,
        report: &AnalystReport,
        cancel: &CancellationToken,
    ) -> (RoleResult, RoleResult) {
        tokio::join!(
            self.research(Side::Bull, ctx, report, cancel),
            self.research(Side::Bear, ctx, report, cancel),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{executor, sample_context, sample_report, scripted_provider};

    #[test]
    fn test_research_context_uses_analyst_results() {
        let ctx = sample_context("600519.SH", 3);
        let text = research_context(&ctx, &sample_report());
        assert!(text.contains("技术分析:"));
        assert!(text.contains("多头排列"));
        assert!(text.contains("基本面稳健"));
        assert!(!text.contains("trade_date"));
    }

    #[tokio::test]
    async fn test_open_produces_both_positions() {
        let researcher = Researcher::new(executor(scripted_provider()), SamplingParams::default());
        let ctx = sample_context("600519.SH", 3);
        let (bull, bear) = researcher
            .open(&ctx, &sample_report(), &CancellationToken::new())
            .await;

        assert_eq!(BULL.score(&bull), Some(8));
        assert_eq!(BEAR.score(&bear), Some(5));
        assert_eq!(bull.list("bull_points"), vec!["品牌壁垒深厚"]);
    }

    #[test]
    fn test_side_labels() {
        assert_eq!(Side::Bull.label(), "看涨方");
        assert_eq!(Side::Bear.opponent(), Side::Bull);
        assert_eq!(serde_json::to_value(Side::Bear).unwrap(), "bear");
    }
}
