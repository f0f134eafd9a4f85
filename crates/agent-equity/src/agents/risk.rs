//! Risk manager

use crate::agents::analysts::AnalystReport;
use crate::agents::debate::DebateState;
use crate::agents::role::RoleSpec;
use crate::agents::trader::Decision;
use crate::data::model::StockContext;
use crate::prompts::{context, render, system};
use agent_runtime::{AgentExecutor, DegradeCause, OutputSchema, RoleResult, SamplingParams};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;

pub const RISK_MANAGER: RoleSpec = RoleSpec {
    name: "risk_manager",
    label: "风险管理专家",
    system_prompt: system::RISK_MANAGER,
    schema: OutputSchema {
        fields: &[
            "market_risk",
            "stock_specific_risk",
            "industry_risk",
            "liquidity_risk",
            "valuation_risk",
            "sentiment_risk",
            "overall_risk_level",
            "risk_score",
            "risk_control_suggestions",
            "max_position_size",
            "monitoring_points",
            "summary",
        ],
        required: &["overall_risk_level"],
        score: Some("risk_score"),
    },
};

/// Overall risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "低", alias = "low")]
    Low,
    #[serde(rename = "中", alias = "medium")]
    Medium,
    #[serde(rename = "高", alias = "high")]
    High,
}

impl RiskLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "低",
            Self::Medium => "中",
            Self::High => "高",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Self::Low => "🟢",
            Self::Medium => "🟡",
            Self::High => "🔴",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let level = raw.strip_suffix("风险").unwrap_or(raw).trim();
        match level.to_ascii_lowercase().as_str() {
            "低" | "low" => Ok(Self::Low),
            "中" | "中等" | "medium" => Ok(Self::Medium),
            "高" | "high" => Ok(Self::High),
            _ => Err(format!("unrecognised risk level: {raw}")),
        }
    }
}

/// The risk manager's assessment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub market_risk: Option<String>,
    pub stock_specific_risk: Option<String>,
    pub industry_risk: Option<String>,
    pub liquidity_risk: Option<String>,
    pub valuation_risk: Option<String>,
    pub sentiment_risk: Option<String>,
    pub overall_risk_level: Option<RiskLevel>,
    pub risk_score: Option<u8>,
    #[serde(default)]
    pub risk_control_suggestions: Vec<String>,
    pub max_position_size: Option<String>,
    #[serde(default)]
    pub monitoring_points: Vec<String>,
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded: Option<DegradeCause>,
}

impl RiskAssessment {
    pub fn from_result(result: &RoleResult) -> Self {
        if let Some(cause) = result.degrade_cause() {
            return Self {
                raw_response: Some(result.raw_text()),
                degraded: Some(cause),
                ..Self::default()
            };
        }

        let level = result
            .text("overall_risk_level")
            .and_then(|raw| raw.parse().ok());
        Self {
            market_risk: result.text("market_risk"),
            stock_specific_risk: result.text("stock_specific_risk"),
            industry_risk: result.text("industry_risk"),
            liquidity_risk: result.text("liquidity_risk"),
            valuation_risk: result.text("valuation_risk"),
            sentiment_risk: result.text("sentiment_risk"),
            overall_risk_level: level,
            risk_score: result.score("risk_score"),
            risk_control_suggestions: result.list("risk_control_suggestions"),
            max_position_size: result.text("max_position_size"),
            monitoring_points: result.list("monitoring_points"),
            summary: result.summary(),
            raw_response: level.is_none().then(|| result.raw_text()),
            degraded: None,
        }
    }

    pub fn level_label(&self) -> &str {
        self.overall_risk_level.map_or("N/A", RiskLevel::label)
    }

    /// `(label, text)` for each risk dimension that was filled in
    pub fn dimensions(&self) -> Vec<(&'static str, &str)> {
        [
            ("市场风险", &self.market_risk),
            ("个股风险", &self.stock_specific_risk),
            ("行业风险", &self.industry_risk),
            ("流动性风险", &self.liquidity_risk),
            ("估值风险", &self.valuation_risk),
            ("舆情风险", &self.sentiment_risk),
        ]
        .into_iter()
        .filter_map(|(label, text)| text.as_deref().map(|t| (label, t)))
        .collect()
    }
}

/// Assesses the risk of a trading decision
#[derive(Clone)]
pub struct RiskManager {
    executor: AgentExecutor,
    sampling: SamplingParams,
}

impl RiskManager {
    pub fn new(executor: AgentExecutor, sampling: SamplingParams) -> Self {
        Self { executor, sampling }
    }

    pub fn context(
        ctx: &StockContext,
        report: &AnalystReport,
        debate: &DebateState,
        decision: &Decision,
    ) -> String {
        render(
            "risk",
            context::RISK,
            &json!({
                "symbol": ctx.symbol,
                "name": ctx.name(),
                "industry": ctx.industry(),
                "decision": decision,
                "analysis": {
                    "analysts": report,
                    "debate": debate,
                },
            }),
        )
    }

    pub async fn assess(
        &self,
        ctx: &StockContext,
        report: &AnalystReport,
        debate: &DebateState,
        decision: &Decision,
        cancel: &CancellationToken,
    ) -> RiskAssessment {
        let result = RISK_MANAGER
            .call(
                &self.executor,
                Self::context(ctx, report, debate, decision),
                self.sampling,
                cancel,
            )
            .await;
        RiskAssessment::from_result(&result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        MockProvider, executor, reply_for, sample_context, sample_debate, sample_report,
    };
    use agent_llm::CompletionResponse;

    #[test]
    fn test_risk_level_parsing() {
        assert_eq!("中".parse(), Ok(RiskLevel::Medium));
        assert_eq!("高风险".parse(), Ok(RiskLevel::High));
        assert_eq!("中等".parse(), Ok(RiskLevel::Medium));
        assert_eq!("Low".parse(), Ok(RiskLevel::Low));
        assert!("极高".parse::<RiskLevel>().is_err());
    }

    #[test]
    fn test_assessment_from_result() {
        let result = RoleResult::from_value(json!({
            "market_risk": "大盘震荡",
            "valuation_risk": "估值偏高",
            "overall_risk_level": "中",
            "risk_score": 5,
            "risk_control_suggestions": ["分批建仓"],
            "max_position_size": "30%",
            "monitoring_points": ["季度业绩"],
            "summary": "风险可控",
        }));
        let risk = RiskAssessment::from_result(&result);
        assert_eq!(risk.overall_risk_level, Some(RiskLevel::Medium));
        assert_eq!(risk.risk_score, Some(5));
        assert_eq!(risk.risk_control_suggestions, vec!["分批建仓"]);
        assert_eq!(
            risk.dimensions(),
            vec![("市场风险", "大盘震荡"), ("估值风险", "估值偏高")]
        );
        assert!(risk.raw_response.is_none());
    }

    #[test]
    fn test_degraded_assessment() {
        let result = RoleResult::degraded("timed out", DegradeCause::Timeout);
        let risk = RiskAssessment::from_result(&result);
        assert_eq!(risk.degraded, Some(DegradeCause::Timeout));
        assert_eq!(risk.level_label(), "N/A");
        assert!(risk.dimensions().is_empty());
    }

    #[tokio::test]
    async fn test_assess_sends_decision_and_uses_low_temperature() {
        let mut provider = MockProvider::new();
        provider.expect_complete().times(1).returning(|req| {
            assert_eq!(req.temperature, Some(0.5));
            let context = &req.messages[0].content;
            assert!(context.contains("交易决策"));
            assert!(context.contains("买入"));
            assert!(context.contains("debate_rounds"));
            Ok(CompletionResponse::text(reply_for(
                req.system.as_deref().unwrap_or_default(),
            )))
        });
        provider.expect_name().return_const("mock".to_string());

        let decision = Decision::from_result(&RoleResult::from_value(json!({
            "action": "买入",
            "confidence": 8,
        })));
        let risk = RiskManager::new(executor(provider), SamplingParams::new(0.5, 4000))
            .assess(
                &sample_context("600519.SH", 3),
                &sample_report(),
                &sample_debate(),
                &decision,
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(risk.overall_risk_level, Some(RiskLevel::Medium));
        assert_eq!(risk.risk_score, Some(5));
    }
}
