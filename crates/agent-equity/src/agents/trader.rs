//! Trader: turns analyst results and the debate into a decision

use crate::agents::analysts::AnalystReport;
use crate::agents::debate::DebateState;
use crate::agents::role::{RoleSpec, number_text};
use crate::data::model::StockContext;
use crate::prompts::{context, render, system};
use agent_runtime::{AgentExecutor, DegradeCause, OutputSchema, RoleResult, SamplingParams};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;

pub const TRADER: RoleSpec = RoleSpec {
    name: "trader",
    label: "资深交易员",
    system_prompt: system::TRADER,
    schema: OutputSchema {
        fields: &[
            "action",
            "position_size",
            "target_price",
            "stop_loss",
            "holding_period",
            "confidence",
            "reasoning",
            "key_factors",
            "risks",
            "summary",
        ],
        required: &["action"],
        score: Some("confidence"),
    },
};

/// Recommended action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "买入", alias = "buy")]
    Buy,
    #[serde(rename = "持有", alias = "hold")]
    Hold,
    #[serde(rename = "卖出", alias = "sell")]
    Sell,
}

impl Action {
    pub const ALL: [Action; 3] = [Self::Buy, Self::Hold, Self::Sell];

    pub fn label(self) -> &'static str {
        match self {
            Self::Buy => "买入",
            Self::Hold => "持有",
            Self::Sell => "卖出",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Self::Buy => "🟢",
            Self::Hold => "🟡",
            Self::Sell => "🔴",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Action {
    type Err = String;

    /// Accepts the Chinese labels, `buy`/`hold`/`sell`, and `观望` as hold.
    /// A sentence naming exactly one label is accepted too.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        match raw.to_ascii_lowercase().as_str() {
            "买入" | "buy" => return Ok(Self::Buy),
            "持有" | "观望" | "hold" => return Ok(Self::Hold),
            "卖出" | "sell" => return Ok(Self::Sell),
            _ => {}
        }

        let mentioned: Vec<Action> = [
            (Self::Buy, "买入"),
            (Self::Hold, "持有"),
            (Self::Hold, "观望"),
            (Self::Sell, "卖出"),
        ]
        .into_iter()
        .filter(|(_, label)| raw.contains(label))
        .map(|(action, _)| action)
        .collect();

        match mentioned.as_slice() {
            [only] => Ok(*only),
            [first, rest @ ..] if rest.iter().all(|a| a == first) => Ok(*first),
            _ => Err(format!("unrecognised action: {raw}")),
        }
    }
}

/// The trader's decision
///
/// When the reply was degraded every typed field is empty and `raw_response`
/// holds the text, so reports still show what the model said.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Option<Action>,
    pub position_size: Option<String>,
    pub target_price: Option<String>,
    pub stop_loss: Option<String>,
    pub holding_period: Option<String>,
    pub confidence: Option<u8>,
    pub reasoning: Option<String>,
    #[serde(default)]
    pub key_factors: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded: Option<DegradeCause>,
}

impl Decision {
    /// Read a decision out of the trader's role result
    pub fn from_result(result: &RoleResult) -> Self {
        if let Some(cause) = result.degrade_cause() {
            return Self {
                raw_response: Some(result.raw_text()),
                degraded: Some(cause),
                ..Self::default()
            };
        }

        let action = result.text("action").and_then(|raw| raw.parse().ok());
        Self {
            action,
            position_size: result.text("position_size"),
            target_price: result.text("target_price"),
            stop_loss: result.text("stop_loss"),
            holding_period: result.text("holding_period"),
            confidence: result.score("confidence"),
            reasoning: result.text("reasoning"),
            key_factors: result.list("key_factors"),
            risks: result.list("risks"),
            summary: result.summary(),
            // keep the reply when the action could not be read
            raw_response: action.is_none().then(|| result.raw_text()),
            degraded: None,
        }
    }

    pub fn action_label(&self) -> &str {
        self.action.map_or("N/A", Action::label)
    }
}

/// Makes the final trading decision
#[derive(Clone)]
pub struct Trader {
    executor: AgentExecutor,
    sampling: SamplingParams,
}

impl Trader {
    pub fn new(executor: AgentExecutor, sampling: SamplingParams) -> Self {
        Self { executor, sampling }
    }

    pub fn context(ctx: &StockContext, report: &AnalystReport, debate: &DebateState) -> String {
        render(
            "trader",
            context::TRADER,
            &json!({
                "symbol": ctx.symbol,
                "name": ctx.name(),
                "industry": ctx.industry(),
                "price": number_text(ctx.quote.as_ref().map(|q| q.close)),
                "analysts": report,
                "debate": debate,
            }),
        )
    }

    pub async fn decide(
        &self,
        ctx: &StockContext,
        report: &AnalystReport,
        debate: &DebateState,
        cancel: &CancellationToken,
    ) -> Decision {
        let result = TRADER
            .call(
                &self.executor,
                Self::context(ctx, report, debate),
                self.sampling,
                cancel,
            )
            .await;
        Decision::from_result(&result)
    }
}
