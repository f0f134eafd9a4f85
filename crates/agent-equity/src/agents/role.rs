//! Binding of a role to its prompt and output schema

use crate::data::model::NOT_AVAILABLE;
use agent_runtime::{AgentExecutor, OutputSchema, RoleRequest, RoleResult, SamplingParams};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A role: fixed instruction plus the fields its reply must carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleSpec {
    /// Stable identifier used in logs and events
    pub name: &'static str,
    /// Display label
    pub label: &'static str,
    pub system_prompt: &'static str,
    pub schema: OutputSchema,
}

impl RoleSpec {
    /// The score field of `result`, when this role has one
    pub fn score(&self, result: &RoleResult) -> Option<u8> {
        self.schema.score.and_then(|field| result.score(field))
    }

    /// Run one structured call for this role and log the outcome
    pub async fn call(
        &self,
        executor: &AgentExecutor,
        context: String,
        sampling: SamplingParams,
        cancel: &CancellationToken,
    ) -> RoleResult {
        let request =
            RoleRequest::new(self.name, self.system_prompt, context).with_sampling(sampling);
        let result = executor.invoke(&request, &self.schema, cancel).await;
        self.log_outcome(&result);
        result
    }

    fn log_outcome(&self, result: &RoleResult) {
        match result.degrade_cause() {
            Some(cause) => {
                warn!(role = self.name, %cause, "{} produced a degraded result", self.label)
            }
            None => match self.score(result) {
                Some(score) => info!(
                    role = self.name,
                    score, "{} completed, score {score}/10", self.label
                ),
                None => info!(role = self.name, "{} completed", self.label),
            },
        }
    }
}

/// Display form of an optional number
pub(crate) fn number_text(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SPEC: RoleSpec = RoleSpec {
        name: "technical",
        label: "技术分析师",
        system_prompt: "你是一位技术分析师",
        schema: OutputSchema {
            fields: &["technical_score", "summary"],
            required: &["technical_score", "summary"],
            score: Some("technical_score"),
        },
    };

    #[test]
    fn test_score_reads_schema_field() {
        let result = RoleResult::from_value(json!({"technical_score": 8, "summary": "强"}));
        assert_eq!(SPEC.score(&result), Some(8));

        let unscored = RoleSpec {
            schema: OutputSchema::any(),
            ..SPEC
        };
        assert_eq!(unscored.score(&result), None);
    }

    #[test]
    fn test_number_text() {
        assert_eq!(number_text(Some(1700.5)), "1700.5");
        assert_eq!(number_text(None), "N/A");
    }
}
