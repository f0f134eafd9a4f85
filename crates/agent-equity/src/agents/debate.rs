//! Bounded bull/bear debate
//!
//! The debate is seeded with both opening positions. Round 1 is a single
//! bear turn; every later round is a bull rebuttal followed by a bear
//! rebuttal. After the last round one synthesis call summarises the
//! exchange, so a completed transcript holds `2 * max_rounds - 1` turns.
//!
//! ```text
//! Turn(1, bear) -> Turn(2, bull) -> Turn(2, bear) -> ... -> Turn(n, bear) -> Synthesis -> Done
//! ```

use crate::agents::researchers::Side;
use crate::agents::role::RoleSpec;
use crate::data::model::{NOT_AVAILABLE, StockContext};
use crate::prompts::{context, render, system};
use agent_runtime::{
    AgentExecutor, DegradeCause, OutputSchema, RoleRequest, RoleResult, SamplingParams,
};
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const SYNTHESIS: RoleSpec = RoleSpec {
    name: "debate_synthesis",
    label: "辩论协调器",
    system_prompt: system::DEBATE_SYNTHESIS,
    schema: OutputSchema {
        fields: &[
            "bull_key_points",
            "bear_key_points",
            "most_convincing",
            "key_disagreements",
            "balanced_view",
            "recommendation_lean",
            "confidence_level",
            "summary",
        ],
        required: &["recommendation_lean"],
        score: Some("confidence_level"),
    },
};

/// Where the debate currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebatePhase {
    /// `side` speaks next in `round`
    Turn { round: usize, side: Side },
    /// All rounds are done; the synthesis is due
    Synthesis,
    /// The synthesis has been recorded
    Done,
}

/// One rebuttal in the transcript
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebateTurn {
    pub round: usize,
    #[serde(rename = "speaker")]
    pub side: Side,
    /// Free text, or the error description when the call failed
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<DegradeCause>,
}

/// Opening positions, transcript and synthesis of one debate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebateState {
    pub bull_initial: RoleResult,
    pub bear_initial: RoleResult,
    pub max_rounds: usize,
    #[serde(rename = "debate_rounds")]
    turns: Vec<DebateTurn>,
    #[serde(rename = "debate_summary")]
    synthesis: Option<RoleResult>,
    #[serde(skip)]
    phase: DebatePhase,
}

impl DebateState {
    /// A debate about to open with the round 1 bear turn
    ///
    /// `max_rounds` below 1 is raised to 1.
    pub fn new(bull_initial: RoleResult, bear_initial: RoleResult, max_rounds: usize) -> Self {
        Self {
            bull_initial,
            bear_initial,
            max_rounds: max_rounds.max(1),
            turns: Vec::new(),
            synthesis: None,
            phase: DebatePhase::Turn {
                round: 1,
                side: Side::Bear,
            },
        }
    }

    pub fn phase(&self) -> DebatePhase {
        self.phase
    }

    pub fn turns(&self) -> &[DebateTurn] {
        &self.turns
    }

    pub fn synthesis(&self) -> Option<&RoleResult> {
        self.synthesis.as_ref()
    }

    pub fn is_done(&self) -> bool {
        self.phase == DebatePhase::Done
    }

    /// Opening position of `side`
    pub fn initial(&self, side: Side) -> &RoleResult {
        match side {
            Side::Bull => &self.bull_initial,
            Side::Bear => &self.bear_initial,
        }
    }

    /// Record the turn the current phase expects and advance
    ///
    /// Returns `false` and records nothing when no turn is due.
    pub fn record_turn(&mut self, content: String, degraded: Option<DegradeCause>) -> bool {
        let DebatePhase::Turn { round, side } = self.phase else {
            warn!(phase = ?self.phase, "Debate turn offered outside a turn phase, dropped");
            return false;
        };
        self.turns.push(DebateTurn {
            round,
            side,
            content,
            degraded,
        });
        self.phase = self.after_turn(round, side);
        true
    }

    /// Record the synthesis and finish
    ///
    /// Returns `false` and records nothing unless the synthesis is due.
    pub fn conclude(&mut self, synthesis: RoleResult) -> bool {
        if self.phase != DebatePhase::Synthesis {
            warn!(phase = ?self.phase, "Debate synthesis offered before the last round, dropped");
            return false;
        }
        self.synthesis = Some(synthesis);
        self.phase = DebatePhase::Done;
        true
    }

    fn after_turn(&self, round: usize, side: Side) -> DebatePhase {
        match side {
            Side::Bull => DebatePhase::Turn {
                round,
                side: Side::Bear,
            },
            Side::Bear if round < self.max_rounds => DebatePhase::Turn {
                round: round + 1,
                side: Side::Bull,
            },
            Side::Bear => DebatePhase::Synthesis,
        }
    }
}

/// Runs the debate state machine to completion
#[derive(Clone)]
pub struct DebateCoordinator {
    executor: AgentExecutor,
    max_rounds: usize,
    rebuttal_sampling: SamplingParams,
    synthesis_sampling: SamplingParams,
}

impl DebateCoordinator {
    pub fn new(
        executor: AgentExecutor,
        max_rounds: usize,
        rebuttal_sampling: SamplingParams,
        synthesis_sampling: SamplingParams,
    ) -> Self {
        Self {
            executor,
            max_rounds,
            rebuttal_sampling,
            synthesis_sampling,
        }
    }

    /// Debate from the two opening positions
    ///
    /// Degraded turns stay in the transcript; the debate never aborts.
    pub async fn run(
        &self,
        ctx: &StockContext,
        bull_initial: RoleResult,
        bear_initial: RoleResult,
        cancel: &CancellationToken,
    ) -> DebateState {
        let mut state = DebateState::new(bull_initial, bear_initial, self.max_rounds);
        info!(symbol = %ctx.symbol, rounds = state.max_rounds, "Debate started");

        loop {
            match state.phase() {
                DebatePhase::Turn { round, side } => {
                    debug!(round, %side, "Debate turn");
                    let (content, degraded) = self.rebuttal(ctx, &state, side, cancel).await;
                    state.record_turn(content, degraded);
                }
                DebatePhase::Synthesis => {
                    let synthesis = self.synthesize(ctx, &state, cancel).await;
                    state.conclude(synthesis);
                }
                DebatePhase::Done => break,
            }
        }

        let lean = state
            .synthesis()
            .and_then(|s| s.text("recommendation_lean"))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        info!(symbol = %ctx.symbol, turns = state.turns().len(), %lean, "Debate completed");
        state
    }

    async fn rebuttal(
        &self,
        ctx: &StockContext,
        state: &DebateState,
        side: Side,
        cancel: &CancellationToken,
    ) -> (String, Option<DegradeCause>) {
        let prompt = render(
            "rebuttal_prompt",
            system::REBUTTAL,
            &json!({ "side": side.label() }),
        );
        let context_text = render(
            "rebuttal",
            context::REBUTTAL,
            &json!({
                "symbol": ctx.symbol,
                "name": ctx.name(),
                "side": side.label(),
                "own": state.initial(side),
                "opponent": state.initial(side.opponent()),
                "history": state.turns(),
            }),
        );
        let request = RoleRequest::new(format!("{side}_rebuttal"), prompt, context_text)
            .with_sampling(self.rebuttal_sampling);

        match self.executor.invoke_text(&request, cancel).await {
            Ok(text) => (text, None),
            Err(failure) => (failure.message, Some(failure.cause)),
        }
    }

    async fn synthesize(
        &self,
        ctx: &StockContext,
        state: &DebateState,
        cancel: &CancellationToken,
    ) -> RoleResult {
        let context_text = render(
            "synthesis",
            context::SYNTHESIS,
            &json!({
                "symbol": ctx.symbol,
                "name": ctx.name(),
                "bull": state.bull_initial,
                "bear": state.bear_initial,
                "history": state.turns(),
            }),
        );
        SYNTHESIS
            .call(
                &self.executor,
                context_text,
                self.synthesis_sampling,
                cancel,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProvider;
    use crate::testing::{executor, reply_for, sample_context};
    use agent_llm::{CompletionResponse, LLMError};
    use serde_json::json;

    fn opening() -> (RoleResult, RoleResult) {
        (
            RoleResult::from_value(json!({"bull_confidence": 8, "summary": "看涨"})),
            RoleResult::from_value(json!({"bear_confidence": 5, "summary": "谨慎"})),
        )
    }

    fn coordinator(provider: MockProvider, rounds: usize) -> DebateCoordinator {
        DebateCoordinator::new(
            executor(provider),
            rounds,
            SamplingParams::new(0.8, 4000),
            SamplingParams::default(),
        )
    }

    fn replying_provider() -> MockProvider {
        let mut provider = MockProvider::new();
        provider.expect_complete().returning(|req| {
            Ok(CompletionResponse::text(reply_for(
                req.system.as_deref().unwrap_or_default(),
            )))
        });
        provider.expect_name().return_const("mock".to_string());
        provider
    }

    #[test]
    fn test_state_machine_sequence() {
        let (bull, bear) = opening();
        let mut state = DebateState::new(bull, bear, 3);
        let mut seen = Vec::new();
        while let DebatePhase::Turn { round, side } = state.phase() {
            seen.push((round, side));
            assert!(state.record_turn(format!("{side} {round}"), None));
        }
        assert_eq!(
            seen,
            vec![
                (1, Side::Bear),
                (2, Side::Bull),
                (2, Side::Bear),
                (3, Side::Bull),
                (3, Side::Bear),
            ]
        );
        assert_eq!(state.phase(), DebatePhase::Synthesis);
        assert!(!state.record_turn("late".to_string(), None));

        assert!(state.conclude(RoleResult::from_value(
            json!({"recommendation_lean": "中性"})
        )));
        assert!(state.is_done());
        assert!(!state.conclude(RoleResult::from_value(json!({}))));
        assert_eq!(state.turns().len(), 5);
    }

    #[test]
    fn test_synthesis_rejected_mid_debate() {
        let (bull, bear) = opening();
        let mut state = DebateState::new(bull, bear, 2);
        assert!(!state.conclude(RoleResult::from_value(json!({}))));
        assert!(state.synthesis().is_none());
    }

    #[test]
    fn test_zero_rounds_is_raised_to_one() {
        let (bull, bear) = opening();
        let state = DebateState::new(bull, bear, 0);
        assert_eq!(state.max_rounds, 1);
    }

    #[tokio::test]
    async fn test_transcript_length_for_each_round_count() {
        for rounds in 1..=4 {
            let (bull, bear) = opening();
            let state = coordinator(replying_provider(), rounds)
                .run(
                    &sample_context("600519.SH", 3),
                    bull,
                    bear,
                    &CancellationToken::new(),
                )
                .await;

            assert!(state.is_done());
            assert_eq!(state.turns().len(), 2 * rounds - 1);
            assert_eq!(state.turns()[0].side, Side::Bear);
            assert_eq!(state.turns()[0].round, 1);
            assert!(state.turns().windows(2).all(|w| w[0].round <= w[1].round));
            assert_eq!(
                state
                    .synthesis()
                    .and_then(|s| s.text("recommendation_lean"))
                    .as_deref(),
                Some("偏看涨")
            );
        }
    }

    #[tokio::test]
    async fn test_failed_turn_stays_in_transcript() {
        let mut provider = MockProvider::new();
        provider.expect_complete().returning(|req| {
            let system = req.system.as_deref().unwrap_or_default();
            if system.starts_with("你是看涨方") {
                Err(LLMError::RequestFailed("connection reset".to_string()))
            } else {
                Ok(CompletionResponse::text(reply_for(system)))
            }
        });
        provider.expect_name().return_const("mock".to_string());

        let (bull, bear) = opening();
        let state = coordinator(provider, 2)
            .run(
                &sample_context("600519.SH", 3),
                bull,
                bear,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(state.turns().len(), 3);
        let bull_turn = &state.turns()[1];
        assert_eq!(bull_turn.side, Side::Bull);
        assert_eq!(bull_turn.degraded, Some(DegradeCause::Transport));
        assert!(bull_turn.content.starts_with("错误: "));
        assert!(state.is_done());
    }

    #[tokio::test]
    async fn test_rebuttals_use_rebuttal_sampling() {
        let mut provider = MockProvider::new();
        provider
            .expect_complete()
            .withf(|req| {
                req.system
                    .as_deref()
                    .is_some_and(|s| s.starts_with("你是看跌方"))
            })
            .times(1)
            .returning(|req| {
                assert_eq!(req.temperature, Some(0.8));
                assert!(req.messages[0].content.contains("你的初始观点（看跌方）"));
                Ok(CompletionResponse::text("对方忽视了估值风险。"))
            });
        provider.expect_complete().returning(|req| {
            Ok(CompletionResponse::text(reply_for(
                req.system.as_deref().unwrap_or_default(),
            )))
        });
        provider.expect_name().return_const("mock".to_string());

        let (bull, bear) = opening();
        let state = coordinator(provider, 1)
            .run(
                &sample_context("600519.SH", 3),
                bull,
                bear,
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(state.turns()[0].content, "对方忽视了估值风险。");
    }

    #[test]
    fn test_serialized_shape() {
        let (bull, bear) = opening();
        let mut state = DebateState::new(bull, bear, 1);
        state.record_turn("估值偏高".to_string(), None);
        state.conclude(RoleResult::from_value(
            json!({"recommendation_lean": "中性"}),
        ));

        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["debate_rounds"][0]["speaker"], "bear");
        assert_eq!(value["debate_rounds"][0]["round"], 1);
        assert!(value["debate_rounds"][0].get("degraded").is_none());
        assert_eq!(value["debate_summary"]["recommendation_lean"], "中性");
        assert!(value.get("phase").is_none());
    }
}
