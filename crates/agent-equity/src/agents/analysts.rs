//! Technical, fundamental and news analysts
//!
//! Each analyst reads its own slice of the [`StockContext`]. The three calls
//! are independent and run concurrently; [`AnalystReport`] holds the results
//! by name.

use crate::agents::role::{RoleSpec, number_text};
use crate::data::model::StockContext;
use crate::prompts::{context, render, system};
use agent_runtime::{AgentExecutor, OutputSchema, RoleResult, SamplingParams};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Daily and intraday bars shown to the technical analyst
const RECENT_BARS: usize = 10;
/// News items shown to the news analyst
const NEWS_WINDOW: usize = 10;

pub const TECHNICAL: RoleSpec = RoleSpec {
    name: "technical",
    label: "技术分析师",
    system_prompt: system::TECHNICAL_ANALYST,
    schema: OutputSchema {
        fields: &[
            "trend",
            "volume_analysis",
            "support_resistance",
            "short_term_outlook",
            "medium_term_outlook",
            "technical_score",
            "summary",
        ],
        required: &["technical_score", "summary"],
        score: Some("technical_score"),
    },
};

pub const FUNDAMENTAL: RoleSpec = RoleSpec {
    name: "fundamental",
    label: "基本面分析师",
    system_prompt: system::FUNDAMENTAL_ANALYST,
    schema: OutputSchema {
        fields: &[
            "profitability",
            "financial_health",
            "profitability_quality",
            "cash_flow",
            "valuation",
            "fundamental_score",
            "summary",
        ],
        required: &["fundamental_score", "summary"],
        score: Some("fundamental_score"),
    },
};

pub const NEWS: RoleSpec = RoleSpec {
    name: "news",
    label: "新闻分析师",
    system_prompt: system::NEWS_ANALYST,
    schema: OutputSchema {
        fields: &[
            "sentiment",
            "key_events",
            "impact_analysis",
            "risk_assessment",
            "news_score",
            "summary",
        ],
        required: &["news_score", "summary"],
        score: Some("news_score"),
    },
};

/// The three analyst roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalystKind {
    Technical,
    Fundamental,
    News,
}

impl AnalystKind {
    pub const ALL: [AnalystKind; 3] = [Self::Technical, Self::Fundamental, Self::News];

    pub fn spec(self) -> &'static RoleSpec {
        match self {
            Self::Technical => &TECHNICAL,
            Self::Fundamental => &FUNDAMENTAL,
            Self::News => &NEWS,
        }
    }

    /// Shape the part of `ctx` this analyst reads into context text
    pub fn context(self, ctx: &StockContext) -> String {
        match self {
            Self::Technical => technical_context(ctx),
            Self::Fundamental => fundamental_context(ctx),
            Self::News => news_context(ctx),
        }
    }
}

impl fmt::Display for AnalystKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().name)
    }
}

fn technical_context(ctx: &StockContext) -> String {
    let quote = ctx.quote.as_ref();
    let intraday = ctx.recent_intraday(RECENT_BARS);
    render(
        "technical",
        context::TECHNICAL,
        &json!({
            "symbol": ctx.symbol,
            "name": ctx.name(),
            "industry": ctx.industry(),
            "fetched_at": ctx.fetched_at.to_rfc3339(),
            "trading": ctx.is_trading_session,
            "close": number_text(quote.map(|q| q.close)),
            "pct_chg": number_text(quote.and_then(|q| q.pct_chg)),
            "vol": number_text(quote.and_then(|q| q.vol)),
            "amount": number_text(quote.and_then(|q| q.amount)),
            "daily": ctx.recent_daily(RECENT_BARS),
            "intraday": (!intraday.is_empty()).then_some(intraday),
        }),
    )
}

fn fundamental_context(ctx: &StockContext) -> String {
    render(
        "fundamental",
        context::FUNDAMENTAL,
        &json!({
            "symbol": ctx.symbol,
            "name": ctx.name(),
            "industry": ctx.industry(),
            "list_date": ctx.list_date(),
            "statements": ctx.statements,
            "indicators": ctx.indicators,
        }),
    )
}

fn news_context(ctx: &StockContext) -> String {
    render(
        "news",
        context::NEWS,
        &json!({
            "symbol": ctx.symbol,
            "name": ctx.name(),
            "news": ctx.top_news(NEWS_WINDOW),
        }),
    )
}

/// Fixed result used when there is no news to analyse
pub fn neutral_news() -> RoleResult {
    RoleResult::from_value(json!({
        "sentiment": "中性",
        "key_events": "无重大新闻事件",
        "impact_analysis": "无明显影响",
        "news_score": 5,
        "summary": "近期无重大新闻，市场情绪中性",
    }))
}

/// Results of the three analysts, read by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystReport {
    pub technical: RoleResult,
    pub fundamental: RoleResult,
    pub news: RoleResult,
}

impl AnalystReport {
    pub fn get(&self, kind: AnalystKind) -> &RoleResult {
        match kind {
            AnalystKind::Technical => &self.technical,
            AnalystKind::Fundamental => &self.fundamental,
            AnalystKind::News => &self.news,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (AnalystKind, &RoleResult)> {
        AnalystKind::ALL
            .into_iter()
            .map(move |kind| (kind, self.get(kind)))
    }
}

/// Runs the analyst roles against one executor
#[derive(Clone)]
pub struct AnalystTeam {
    executor: AgentExecutor,
    sampling: SamplingParams,
}

impl AnalystTeam {
    pub fn new(executor: AgentExecutor, sampling: SamplingParams) -> Self {
        Self { executor, sampling }
    }

    /// Run one analyst
    ///
    /// The news analyst returns [`neutral_news`] without calling the model
    /// when `ctx` has no news.
    pub async fn analyze(
        &self,
        kind: AnalystKind,
        ctx: &StockContext,
        cancel: &CancellationToken,
    ) -> RoleResult {
        if kind == AnalystKind::News && ctx.news.is_empty() {
            info!(symbol = %ctx.symbol, "No news collected, using neutral news result");
            return neutral_news();
        }
        kind.spec()
            .call(&self.executor, kind.context(ctx), self.sampling, cancel)
            .await
    }

    /// Run all three analysts concurrently and wait for every one
    pub async fn analyze_all(
        &self,
        ctx: &StockContext,
        cancel: &CancellationToken,
    ) -> AnalystReport {
        let (technical, fundamental, news) = tokio::join!(
            self.analyze(AnalystKind::Technical, ctx, cancel),
            self.analyze(AnalystKind::Fundamental, ctx, cancel),
            self.analyze(AnalystKind::News, ctx, cancel),
        );
        AnalystReport {
            technical,
            fundamental,
            news,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockProvider, executor, reply_for, sample_context};
    use agent_llm::{CompletionRequest, CompletionResponse, LLMProvider};
    use agent_runtime::DegradeCause;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[tokio::test]
    async fn test_empty_news_skips_the_model() {
        let mut provider = MockProvider::new();
        provider.expect_complete().times(0);
        provider.expect_name().return_const("mock".to_string());

        let team = AnalystTeam::new(executor(provider), SamplingParams::default());
        let ctx = sample_context("600519.SH", 0);
        let result = team
            .analyze(AnalystKind::News, &ctx, &CancellationToken::new())
            .await;

        assert_eq!(result, neutral_news());
        assert_eq!(result.text("sentiment").as_deref(), Some("中性"));
        assert_eq!(result.score("news_score"), Some(5));
    }

    #[tokio::test]
    async fn test_analyze_all_collects_by_name() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut provider = MockProvider::new();
        provider.expect_complete().returning(move |req| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(CompletionResponse::text(reply_for(
                req.system.as_deref().unwrap_or_default(),
            )))
        });
        provider.expect_name().return_const("mock".to_string());

        let team = AnalystTeam::new(executor(provider), SamplingParams::default());
        let report = team
            .analyze_all(&sample_context("600519.SH", 3), &CancellationToken::new())
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.technical.score("technical_score"), Some(8));
        assert_eq!(report.fundamental.score("fundamental_score"), Some(7));
        assert_eq!(report.news.text("sentiment").as_deref(), Some("积极"));
        assert_eq!(report.iter().count(), 3);
    }

    /// Answers each analyst after its own delay and records who finished first
    struct DelayedProvider {
        delays: [(&'static str, u64); 3],
        finished: Mutex<Vec<&'static str>>,
    }

    impl DelayedProvider {
        fn new(technical_ms: u64, fundamental_ms: u64, news_ms: u64) -> Self {
            Self {
                delays: [
                    (system::TECHNICAL_ANALYST, technical_ms),
                    (system::FUNDAMENTAL_ANALYST, fundamental_ms),
                    (system::NEWS_ANALYST, news_ms),
                ],
                finished: Mutex::new(Vec::new()),
            }
        }

        fn finished(&self) -> Vec<&'static str> {
            self.finished.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LLMProvider for DelayedProvider {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> agent_llm::Result<CompletionResponse> {
            let system = request.system.as_deref().unwrap_or_default();
            let (prompt, delay) = self
                .delays
                .iter()
                .find(|(prompt, _)| *prompt == system)
                .copied()
                .unwrap();
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.finished.lock().unwrap().push(prompt);
            Ok(CompletionResponse::text(reply_for(prompt)))
        }

        fn name(&self) -> &str {
            "delayed"
        }
    }

    async fn report_with(provider: Arc<DelayedProvider>) -> AnalystReport {
        let executor = AgentExecutor::builder()
            .provider(provider)
            .model("test-model")
            .build()
            .unwrap();
        AnalystTeam::new(executor, SamplingParams::default())
            .analyze_all(&sample_context("600519.SH", 3), &CancellationToken::new())
            .await
    }

    #[tokio::test]
    async fn test_report_does_not_depend_on_completion_order() {
        let fast_technical = Arc::new(DelayedProvider::new(10, 60, 120));
        let slow_technical = Arc::new(DelayedProvider::new(120, 60, 10));

        let first = report_with(Arc::clone(&fast_technical)).await;
        let second = report_with(Arc::clone(&slow_technical)).await;

        assert_eq!(fast_technical.finished()[0], system::TECHNICAL_ANALYST);
        assert_eq!(slow_technical.finished()[0], system::NEWS_ANALYST);
        assert_eq!(first, second);
        assert_eq!(first.technical.score("technical_score"), Some(8));
        assert_eq!(first.news.text("sentiment").as_deref(), Some("积极"));
    }

    #[tokio::test]
    async fn test_degraded_analyst_does_not_fail() {
        let mut provider = MockProvider::new();
        provider
            .expect_complete()
            .returning(|_| Ok(CompletionResponse::text("技术面整体偏强")));
        provider.expect_name().return_const("mock".to_string());

        let team = AnalystTeam::new(executor(provider), SamplingParams::default());
        let result = team
            .analyze(
                AnalystKind::Technical,
                &sample_context("600519.SH", 0),
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(result.degrade_cause(), Some(DegradeCause::Unparseable));
        assert_eq!(result.raw_text(), "技术面整体偏强");
    }

    #[test]
    fn test_technical_context_truncates_bars() {
        let ctx = sample_context("600519.SH", 3);
        assert!(ctx.daily.len() > RECENT_BARS);
        let text = AnalystKind::Technical.context(&ctx);
        assert!(text.contains("最近10个交易日"));
        assert!(text.contains("贵州茅台"));
        assert!(!text.contains(&ctx.daily[0].trade_date));
        assert!(text.contains(&ctx.daily[ctx.daily.len() - 1].trade_date));
    }

    #[test]
    fn test_news_context_caps_items() {
        let ctx = sample_context("600519.SH", 12);
        let text = AnalystKind::News.context(&ctx);
        assert!(text.contains("新闻 1"));
        assert!(text.contains("新闻 10"));
        assert!(!text.contains("新闻 11"));
    }
}
