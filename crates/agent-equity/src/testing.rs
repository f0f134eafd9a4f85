//! Shared test doubles and fixtures

use crate::agents::{AnalystReport, DebateState, Decision, RiskAssessment};
use crate::config::{AnalysisMode, EquityConfig};
use crate::data::model::{
    DailyBar, FinancialIndicator, FinancialStatements, IncomeStatement, NewsItem, StockContext,
    StockProfile,
};
use crate::data::session::{china_now, china_offset};
use crate::data::source::MarketDataSource;
use crate::engine::events::{PipelineEvent, PipelineObserver};
use crate::engine::result::AnalysisDraft;
use crate::error::{EquityError, Result};
use crate::prompts::system;
use crate::report::{MarkdownReportWriter, ReportRenderer};
use agent_llm::{CompletionRequest, CompletionResponse, LLMProvider};
use agent_runtime::{AgentExecutor, RoleResult};
use async_trait::async_trait;
use chrono::TimeZone;
use mockall::mock;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

mock! {
    pub Provider {}
    #[async_trait]
    impl LLMProvider for Provider {
        async fn complete(&self, request: CompletionRequest) -> agent_llm::Result<CompletionResponse>;
        fn name(&self) -> &str;
    }
}

pub const TECHNICAL_REPLY: &str = r#"```json
{
    "trend": "上升趋势",
    "volume_analysis": "量能温和放大",
    "support_resistance": "支撑1680，阻力1750",
    "short_term_outlook": "震荡偏强",
    "medium_term_outlook": "稳步上行",
    "technical_score": 8,
    "summary": "多头排列"
}
```"#;

pub const FUNDAMENTAL_REPLY: &str = r#"{
    "profitability": "毛利率超过90%",
    "financial_health": "资产负债率低",
    "profitability_quality": "利润含金量高",
    "cash_flow": "经营现金流充沛",
    "valuation": "估值处于历史中位",
    "fundamental_score": 7,
    "summary": "基本面稳健"
}"#;

pub const NEWS_REPLY: &str = r#"{
    "sentiment": "积极",
    "key_events": "提价落地",
    "impact_analysis": "利好业绩",
    "risk_assessment": "短期无明显风险",
    "news_score": 7,
    "summary": "消息面偏暖"
}"#;

pub const BULL_REPLY: &str = r#"{
    "bull_points": ["品牌壁垒深厚"],
    "upside_potential": "15%",
    "catalysts": ["春节旺季"],
    "buy_thesis": "龙头地位稳固",
    "price_target": "1900",
    "bull_confidence": 8,
    "summary": "长期看好"
}"#;

pub const BEAR_REPLY: &str = r#"{
    "bear_points": ["估值偏高"],
    "downside_risk": "10%",
    "negative_catalysts": ["消费疲软"],
    "sell_thesis": "增速放缓",
    "valuation_concern": "市盈率高于行业",
    "bear_confidence": 5,
    "summary": "短期承压"
}"#;

pub const SYNTHESIS_REPLY: &str = r#"{
    "bull_key_points": "品牌与定价权",
    "bear_key_points": "估值与需求",
    "most_convincing": "品牌壁垒",
    "key_disagreements": "消费复苏节奏",
    "balanced_view": "长期价值突出，短期波动难免",
    "recommendation_lean": "偏看涨",
    "confidence_level": 7,
    "summary": "多方略占上风"
}"#;

pub const TRADER_REPLY: &str = r#"{
    "action": "买入",
    "position_size": "半仓",
    "target_price": "1850",
    "stop_loss": "1620",
    "holding_period": "中期",
    "confidence": 8,
    "reasoning": "基本面与技术面共振",
    "key_factors": ["业绩稳定增长", "品牌护城河"],
    "risks": ["消费需求波动"],
    "summary": "建议半仓买入"
}"#;

pub const RISK_REPLY: &str = r#"{
    "market_risk": "大盘震荡",
    "stock_specific_risk": "经营稳健",
    "industry_risk": "行业竞争加剧",
    "liquidity_risk": "流动性充足",
    "valuation_risk": "估值偏高",
    "sentiment_risk": "舆情平稳",
    "overall_risk_level": "中",
    "risk_score": 5,
    "risk_control_suggestions": ["分批建仓", "严格止损"],
    "max_position_size": "30%",
    "monitoring_points": ["季度业绩", "批价走势"],
    "summary": "风险可控"
}"#;

pub const REBUTTAL_REPLY: &str = "对方的担忧被高估了，核心逻辑并未改变。";

/// Canned reply for the role identified by its system prompt
pub fn reply_for(system: &str) -> &'static str {
    match system {
        s if s == system::TECHNICAL_ANALYST => TECHNICAL_REPLY,
        s if s == system::FUNDAMENTAL_ANALYST => FUNDAMENTAL_REPLY,
        s if s == system::NEWS_ANALYST => NEWS_REPLY,
        s if s == system::BULL_RESEARCHER => BULL_REPLY,
        s if s == system::BEAR_RESEARCHER => BEAR_REPLY,
        s if s == system::DEBATE_SYNTHESIS => SYNTHESIS_REPLY,
        s if s == system::TRADER => TRADER_REPLY,
        s if s == system::RISK_MANAGER => RISK_REPLY,
        s if s.starts_with("你是看涨方") || s.starts_with("你是看跌方") => REBUTTAL_REPLY,
        other => panic!("no canned reply for system prompt: {other}"),
    }
}

/// Provider answering every role with its canned reply
pub fn scripted_provider() -> MockProvider {
    let mut provider = MockProvider::new();
    provider.expect_complete().returning(|req| {
        Ok(CompletionResponse::text(reply_for(
            req.system.as_deref().unwrap_or_default(),
        )))
    });
    provider.expect_name().return_const("mock".to_string());
    provider
}

pub fn executor(provider: MockProvider) -> AgentExecutor {
    AgentExecutor::builder()
        .provider(Arc::new(provider))
        .model("test-model")
        .build()
        .unwrap()
}

fn parsed(reply: &str) -> RoleResult {
    let body = reply
        .trim()
        .trim_start_matches("```json")
        .trim_end_matches("```");
    RoleResult::from_value(serde_json::from_str(body).unwrap())
}

/// Fifteen daily bars ending at a close of 1714, plus `news_count` items
pub fn sample_context(symbol: &str, news_count: usize) -> StockContext {
    let fetched_at = china_offset()
        .with_ymd_and_hms(2024, 1, 16, 15, 30, 0)
        .unwrap();
    let mut ctx = StockContext::new(symbol, fetched_at);
    ctx.profile = Some(StockProfile {
        ts_code: symbol.to_string(),
        name: "贵州茅台".to_string(),
        area: Some("贵州".to_string()),
        industry: Some("白酒".to_string()),
        market: Some("主板".to_string()),
        list_date: Some("20010827".to_string()),
    });
    ctx.daily = (0..15u32)
        .map(|i| {
            let close = 1700.0 + f64::from(i);
            DailyBar {
                ts_code: symbol.to_string(),
                trade_date: format!("202401{:02}", i + 2),
                open: close - 5.0,
                high: close + 8.0,
                low: close - 9.0,
                close,
                pre_close: Some(close - 1.0),
                change: Some(1.0),
                pct_chg: Some(0.06),
                vol: Some(25_000.0),
                amount: Some(4_250_000.0),
            }
        })
        .collect();
    ctx.quote = ctx.daily.last().cloned();
    ctx.statements = Some(FinancialStatements {
        income: Some(IncomeStatement {
            ts_code: symbol.to_string(),
            end_date: "20230930".to_string(),
            total_revenue: Some(1.05e11),
            revenue: Some(1.03e11),
            operate_profit: Some(7.3e10),
            total_profit: Some(7.3e10),
            n_income: Some(5.4e10),
        }),
        balance: None,
        cashflow: None,
    });
    ctx.indicators = vec![FinancialIndicator {
        ts_code: symbol.to_string(),
        end_date: "20230930".to_string(),
        eps: Some(44.1),
        roe: Some(25.3),
        roa: Some(20.1),
        grossprofit_margin: Some(91.8),
        debt_to_assets: Some(13.5),
        current_ratio: Some(5.9),
        quick_ratio: Some(4.8),
    }];
    ctx.news = (1..=news_count)
        .map(|i| NewsItem {
            datetime: format!("2024-01-16 {:02}:00:00", 8 + i % 10),
            title: Some(format!("新闻 {i}")),
            content: format!("贵州茅台相关报道 {i}"),
            channels: None,
        })
        .collect();
    ctx
}

pub fn sample_report() -> AnalystReport {
    AnalystReport {
        technical: parsed(TECHNICAL_REPLY),
        fundamental: parsed(FUNDAMENTAL_REPLY),
        news: parsed(NEWS_REPLY),
    }
}

/// A finished one-round debate
pub fn sample_debate() -> DebateState {
    let mut state = DebateState::new(parsed(BULL_REPLY), parsed(BEAR_REPLY), 1);
    state.record_turn(REBUTTAL_REPLY.to_string(), None);
    state.conclude(parsed(SYNTHESIS_REPLY));
    state
}

/// Every stage output for one security, ready to render
pub struct AnalysisParts<'a> {
    pub context: &'a StockContext,
    pub analysts: AnalystReport,
    pub debate: DebateState,
    pub decision: Decision,
    pub risk: RiskAssessment,
}

impl AnalysisParts<'_> {
    pub fn draft(&self) -> AnalysisDraft<'_> {
        AnalysisDraft {
            context: self.context,
            analysts: &self.analysts,
            debate: &self.debate,
            decision: &self.decision,
            risk: &self.risk,
            mode: AnalysisMode::Standard,
            analyzed_at: china_now(),
            duration: Duration::from_secs(12),
        }
    }
}

pub fn sample_analysis(context: &StockContext) -> AnalysisParts<'_> {
    AnalysisParts {
        context,
        analysts: sample_report(),
        debate: sample_debate(),
        decision: Decision::from_result(&parsed(TRADER_REPLY)),
        risk: RiskAssessment::from_result(&parsed(RISK_REPLY)),
    }
}

/// Configuration writing into `dir`
pub fn test_config(dir: &Path) -> EquityConfig {
    EquityConfig::builder()
        .report_dir(dir.to_path_buf())
        .cache_dir(dir.join("cache"))
        .call_timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Market data source returning [`sample_context`], failing for chosen symbols
pub struct FakeSource {
    news_count: usize,
    failing: HashSet<String>,
    empty: bool,
}

impl FakeSource {
    pub fn new(news_count: usize) -> Self {
        Self {
            news_count,
            failing: HashSet::new(),
            empty: false,
        }
    }

    /// Answer every symbol with a bundle holding no data at all
    pub fn empty() -> Self {
        Self {
            empty: true,
            ..Self::new(0)
        }
    }

    pub fn failing(mut self, symbol: &str) -> Self {
        self.failing.insert(symbol.to_string());
        self
    }
}

#[async_trait]
impl MarketDataSource for FakeSource {
    async fn fetch(&self, symbol: &str) -> Result<StockContext> {
        if self.failing.contains(symbol) {
            return Err(EquityError::DataSource(format!(
                "connection refused for {symbol}"
            )));
        }
        if self.empty {
            return Ok(StockContext::new(symbol, china_now()));
        }
        Ok(sample_context(symbol, self.news_count))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Markdown writer over a temporary directory
pub struct TempRenderer {
    dir: TempDir,
}

impl TempRenderer {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn writer(&self) -> Arc<dyn ReportRenderer> {
        Arc::new(MarkdownReportWriter::new(self.dir.path()))
    }
}
