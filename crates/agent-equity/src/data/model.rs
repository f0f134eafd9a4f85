//! Market data bundle for one security
//!
//! Field names follow the Tushare Pro tables so cached snapshots can be
//! compared against raw API output.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Placeholder shown for absent values
pub const NOT_AVAILABLE: &str = "N/A";

/// Basic listing information (`stock_basic`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockProfile {
    pub ts_code: String,
    pub name: String,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub list_date: Option<String>,
}

/// One daily bar (`daily`); volume in lots, amount in thousands of yuan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub ts_code: String,
    pub trade_date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub pre_close: Option<f64>,
    #[serde(default)]
    pub change: Option<f64>,
    #[serde(default)]
    pub pct_chg: Option<f64>,
    #[serde(default)]
    pub vol: Option<f64>,
    #[serde(default)]
    pub amount: Option<f64>,
}

/// One intraday minute bar (`stk_mins`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntradayBar {
    pub ts_code: String,
    pub trade_time: String,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    #[serde(default)]
    pub vol: Option<f64>,
    #[serde(default)]
    pub amount: Option<f64>,
}

/// Latest income statement row (`income`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeStatement {
    pub ts_code: String,
    pub end_date: String,
    #[serde(default)]
    pub total_revenue: Option<f64>,
    #[serde(default)]
    pub revenue: Option<f64>,
    #[serde(default)]
    pub operate_profit: Option<f64>,
    #[serde(default)]
    pub total_profit: Option<f64>,
    #[serde(default)]
    pub n_income: Option<f64>,
}

/// Latest balance sheet row (`balancesheet`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub ts_code: String,
    pub end_date: String,
    #[serde(default)]
    pub total_assets: Option<f64>,
    #[serde(default)]
    pub total_liab: Option<f64>,
    #[serde(default)]
    pub total_hldr_eqy_exc_min_int: Option<f64>,
}

/// Latest cash flow statement row (`cashflow`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowStatement {
    pub ts_code: String,
    pub end_date: String,
    #[serde(default)]
    pub n_cashflow_act: Option<f64>,
    #[serde(default)]
    pub n_cashflow_inv_act: Option<f64>,
    #[serde(default)]
    pub n_cash_flows_fnc_act: Option<f64>,
}

/// The three statements; any of them may be missing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income: Option<IncomeStatement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<BalanceSheet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cashflow: Option<CashFlowStatement>,
}

impl FinancialStatements {
    pub fn is_empty(&self) -> bool {
        self.income.is_none() && self.balance.is_none() && self.cashflow.is_none()
    }
}

/// Per-period financial ratios (`fina_indicator`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialIndicator {
    pub ts_code: String,
    pub end_date: String,
    #[serde(default)]
    pub eps: Option<f64>,
    #[serde(default)]
    pub roe: Option<f64>,
    #[serde(default)]
    pub roa: Option<f64>,
    #[serde(default)]
    pub grossprofit_margin: Option<f64>,
    #[serde(default)]
    pub debt_to_assets: Option<f64>,
    #[serde(default)]
    pub current_ratio: Option<f64>,
    #[serde(default)]
    pub quick_ratio: Option<f64>,
}

/// A news item (`news`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub datetime: String,
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
    #[serde(default)]
    pub channels: Option<String>,
}

/// Everything collected about one security for one run
///
/// Daily bars are in chronological order. News is ordered most recent first.
/// Absent bundles mean the source had no data or refused the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockContext {
    #[serde(rename = "ts_code")]
    pub symbol: String,
    #[serde(rename = "fetch_time")]
    pub fetched_at: DateTime<FixedOffset>,
    #[serde(rename = "is_trading_time")]
    pub is_trading_session: bool,
    #[serde(rename = "basic_info")]
    pub profile: Option<StockProfile>,
    #[serde(rename = "daily_data", default)]
    pub daily: Vec<DailyBar>,
    #[serde(rename = "intraday_data", default)]
    pub intraday: Option<Vec<IntradayBar>>,
    #[serde(rename = "financial_data", default)]
    pub statements: Option<FinancialStatements>,
    #[serde(rename = "financial_indicators", default)]
    pub indicators: Vec<FinancialIndicator>,
    #[serde(rename = "realtime_quote")]
    pub quote: Option<DailyBar>,
    #[serde(default)]
    pub news: Vec<NewsItem>,
}

impl StockContext {
    /// An empty bundle for `symbol`
    pub fn new(symbol: impl Into<String>, fetched_at: DateTime<FixedOffset>) -> Self {
        Self {
            symbol: symbol.into(),
            fetched_at,
            is_trading_session: false,
            profile: None,
            daily: Vec::new(),
            intraday: None,
            statements: None,
            indicators: Vec::new(),
            quote: None,
            news: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.profile
            .as_ref()
            .map_or(NOT_AVAILABLE, |p| p.name.as_str())
    }

    pub fn industry(&self) -> &str {
        self.profile
            .as_ref()
            .and_then(|p| p.industry.as_deref())
            .unwrap_or(NOT_AVAILABLE)
    }

    pub fn list_date(&self) -> &str {
        self.profile
            .as_ref()
            .and_then(|p| p.list_date.as_deref())
            .unwrap_or(NOT_AVAILABLE)
    }

    /// The most recent `n` daily bars, oldest first
    pub fn recent_daily(&self, n: usize) -> &[DailyBar] {
        tail(&self.daily, n)
    }

    /// The most recent `n` intraday bars, oldest first
    pub fn recent_intraday(&self, n: usize) -> &[IntradayBar] {
        self.intraday.as_deref().map_or(&[], |bars| tail(bars, n))
    }

    /// The first `n` news items
    pub fn top_news(&self, n: usize) -> &[NewsItem] {
        &self.news[..self.news.len().min(n)]
    }
}

fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}
