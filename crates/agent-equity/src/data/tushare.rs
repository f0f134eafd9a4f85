//! Tushare Pro API client
//!
//! Every endpoint is a POST of `{"api_name", "token", "params", "fields"}` to
//! a single URL; tables come back as a field list plus rows of values.

use crate::config::EquityConfig;
use crate::data::model::{
    BalanceSheet, CashFlowStatement, DailyBar, FinancialIndicator, FinancialStatements,
    IncomeStatement, IntradayBar, NewsItem, StockContext, StockProfile,
};
use crate::data::session::{china_now, is_trading_session};
use crate::data::source::MarketDataSource;
use crate::error::{EquityError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, FixedOffset};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const BASE_URL: &str = "http://api.tushare.pro";
const DEFAULT_RATE_LIMIT: NonZeroU32 = NonZeroU32::MIN.saturating_add(199);

const BASIC_FIELDS: &str = "ts_code,name,area,industry,market,list_date";
const DAILY_FIELDS: &str =
    "ts_code,trade_date,open,high,low,close,pre_close,change,pct_chg,vol,amount";
const MINUTE_FIELDS: &str = "ts_code,trade_time,open,close,high,low,vol,amount";
const INCOME_FIELDS: &str =
    "ts_code,end_date,total_revenue,revenue,operate_profit,total_profit,n_income";
const BALANCE_FIELDS: &str = "ts_code,end_date,total_assets,total_liab,total_hldr_eqy_exc_min_int";
const CASHFLOW_FIELDS: &str =
    "ts_code,end_date,n_cashflow_act,n_cashflow_inv_act,n_cash_flows_fnc_act";
const INDICATOR_FIELDS: &str =
    "ts_code,end_date,eps,roe,roa,grossprofit_margin,debt_to_assets,current_ratio,quick_ratio";
const NEWS_FIELDS: &str = "datetime,title,content,channels";

const DATE_FORMAT: &str = "%Y%m%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    api_name: &'a str,
    token: &'a str,
    params: Value,
    fields: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<Table>,
}

/// Column-oriented table as returned by the API
#[derive(Debug, Default, Deserialize)]
struct Table {
    fields: Vec<String>,
    #[serde(default)]
    items: Vec<Vec<Value>>,
}

impl Table {
    /// Decode each row into `T`, skipping rows that do not fit
    fn records<T: DeserializeOwned>(self, api_name: &str) -> Vec<T> {
        let Table { fields, items } = self;
        items
            .into_iter()
            .filter_map(|row| {
                let record: Map<String, Value> = fields.iter().cloned().zip(row).collect();
                match serde_json::from_value(Value::Object(record)) {
                    Ok(parsed) => Some(parsed),
                    Err(e) => {
                        warn!(api_name, error = %e, "Skipping malformed row");
                        None
                    }
                }
            })
            .collect()
    }
}

/// Tushare Pro client
#[derive(Debug, Clone)]
pub struct TushareClient {
    client: Client,
    token: String,
    rate_limiter: SharedRateLimiter,
    history_days: i64,
    news_days: i64,
    news_limit: usize,
}

impl TushareClient {
    /// Create a client with `rate_limit` requests per minute
    pub fn new(token: impl Into<String>, rate_limit: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(rate_limit).unwrap_or(DEFAULT_RATE_LIMIT));
        let defaults = EquityConfig::default();

        Self {
            client: Client::new(),
            token: token.into(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            history_days: i64::from(defaults.history_days),
            news_days: i64::from(defaults.news_days),
            news_limit: defaults.news_limit,
        }
    }

    /// Create a client from the run configuration
    pub fn from_config(config: &EquityConfig) -> Result<Self> {
        let token = config
            .tushare_token
            .clone()
            .ok_or_else(|| EquityError::ConfigError("TUSHARE_TOKEN is not set".to_string()))?;

        let client = Client::builder().timeout(config.call_timeout).build()?;
        let mut tushare = Self::new(token, config.tushare_rate_limit);
        tushare.client = client;
        tushare.history_days = i64::from(config.history_days);
        tushare.news_days = i64::from(config.news_days);
        tushare.news_limit = config.news_limit;
        Ok(tushare)
    }

    /// Query one table
    ///
    /// An API-level refusal (insufficient points, unknown code) yields an
    /// empty table and a warning. Transport failures are errors.
    async fn query<T: DeserializeOwned>(
        &self,
        api_name: &str,
        params: Value,
        fields: &str,
    ) -> Result<Vec<T>> {
        self.rate_limiter.until_ready().await;

        let request = ApiRequest {
            api_name,
            token: &self.token,
            params,
            fields,
        };
        let response = self.client.post(BASE_URL).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(EquityError::DataSource(format!(
                "{api_name}: HTTP error {}",
                response.status()
            )));
        }

        let body: ApiResponse = response.json().await?;
        let rows = Self::table_rows(api_name, body);
        debug!(api_name, rows = rows.len(), "Tushare query completed");
        Ok(rows)
    }

    fn table_rows<T: DeserializeOwned>(api_name: &str, body: ApiResponse) -> Vec<T> {
        if body.code != 0 {
            warn!(
                api_name,
                code = body.code,
                msg = body.msg.as_deref().unwrap_or_default(),
                "Tushare refused the request"
            );
            return Vec::new();
        }
        body.data
            .map(|table| table.records(api_name))
            .unwrap_or_default()
    }

    async fn profile(&self, symbol: &str) -> Result<Option<StockProfile>> {
        let rows = self
            .query("stock_basic", json!({ "ts_code": symbol }), BASIC_FIELDS)
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Daily bars over the history window, oldest first
    async fn daily_history(
        &self,
        symbol: &str,
        now: &DateTime<FixedOffset>,
    ) -> Result<Vec<DailyBar>> {
        let start = *now - ChronoDuration::days(self.history_days);
        let mut bars: Vec<DailyBar> = self
            .query(
                "daily",
                json!({
                    "ts_code": symbol,
                    "start_date": start.format(DATE_FORMAT).to_string(),
                    "end_date": now.format(DATE_FORMAT).to_string(),
                }),
                DAILY_FIELDS,
            )
            .await?;
        bars.sort_by(|a, b| a.trade_date.cmp(&b.trade_date));
        Ok(bars)
    }

    /// Today's bar, or the most recent one when today has none yet
    async fn latest_quote(
        &self,
        symbol: &str,
        now: &DateTime<FixedOffset>,
    ) -> Result<Option<DailyBar>> {
        let today = now.format(DATE_FORMAT).to_string();
        let rows: Vec<DailyBar> = self
            .query(
                "daily",
                json!({ "ts_code": symbol, "trade_date": today }),
                DAILY_FIELDS,
            )
            .await?;
        if let Some(bar) = rows.into_iter().next() {
            return Ok(Some(bar));
        }

        let rows: Vec<DailyBar> = self
            .query(
                "daily",
                json!({ "ts_code": symbol, "end_date": today }),
                DAILY_FIELDS,
            )
            .await?;
        Ok(rows
            .into_iter()
            .max_by(|a, b| a.trade_date.cmp(&b.trade_date)))
    }

    async fn statements(
        &self,
        symbol: &str,
        now: &DateTime<FixedOffset>,
    ) -> Result<Option<FinancialStatements>> {
        let params = json!({
            "ts_code": symbol,
            "end_date": now.format(DATE_FORMAT).to_string(),
        });
        let (income, balance, cashflow) = tokio::try_join!(
            self.query::<IncomeStatement>("income", params.clone(), INCOME_FIELDS),
            self.query::<BalanceSheet>("balancesheet", params.clone(), BALANCE_FIELDS),
            self.query::<CashFlowStatement>("cashflow", params, CASHFLOW_FIELDS),
        )?;

        let statements = FinancialStatements {
            income: income.into_iter().next(),
            balance: balance.into_iter().next(),
            cashflow: cashflow.into_iter().next(),
        };
        Ok((!statements.is_empty()).then_some(statements))
    }

    async fn indicators(
        &self,
        symbol: &str,
        now: &DateTime<FixedOffset>,
    ) -> Result<Vec<FinancialIndicator>> {
        self.query(
            "fina_indicator",
            json!({
                "ts_code": symbol,
                "end_date": now.format(DATE_FORMAT).to_string(),
            }),
            INDICATOR_FIELDS,
        )
        .await
    }

    async fn news(&self, now: &DateTime<FixedOffset>) -> Result<Vec<NewsItem>> {
        let start = *now - ChronoDuration::days(self.news_days);
        let mut items: Vec<NewsItem> = self
            .query(
                "news",
                json!({
                    "src": "sina",
                    "start_date": start.format(DATETIME_FORMAT).to_string(),
                    "end_date": now.format(DATETIME_FORMAT).to_string(),
                }),
                NEWS_FIELDS,
            )
            .await?;
        items.sort_by(|a, b| b.datetime.cmp(&a.datetime));
        items.truncate(self.news_limit);
        Ok(items)
    }

    /// One-minute bars for the last hour, oldest first
    async fn intraday(
        &self,
        symbol: &str,
        now: &DateTime<FixedOffset>,
    ) -> Result<Vec<IntradayBar>> {
        let start = *now - ChronoDuration::hours(1);
        let mut bars: Vec<IntradayBar> = self
            .query(
                "stk_mins",
                json!({
                    "ts_code": symbol,
                    "freq": "1min",
                    "start_date": start.format(DATETIME_FORMAT).to_string(),
                    "end_date": now.format(DATETIME_FORMAT).to_string(),
                }),
                MINUTE_FIELDS,
            )
            .await?;
        bars.sort_by(|a, b| a.trade_time.cmp(&b.trade_time));
        Ok(bars)
    }
}

/// Raw outcome of every endpoint queried for one symbol
struct Fetched {
    profile: Result<Option<StockProfile>>,
    daily: Result<Vec<DailyBar>>,
    statements: Result<Option<FinancialStatements>>,
    indicators: Result<Vec<FinancialIndicator>>,
    quote: Result<Option<DailyBar>>,
    news: Result<Vec<NewsItem>>,
    /// Only queried during a trading session
    intraday: Option<Result<Vec<IntradayBar>>>,
}

/// Failed endpoints of one fetch
#[derive(Default)]
struct Failures {
    attempted: usize,
    errors: Vec<String>,
}

impl Failures {
    /// Keep a successful part; log a failed one and substitute the empty value
    fn recover<T: Default>(&mut self, symbol: &str, part: &str, outcome: Result<T>) -> T {
        self.attempted += 1;
        outcome.unwrap_or_else(|e| {
            warn!(symbol, part, error = %e, "Endpoint failed, continuing without it");
            self.errors.push(format!("{part}: {e}"));
            T::default()
        })
    }

    fn all_failed(&self) -> bool {
        self.attempted > 0 && self.errors.len() == self.attempted
    }
}

impl Fetched {
    /// Build the bundle from whatever succeeded
    ///
    /// Fails only when every queried endpoint failed.
    fn assemble(
        self,
        symbol: &str,
        now: DateTime<FixedOffset>,
        trading: bool,
    ) -> Result<StockContext> {
        let mut failures = Failures::default();
        let profile = failures.recover(symbol, "stock_basic", self.profile);
        let daily = failures.recover(symbol, "daily", self.daily);
        let statements = failures.recover(symbol, "statements", self.statements);
        let indicators = failures.recover(symbol, "fina_indicator", self.indicators);
        let quote = failures.recover(symbol, "quote", self.quote);
        let news = failures.recover(symbol, "news", self.news);
        let intraday = self
            .intraday
            .map(|outcome| failures.recover(symbol, "stk_mins", outcome))
            .filter(|bars| !bars.is_empty());

        if failures.all_failed() {
            return Err(EquityError::DataSource(format!(
                "every endpoint failed for {symbol}: {}",
                failures.errors.join("; ")
            )));
        }

        info!(
            symbol,
            daily = daily.len(),
            news = news.len(),
            failed = failures.errors.len(),
            trading,
            "Market data collected"
        );

        Ok(StockContext {
            symbol: symbol.to_string(),
            fetched_at: now,
            is_trading_session: trading,
            profile,
            daily,
            intraday,
            statements,
            indicators,
            quote,
            news,
        })
    }
}

#[async_trait]
impl MarketDataSource for TushareClient {
    #[instrument(skip(self), fields(source = "tushare"))]
    async fn fetch(&self, symbol: &str) -> Result<StockContext> {
        let now = china_now();
        let trading = is_trading_session(&now);

        let intraday = async {
            if trading {
                Some(self.intraday(symbol, &now).await)
            } else {
                None
            }
        };

        let (profile, daily, statements, indicators, quote, news, intraday) = tokio::join!(
            self.profile(symbol),
            self.daily_history(symbol, &now),
            self.statements(symbol, &now),
            self.indicators(symbol, &now),
            self.latest_quote(symbol, &now),
            self.news(&now),
            intraday,
        );

        Fetched {
            profile,
            daily,
            statements,
            indicators,
            quote,
            news,
            intraday,
        }
        .assemble(symbol, now, trading)
    }

    fn name(&self) -> &str {
        "tushare"
    }
}
