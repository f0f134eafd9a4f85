//! Configuration for equity analysis runs
//!
//! [`EquityConfig`] is an immutable value built once and shared behind an
//! `Arc`. Every component receives it explicitly.

use crate::error::{EquityError, Result};
use agent_runtime::SamplingParams;
use agent_utils::{env_list, env_parse, env_var};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_MODEL: &str = "deepseek-chat";
const DEFAULT_API_BASE: &str = "https://api.deepseek.com/v1";
const DEFAULT_SMTP_SERVER: &str = "smtp.qq.com";
const DEFAULT_SMTP_PORT: u16 = 587;

/// Securities analysed by the watchlist run unless `STOCK_WATCHLIST` is set
pub const DEFAULT_WATCHLIST: &[&str] = &[
    "601899.SH",
    "002679.SZ",
    "000592.SZ",
    "688122.SH",
    "000663.SZ",
];

const REBUTTAL_TEMPERATURE: f32 = 0.8;
const TRADER_TEMPERATURE: f32 = 0.6;
const RISK_TEMPERATURE: f32 = 0.5;

/// Which session a run belongs to; shown in report headings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    #[default]
    Standard,
    PreMarket,
    PostMarket,
}

impl AnalysisMode {
    pub fn emoji(self) -> &'static str {
        match self {
            Self::Standard => "📊",
            Self::PreMarket => "🌅",
            Self::PostMarket => "🌆",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Standard => "标准分析",
            Self::PreMarket => "开盘前分析",
            Self::PostMarket => "收盘后分析",
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Standard => "standard",
            Self::PreMarket => "pre_market",
            Self::PostMarket => "post_market",
        };
        f.write_str(name)
    }
}

impl FromStr for AnalysisMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "standard" => Ok(Self::Standard),
            "pre_market" | "premarket" => Ok(Self::PreMarket),
            "post_market" | "postmarket" => Ok(Self::PostMarket),
            other => Err(format!("unknown analysis mode: {other}")),
        }
    }
}

/// One scheduled watchlist run
///
/// `cron` uses the six-field form (seconds first) and is evaluated in UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub cron: String,
    pub mode: AnalysisMode,
}

impl ScheduleEntry {
    pub fn new(cron: impl Into<String>, mode: AnalysisMode) -> Self {
        Self {
            cron: cron.into(),
            mode,
        }
    }
}

/// Weekday 07:30 and 12:00 Asia/Shanghai, written in UTC
fn default_schedule() -> Vec<ScheduleEntry> {
    vec![
        ScheduleEntry::new("0 30 23 * * Sun-Thu", AnalysisMode::PreMarket),
        ScheduleEntry::new("0 0 4 * * Mon-Fri", AnalysisMode::Standard),
    ]
}

/// SMTP delivery of batch summaries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_server: String,
    pub smtp_port: u16,

    /// Sender address, also the SMTP login
    pub sender: Option<String>,

    #[serde(skip_serializing)]
    pub password: Option<String>,

    pub recipients: Vec<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_server: DEFAULT_SMTP_SERVER.to_string(),
            smtp_port: DEFAULT_SMTP_PORT,
            sender: None,
            password: None,
            recipients: Vec::new(),
        }
    }
}

impl EmailConfig {
    /// Read `EMAIL_ENABLED`, `SMTP_*`, `SENDER_*` and `RECIPIENT_EMAILS`
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            enabled: env_var("EMAIL_ENABLED").is_some_and(|v| v.eq_ignore_ascii_case("true")),
            smtp_server: env_var("SMTP_SERVER").unwrap_or(defaults.smtp_server),
            smtp_port: env_parse("SMTP_PORT")?.unwrap_or(defaults.smtp_port),
            sender: env_var("SENDER_EMAIL"),
            password: env_var("SENDER_PASSWORD"),
            recipients: env_list("RECIPIENT_EMAILS").unwrap_or_default(),
        })
    }

    /// Enabled with a sender, a password and at least one recipient
    pub fn is_complete(&self) -> bool {
        self.enabled
            && self.sender.is_some()
            && self.password.is_some()
            && !self.recipients.is_empty()
    }
}

/// Configuration for equity analysis runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityConfig {
    /// Chat model used for every role
    pub model: String,

    /// Base URL of the OpenAI-compatible endpoint
    pub api_base: String,

    /// Language-model API key
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Tushare Pro token
    #[serde(skip_serializing)]
    pub tushare_token: Option<String>,

    /// Default sampling temperature
    pub temperature: f32,

    /// Output token budget per call
    pub max_tokens: usize,

    /// Number of debate rounds, at least one
    pub max_debate_rounds: usize,

    /// Days of daily bars to collect
    pub history_days: u32,

    /// Days of news to collect
    pub news_days: u32,

    /// Maximum number of news items kept per security
    pub news_limit: usize,

    /// Securities analysed by the watchlist run
    pub watchlist: Vec<String>,

    pub report_dir: PathBuf,
    pub cache_dir: PathBuf,

    /// Deadline for each language-model and market-data call
    pub call_timeout: Duration,

    /// Securities analysed at once during a batch
    pub batch_concurrency: usize,

    /// Tushare requests per minute
    pub tushare_rate_limit: u32,

    /// Mode used by single and batch runs
    pub mode: AnalysisMode,

    /// Scheduled watchlist runs
    pub schedule: Vec<ScheduleEntry>,

    /// Summary delivery after watchlist runs
    pub email: EmailConfig,
}

impl Default for EquityConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            tushare_token: None,
            temperature: 0.7,
            max_tokens: 4000,
            max_debate_rounds: 2,
            history_days: 60,
            news_days: 7,
            news_limit: 10,
            watchlist: DEFAULT_WATCHLIST.iter().map(ToString::to_string).collect(),
            report_dir: PathBuf::from("reports"),
            cache_dir: PathBuf::from("data/cache"),
            call_timeout: Duration::from_secs(180),
            batch_concurrency: 1,
            tushare_rate_limit: 200,
            mode: AnalysisMode::Standard,
            schedule: default_schedule(),
            email: EmailConfig::default(),
        }
    }
}

impl EquityConfig {
    /// Create a new configuration builder
    pub fn builder() -> EquityConfigBuilder {
        EquityConfigBuilder::default()
    }

    /// Build from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        Self::builder().with_env()?.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(EquityError::ConfigError(
                "model must not be empty".to_string(),
            ));
        }

        if self.max_debate_rounds == 0 {
            return Err(EquityError::ConfigError(
                "max_debate_rounds must be greater than 0".to_string(),
            ));
        }

        if self.batch_concurrency == 0 {
            return Err(EquityError::ConfigError(
                "batch_concurrency must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(EquityError::ConfigError(format!(
                "temperature must be within [0, 2], got {}",
                self.temperature
            )));
        }

        if self.max_tokens == 0 {
            return Err(EquityError::ConfigError(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.tushare_rate_limit == 0 {
            return Err(EquityError::ConfigError(
                "tushare_rate_limit must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Check that both service credentials are present
    pub fn validate_credentials(&self) -> Result<()> {
        if self.api_key.is_none() {
            return Err(EquityError::ConfigError(
                "DEEPSEEK_API_KEY is not set".to_string(),
            ));
        }
        if self.tushare_token.is_none() {
            return Err(EquityError::ConfigError(
                "TUSHARE_TOKEN is not set".to_string(),
            ));
        }
        Ok(())
    }

    /// Sampling used by analysts, researchers and the debate synthesis
    pub fn default_sampling(&self) -> SamplingParams {
        SamplingParams::new(self.temperature, self.max_tokens)
    }

    pub fn rebuttal_sampling(&self) -> SamplingParams {
        self.default_sampling()
            .with_temperature(REBUTTAL_TEMPERATURE)
    }

    pub fn trader_sampling(&self) -> SamplingParams {
        self.default_sampling().with_temperature(TRADER_TEMPERATURE)
    }

    pub fn risk_sampling(&self) -> SamplingParams {
        self.default_sampling().with_temperature(RISK_TEMPERATURE)
    }
}

/// Builder for EquityConfig
#[derive(Debug, Default)]
pub struct EquityConfigBuilder {
    model: Option<String>,
    api_base: Option<String>,
    api_key: Option<String>,
    tushare_token: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<usize>,
    max_debate_rounds: Option<usize>,
    history_days: Option<u32>,
    news_days: Option<u32>,
    news_limit: Option<usize>,
    watchlist: Option<Vec<String>>,
    report_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    call_timeout: Option<Duration>,
    batch_concurrency: Option<usize>,
    tushare_rate_limit: Option<u32>,
    mode: Option<AnalysisMode>,
    schedule: Option<Vec<ScheduleEntry>>,
    email: Option<EmailConfig>,
}

impl EquityConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn tushare_token(mut self, token: impl Into<String>) -> Self {
        self.tushare_token = Some(token.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the number of debate rounds
    pub fn max_debate_rounds(mut self, rounds: usize) -> Self {
        self.max_debate_rounds = Some(rounds);
        self
    }

    pub fn history_days(mut self, days: u32) -> Self {
        self.history_days = Some(days);
        self
    }

    pub fn news_days(mut self, days: u32) -> Self {
        self.news_days = Some(days);
        self
    }

    pub fn news_limit(mut self, limit: usize) -> Self {
        self.news_limit = Some(limit);
        self
    }

    /// Replace the watchlist
    pub fn watchlist<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.watchlist = Some(codes.into_iter().map(Into::into).collect());
        self
    }

    pub fn report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = Some(dir.into());
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Set the per-call deadline
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn batch_concurrency(mut self, concurrency: usize) -> Self {
        self.batch_concurrency = Some(concurrency);
        self
    }

    pub fn tushare_rate_limit(mut self, per_minute: u32) -> Self {
        self.tushare_rate_limit = Some(per_minute);
        self
    }

    pub fn mode(mut self, mode: AnalysisMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn schedule(mut self, entries: Vec<ScheduleEntry>) -> Self {
        self.schedule = Some(entries);
        self
    }

    pub fn email(mut self, email: EmailConfig) -> Self {
        self.email = Some(email);
        self
    }

    /// Fill every field not yet set from the environment
    pub fn with_env(mut self) -> Result<Self> {
        self.model = self.model.or_else(|| env_var("DEEPSEEK_MODEL"));
        self.api_base = self.api_base.or_else(|| env_var("DEEPSEEK_API_BASE"));
        self.api_key = self.api_key.or_else(|| env_var("DEEPSEEK_API_KEY"));
        self.tushare_token = self.tushare_token.or_else(|| env_var("TUSHARE_TOKEN"));
        self.watchlist = self.watchlist.or_else(|| env_list("STOCK_WATCHLIST"));
        self.report_dir = self
            .report_dir
            .or_else(|| env_var("REPORT_DIR").map(PathBuf::from));
        self.cache_dir = self
            .cache_dir
            .or_else(|| env_var("DATA_CACHE_DIR").map(PathBuf::from));

        if self.temperature.is_none() {
            self.temperature = env_parse("LLM_TEMPERATURE")?;
        }
        if self.max_tokens.is_none() {
            self.max_tokens = env_parse("LLM_MAX_TOKENS")?;
        }
        if self.max_debate_rounds.is_none() {
            self.max_debate_rounds = env_parse("MAX_DEBATE_ROUNDS")?;
        }
        if self.history_days.is_none() {
            self.history_days = env_parse("ANALYSIS_HISTORY_DAYS")?;
        }
        if self.call_timeout.is_none() {
            self.call_timeout = env_parse::<u64>("CALL_TIMEOUT_SECS")?.map(Duration::from_secs);
        }
        if self.batch_concurrency.is_none() {
            self.batch_concurrency = env_parse("BATCH_CONCURRENCY")?;
        }
        if self.tushare_rate_limit.is_none() {
            self.tushare_rate_limit = env_parse("TUSHARE_RATE_LIMIT")?;
        }
        if self.mode.is_none() {
            self.mode = env_parse("ANALYSIS_MODE")?;
        }
        if self.email.is_none() {
            self.email = Some(EmailConfig::from_env()?);
        }
        Ok(self)
    }

    /// Build the configuration
    pub fn build(self) -> Result<EquityConfig> {
        let defaults = EquityConfig::default();

        let config = EquityConfig {
            model: self.model.unwrap_or(defaults.model),
            api_base: self.api_base.unwrap_or(defaults.api_base),
            api_key: self.api_key.or(defaults.api_key),
            tushare_token: self.tushare_token.or(defaults.tushare_token),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            max_debate_rounds: self.max_debate_rounds.unwrap_or(defaults.max_debate_rounds),
            history_days: self.history_days.unwrap_or(defaults.history_days),
            news_days: self.news_days.unwrap_or(defaults.news_days),
            news_limit: self.news_limit.unwrap_or(defaults.news_limit),
            watchlist: self.watchlist.unwrap_or(defaults.watchlist),
            report_dir: self.report_dir.unwrap_or(defaults.report_dir),
            cache_dir: self.cache_dir.unwrap_or(defaults.cache_dir),
            call_timeout: self.call_timeout.unwrap_or(defaults.call_timeout),
            batch_concurrency: self.batch_concurrency.unwrap_or(defaults.batch_concurrency),
            tushare_rate_limit: self
                .tushare_rate_limit
                .unwrap_or(defaults.tushare_rate_limit),
            mode: self.mode.unwrap_or(defaults.mode),
            schedule: self.schedule.unwrap_or(defaults.schedule),
            email: self.email.unwrap_or(defaults.email),
        };

        config.validate()?;
        Ok(config)
    }
}
