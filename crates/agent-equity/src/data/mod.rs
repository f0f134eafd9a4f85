//! Market data: the collected bundle, its source and the snapshot cache

pub mod cache;
pub mod model;
pub mod session;
pub mod source;
pub mod symbol;
pub mod tushare;

pub use cache::SnapshotCache;
pub use model::{
    BalanceSheet, CashFlowStatement, DailyBar, FinancialIndicator, FinancialStatements,
    IncomeStatement, IntradayBar, NewsItem, StockContext, StockProfile,
};
pub use session::{china_now, is_trading_session};
pub use source::MarketDataSource;
pub use symbol::{bare_code, normalize_symbol};
pub use tushare::TushareClient;
