//! Market-data collaborator interface

use crate::data::model::StockContext;
use crate::error::Result;
use async_trait::async_trait;

/// Source of per-security market data
///
/// "No data found" is not an error: implementations return a bundle with the
/// affected parts left empty. Only transport failures are returned as `Err`.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Collect everything known about `symbol`
    async fn fetch(&self, symbol: &str) -> Result<StockContext>;

    /// Name used in logs
    fn name(&self) -> &str;
}
