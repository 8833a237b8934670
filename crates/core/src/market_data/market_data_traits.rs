use async_trait::async_trait;
use rust_decimal::Decimal;

use super::market_data_model::{AssetSeries, CompanyInfo, HistoryWindow};
use crate::errors::MarketDataError;

/// Source of the per-symbol inputs an optimization needs.
///
/// Each call covers a single symbol so callers can fan out concurrently
/// and decide per symbol whether a failure is fatal.
#[async_trait]
pub trait MarketDataAdapter: Send + Sync {
    /// Daily adjusted-close history within `window`.
    async fn price_history(
        &self,
        symbol: &str,
        window: HistoryWindow,
    ) -> Result<AssetSeries, MarketDataError>;

    /// Most recent price.
    async fn current_price(&self, symbol: &str) -> Result<Decimal, MarketDataError>;

    /// Company name and sector.
    async fn company_info(&self, symbol: &str) -> Result<CompanyInfo, MarketDataError>;
}
