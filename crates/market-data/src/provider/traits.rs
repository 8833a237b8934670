//! Market data provider trait definitions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::MarketDataError;
use crate::models::{AssetProfile, Quote};

use super::capabilities::RateLimit;

/// Trait for market data providers.
///
/// Implement this trait to add support for a new market data source.
/// Symbols are plain provider tickers (e.g. `AAPL`, `SPY`).
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use quantfolio_market_data::provider::{MarketDataProvider, RateLimit};
///
/// struct CsvProvider {
///     root: PathBuf,
/// }
///
/// #[async_trait]
/// impl MarketDataProvider for CsvProvider {
///     fn id(&self) -> &'static str {
///         "CSV"
///     }
///
///     // ... implement quote methods
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "YAHOO". Used for logging and
    /// error attribution.
    fn id(&self) -> &'static str;

    /// Rate limiting configuration.
    fn rate_limit(&self) -> RateLimit {
        RateLimit::default()
    }

    /// Fetch the latest quote for a symbol.
    async fn get_latest_quote(&self, symbol: &str) -> Result<Quote, MarketDataError>;

    /// Fetch historical daily quotes for a symbol.
    ///
    /// # Arguments
    ///
    /// * `symbol` - Provider ticker
    /// * `start` - Start of the date range (inclusive)
    /// * `end` - End of the date range (inclusive)
    ///
    /// # Returns
    ///
    /// Quotes ordered by timestamp ascending, or `NoDataForRange` when the
    /// symbol exists but has nothing in the window.
    async fn get_historical_quotes(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Quote>, MarketDataError>;

    /// Fetch asset profile information.
    ///
    /// Default implementation returns `NotSupported`.
    async fn get_profile(&self, symbol: &str) -> Result<AssetProfile, MarketDataError> {
        let _ = symbol;
        Err(MarketDataError::NotSupported {
            operation: "profile".to_string(),
            provider: self.id().to_string(),
        })
    }
}
