//! Provider-backed implementation of [`MarketDataAdapter`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveTime, TimeZone, Utc};
use log::{debug, warn};
use num_traits::ToPrimitive;
use quantfolio_market_data::MarketDataProvider;
use rust_decimal::Decimal;
use tokio::sync::Semaphore;

use super::history_cache::HistoryCache;
use super::market_data_model::{AssetSeries, CompanyInfo, HistoryWindow, PricePoint};
use super::market_data_traits::MarketDataAdapter;
use crate::constants::UNKNOWN_SECTOR;
use crate::errors::MarketDataError;

/// Timeouts and retry budget for provider calls.
#[derive(Clone, Debug)]
pub struct MarketDataSettings {
    /// Upper bound on a single provider call.
    pub fetch_timeout: Duration,
    /// Total attempts per call, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled on every further attempt.
    pub backoff_base: Duration,
}

impl Default for MarketDataSettings {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            max_attempts: 3,
            backoff_base: Duration::from_millis(200),
        }
    }
}

/// Service that fetches optimizer inputs from a market data provider.
pub struct MarketDataService {
    provider: Arc<dyn MarketDataProvider>,
    cache: Option<Arc<HistoryCache>>,
    settings: MarketDataSettings,
    /// In-flight call cap taken from the provider's rate limit.
    permits: Semaphore,
}

impl MarketDataService {
    pub fn new(provider: Arc<dyn MarketDataProvider>, settings: MarketDataSettings) -> Self {
        let permits = Semaphore::new(provider.rate_limit().max_concurrency.max(1));
        Self {
            provider,
            cache: None,
            settings,
            permits,
        }
    }

    /// Attach a shared history cache.
    pub fn with_cache(mut self, cache: Arc<HistoryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Runs `call` under the per-call timeout, retrying transient failures
    /// with exponential backoff.
    async fn with_retry<T, F, Fut>(
        &self,
        operation: &str,
        symbol: &str,
        mut call: F,
    ) -> Result<T, MarketDataError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, MarketDataError>>,
    {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let permit = self.permits.acquire().await.ok();
            let outcome = match tokio::time::timeout(self.settings.fetch_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(MarketDataError::Timeout {
                    provider: self.provider.id().to_string(),
                }),
            };
            drop(permit);

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.retry_class().is_retryable() && attempt < max_attempts => {
                    let delay = self.settings.backoff_base * 2u32.saturating_pow(attempt - 1);
                    debug!(
                        "{} for {} failed (attempt {}/{}): {}; retrying in {:?}",
                        operation, symbol, attempt, max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl MarketDataAdapter for MarketDataService {
    async fn price_history(
        &self,
        symbol: &str,
        window: HistoryWindow,
    ) -> Result<AssetSeries, MarketDataError> {
        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get(symbol, window)) {
            debug!("History cache hit for {}", symbol);
            return Ok(cached);
        }

        let start = Utc.from_utc_datetime(&window.start.and_time(NaiveTime::MIN));
        let end = Utc.from_utc_datetime(&window.end.and_time(NaiveTime::MIN));

        let quotes = self
            .with_retry("price history", symbol, || {
                self.provider.get_historical_quotes(symbol, start, end)
            })
            .await?;

        let series = AssetSeries::new(
            symbol,
            quotes.iter().filter_map(|q| {
                q.close.to_f64().map(|price| PricePoint {
                    date: q.trading_date(),
                    price,
                })
            }),
        );

        if series.is_empty() {
            return Err(MarketDataError::NoDataForRange);
        }

        if let Some(cache) = &self.cache {
            cache.insert(window, series.clone());
        }

        Ok(series)
    }

    async fn current_price(&self, symbol: &str) -> Result<Decimal, MarketDataError> {
        let quote = self
            .with_retry("latest quote", symbol, || {
                self.provider.get_latest_quote(symbol)
            })
            .await?;
        Ok(quote.close)
    }

    async fn company_info(&self, symbol: &str) -> Result<CompanyInfo, MarketDataError> {
        let profile = self
            .with_retry("profile", symbol, || self.provider.get_profile(symbol))
            .await?;

        let name = profile
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| symbol.to_string());
        let sector = profile
            .sector
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| {
                warn!("No sector reported for {}", symbol);
                UNKNOWN_SECTOR.to_string()
            });

        Ok(CompanyInfo { name, sector })
    }
}
