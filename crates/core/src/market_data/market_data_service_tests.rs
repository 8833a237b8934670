//! Unit tests for the provider-backed market data service.

use super::*;
use crate::errors::MarketDataError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use quantfolio_market_data::{AssetProfile, MarketDataProvider, Quote, RateLimit};
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Mock Provider
// ============================================================================

/// Fails the first `transient_failures` history calls with a rate limit.
struct MockProvider {
    history_calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    max_concurrency: usize,
    transient_failures: usize,
    delay: Option<Duration>,
    profile: Option<AssetProfile>,
}

impl MockProvider {
    fn new() -> Self {
        Self {
            history_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            max_concurrency: 5,
            transient_failures: 0,
            delay: None,
            profile: None,
        }
    }

    fn calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }
}

fn quote(day: u32, close: rust_decimal::Decimal) -> Quote {
    Quote::new(
        Utc.with_ymd_and_hms(2024, 5, day, 20, 0, 0).unwrap(),
        close,
        "USD".to_string(),
        "MOCK".to_string(),
    )
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    fn id(&self) -> &'static str {
        "MOCK"
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            max_concurrency: self.max_concurrency,
        }
    }

    async fn get_latest_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        if symbol == "GONE" {
            return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
        }
        Ok(quote(31, dec!(187.25)))
    }

    async fn get_historical_quotes(
        &self,
        symbol: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<Quote>, MarketDataError> {
        let call = self.history_calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if symbol == "GONE" {
            return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
        }
        if call < self.transient_failures {
            return Err(MarketDataError::RateLimited {
                provider: "MOCK".to_string(),
            });
        }
        Ok(vec![quote(2, dec!(101.5)), quote(1, dec!(100)), quote(3, dec!(99.25))])
    }

    async fn get_profile(&self, symbol: &str) -> Result<AssetProfile, MarketDataError> {
        self.profile
            .clone()
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))
    }
}

fn fast_settings() -> MarketDataSettings {
    MarketDataSettings {
        fetch_timeout: Duration::from_millis(500),
        max_attempts: 3,
        backoff_base: Duration::from_millis(1),
    }
}

fn window() -> HistoryWindow {
    HistoryWindow::trailing(NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(), 730)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_price_history_is_sorted_by_date() {
    let service = MarketDataService::new(Arc::new(MockProvider::new()), fast_settings());

    let series = service.price_history("AAPL", window()).await.unwrap();

    let prices: Vec<f64> = series.points.iter().map(|p| p.price).collect();
    assert_eq!(prices, vec![100.0, 101.5, 99.25]);
    assert_eq!(series.symbol, "AAPL");
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let provider = Arc::new(MockProvider {
        transient_failures: 2,
        ..MockProvider::new()
    });
    let service = MarketDataService::new(provider.clone(), fast_settings());

    let series = service.price_history("AAPL", window()).await.unwrap();

    assert_eq!(series.len(), 3);
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn test_retry_budget_is_bounded() {
    let provider = Arc::new(MockProvider {
        transient_failures: 10,
        ..MockProvider::new()
    });
    let service = MarketDataService::new(provider.clone(), fast_settings());

    let err = service.price_history("AAPL", window()).await.unwrap_err();

    assert!(matches!(err, MarketDataError::RateLimited { .. }));
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn test_terminal_errors_are_not_retried() {
    let provider = Arc::new(MockProvider::new());
    let service = MarketDataService::new(provider.clone(), fast_settings());

    let err = service.price_history("GONE", window()).await.unwrap_err();

    assert!(matches!(err, MarketDataError::SymbolNotFound(_)));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let provider = Arc::new(MockProvider {
        delay: Some(Duration::from_millis(200)),
        ..MockProvider::new()
    });
    let settings = MarketDataSettings {
        fetch_timeout: Duration::from_millis(20),
        max_attempts: 1,
        backoff_base: Duration::from_millis(1),
    };
    let service = MarketDataService::new(provider, settings);

    let err = service.price_history("AAPL", window()).await.unwrap_err();

    assert!(matches!(err, MarketDataError::Timeout { .. }));
}

#[tokio::test]
async fn test_concurrent_calls_respect_provider_limit() {
    let provider = Arc::new(MockProvider {
        delay: Some(Duration::from_millis(20)),
        max_concurrency: 2,
        ..MockProvider::new()
    });
    let service = MarketDataService::new(provider.clone(), fast_settings());

    let symbols = ["AAPL", "MSFT", "XOM", "JNJ", "KO", "PG"];
    let results = futures::future::join_all(
        symbols
            .iter()
            .map(|symbol| service.price_history(symbol, window())),
    )
    .await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(provider.calls(), 6);
    assert_eq!(provider.peak_in_flight.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_cache_serves_repeat_requests() {
    let provider = Arc::new(MockProvider::new());
    let cache = Arc::new(HistoryCache::new(Duration::from_secs(60), 16));
    let service =
        MarketDataService::new(provider.clone(), fast_settings()).with_cache(cache.clone());

    let first = service.price_history("AAPL", window()).await.unwrap();
    let second = service.price_history("AAPL", window()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(provider.calls(), 1);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_current_price_returns_close() {
    let service = MarketDataService::new(Arc::new(MockProvider::new()), fast_settings());
    assert_eq!(service.current_price("AAPL").await.unwrap(), dec!(187.25));
    assert!(service.current_price("GONE").await.is_err());
}

#[tokio::test]
async fn test_company_info_defaults_missing_sector() {
    let provider = Arc::new(MockProvider {
        profile: Some(AssetProfile::with_name("Apple Inc.")),
        ..MockProvider::new()
    });
    let service = MarketDataService::new(provider, fast_settings());

    let info = service.company_info("AAPL").await.unwrap();

    assert_eq!(info.name, "Apple Inc.");
    assert_eq!(info.sector, "Unknown");
}

#[tokio::test]
async fn test_company_info_propagates_missing_profile() {
    let service = MarketDataService::new(Arc::new(MockProvider::new()), fast_settings());
    assert!(service.company_info("AAPL").await.is_err());
}
