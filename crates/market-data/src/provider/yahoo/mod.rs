//! Yahoo Finance market data provider.
//!
//! Daily history and latest prices come from the chart API through
//! `yahoo_finance_api`; company name and sector come from the quoteSummary
//! API, which needs a cookie/crumb pair.

mod models;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{header, StatusCode};
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use urlencoding::encode;
use yahoo_finance_api as yahoo;

use crate::errors::MarketDataError;
use crate::models::{AssetProfile, Quote};
use crate::provider::{MarketDataProvider, RateLimit};

use models::{YahooQuoteSummaryResponse, YahooQuoteSummaryResult};

const PROVIDER_ID: &str = "YAHOO";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

// ============================================================================
// Crumb/Cookie Authentication
// ============================================================================

/// Cached Yahoo authentication data
#[derive(Debug, Clone)]
struct CrumbData {
    cookie: String,
    crumb: String,
}

fn provider_error(message: impl Into<String>) -> MarketDataError {
    MarketDataError::ProviderError {
        provider: PROVIDER_ID.to_string(),
        message: message.into(),
    }
}

// ============================================================================
// Yahoo Provider
// ============================================================================

/// Yahoo Finance market data provider.
pub struct YahooProvider {
    connector: yahoo::YahooConnector,
    client: reqwest::Client,
    crumb: RwLock<Option<CrumbData>>,
}

impl YahooProvider {
    /// Create a new Yahoo Finance provider.
    pub fn new() -> Result<Self, MarketDataError> {
        let connector = yahoo::YahooConnector::new().map_err(|e| {
            provider_error(format!("Failed to initialize Yahoo connector: {}", e))
        })?;
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            connector,
            client,
            crumb: RwLock::new(None),
        })
    }

    // ========================================================================
    // Crumb/Cookie Authentication
    // ========================================================================

    /// Ensure we have a valid Yahoo authentication crumb.
    async fn ensure_crumb(&self) -> Result<CrumbData, MarketDataError> {
        if let Some(crumb) = self.crumb.read().await.as_ref() {
            return Ok(crumb.clone());
        }
        self.fetch_crumb().await
    }

    /// Fetch a new Yahoo authentication crumb.
    async fn fetch_crumb(&self) -> Result<CrumbData, MarketDataError> {
        // Step 1: Get cookie from fc.yahoo.com
        let response = self
            .client
            .get("https://fc.yahoo.com")
            .send()
            .await
            .map_err(|e| provider_error(format!("Failed to get cookie: {}", e)))?;

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split_once(';').map(|(v, _)| v.to_string()))
            .ok_or_else(|| provider_error("Failed to parse Yahoo cookie"))?;

        // Step 2: Get crumb using cookie
        let crumb = self
            .client
            .get("https://query1.finance.yahoo.com/v1/test/getcrumb")
            .header(header::COOKIE, &cookie)
            .send()
            .await
            .map_err(|e| provider_error(format!("Failed to get crumb: {}", e)))?
            .text()
            .await
            .map_err(|e| provider_error(format!("Failed to read crumb: {}", e)))?;

        let crumb_data = CrumbData { cookie, crumb };
        *self.crumb.write().await = Some(crumb_data.clone());

        Ok(crumb_data)
    }

    /// Clear the cached crumb (used when authentication fails)
    async fn clear_crumb(&self) {
        *self.crumb.write().await = None;
    }

    // ========================================================================
    // Quote Fetching
    // ========================================================================

    fn chrono_to_offset_datetime(dt: DateTime<Utc>) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(dt.timestamp())
            .unwrap_or_else(|_| OffsetDateTime::now_utc())
    }

    fn map_yahoo_error(symbol: &str, e: yahoo::YahooError) -> MarketDataError {
        if matches!(e, yahoo::YahooError::NoQuotes | yahoo::YahooError::NoResult) {
            MarketDataError::SymbolNotFound(symbol.to_string())
        } else {
            provider_error(e.to_string())
        }
    }

    /// Convert a Yahoo quote to our Quote model, preferring the adjusted close.
    fn yahoo_quote_to_quote(yahoo_quote: yahoo::Quote) -> Result<Quote, MarketDataError> {
        let timestamp: DateTime<Utc> = Utc
            .timestamp_opt(yahoo_quote.timestamp as i64, 0)
            .single()
            .ok_or_else(|| MarketDataError::ValidationFailed {
                message: format!("Invalid timestamp: {}", yahoo_quote.timestamp),
            })?;

        let raw_close = if yahoo_quote.adjclose.is_finite() && yahoo_quote.adjclose > 0.0 {
            yahoo_quote.adjclose
        } else {
            yahoo_quote.close
        };
        let close = Decimal::from_f64_retain(raw_close).ok_or_else(|| {
            MarketDataError::ValidationFailed {
                message: format!("Failed to convert close price {} to Decimal", raw_close),
            }
        })?;

        let mut quote = Quote::new(timestamp, close, "USD".to_string(), PROVIDER_ID.to_string());
        quote.open = Decimal::from_f64_retain(yahoo_quote.open);
        quote.high = Decimal::from_f64_retain(yahoo_quote.high);
        quote.low = Decimal::from_f64_retain(yahoo_quote.low);
        quote.volume = Some(Decimal::from(yahoo_quote.volume));
        Ok(quote)
    }

    async fn fetch_quote_summary(
        &self,
        symbol: &str,
        modules: &str,
    ) -> Result<YahooQuoteSummaryResult, MarketDataError> {
        let crumb = self.ensure_crumb().await?;

        let url = format!(
            "https://query1.finance.yahoo.com/v10/finance/quoteSummary/{}?modules={}&crumb={}",
            encode(symbol),
            modules,
            encode(&crumb.crumb)
        );

        let response = self
            .client
            .get(&url)
            .header(header::COOKIE, &crumb.cookie)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => {
                self.clear_crumb().await;
                return Err(provider_error("Yahoo authentication expired"));
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(MarketDataError::RateLimited {
                    provider: PROVIDER_ID.to_string(),
                });
            }
            StatusCode::NOT_FOUND => {
                return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
            }
            _ => {}
        }

        let data: YahooQuoteSummaryResponse = response.json().await.map_err(|e| {
            provider_error(format!("Failed to parse quoteSummary response: {}", e))
        })?;

        data.quote_summary
            .result
            .into_iter()
            .next()
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))
    }

    /// Fetch latest quote using the quoteSummary price module.
    async fn fetch_latest_quote_backup(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let result = self.fetch_quote_summary(symbol, "price").await?;
        let price = result
            .price
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        let close = price
            .regular_market_price
            .as_ref()
            .and_then(|p| p.raw)
            .and_then(Decimal::from_f64_retain)
            .ok_or_else(|| MarketDataError::ValidationFailed {
                message: "No valid price in backup response".to_string(),
            })?;

        let timestamp = price
            .regular_market_time
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or_else(Utc::now);

        Ok(Quote::new(
            timestamp,
            close,
            price.currency.unwrap_or_else(|| "USD".to_string()),
            PROVIDER_ID.to_string(),
        ))
    }

    fn map_quote_summary_to_profile(symbol: &str, result: &YahooQuoteSummaryResult) -> AssetProfile {
        let price = result.price.as_ref();
        let summary = result.summary_profile.as_ref();

        AssetProfile {
            source: Some(PROVIDER_ID.to_string()),
            name: Some(format_name(
                price.and_then(|p| p.long_name.as_deref()),
                price.and_then(|p| p.short_name.as_deref()),
                symbol,
            )),
            quote_type: price
                .and_then(|p| p.quote_type.clone())
                .map(|t| t.to_uppercase()),
            sector: summary
                .and_then(|s| s.sector.as_ref())
                .map(|s| format_sector(s)),
            industry: summary.and_then(|s| s.industry.clone()),
            country: summary.and_then(|s| s.country.clone()),
        }
    }
}

// ============================================================================
// MarketDataProvider Implementation
// ============================================================================

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit { max_concurrency: 10 }
    }

    async fn get_latest_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        debug!("Fetching latest quote for {} from Yahoo", symbol);

        let primary = self
            .connector
            .get_latest_quotes(symbol, "1d")
            .await
            .map_err(|e| Self::map_yahoo_error(symbol, e))
            .and_then(|response| {
                response
                    .last_quote()
                    .map_err(|e| Self::map_yahoo_error(symbol, e))
            })
            .and_then(Self::yahoo_quote_to_quote);

        match primary {
            Ok(quote) => Ok(quote),
            Err(e) => {
                debug!(
                    "Primary quote fetch failed for {}: {}, trying quoteSummary",
                    symbol, e
                );
                self.fetch_latest_quote_backup(symbol).await
            }
        }
    }

    async fn get_historical_quotes(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Quote>, MarketDataError> {
        debug!(
            "Fetching historical quotes for {} from {} to {} from Yahoo",
            symbol,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        );

        let response = self
            .connector
            .get_quote_history(
                symbol,
                Self::chrono_to_offset_datetime(start),
                Self::chrono_to_offset_datetime(end),
            )
            .await
            .map_err(|e| Self::map_yahoo_error(symbol, e))?;

        match response.quotes() {
            Ok(yahoo_quotes) => {
                let quotes: Vec<Quote> = yahoo_quotes
                    .into_iter()
                    .filter_map(|q| match Self::yahoo_quote_to_quote(q) {
                        Ok(quote) => Some(quote),
                        Err(e) => {
                            warn!("Skipping quote for {} due to conversion error: {}", symbol, e);
                            None
                        }
                    })
                    .collect();

                if quotes.is_empty() {
                    return Err(MarketDataError::NoDataForRange);
                }

                Ok(quotes)
            }
            Err(yahoo::YahooError::NoQuotes) => {
                warn!(
                    "No historical quotes returned for '{}' between {} and {}",
                    symbol,
                    start.format("%Y-%m-%d"),
                    end.format("%Y-%m-%d")
                );
                Err(MarketDataError::NoDataForRange)
            }
            Err(e) => Err(provider_error(e.to_string())),
        }
    }

    async fn get_profile(&self, symbol: &str) -> Result<AssetProfile, MarketDataError> {
        debug!("Fetching profile for {} from Yahoo", symbol);
        let result = self
            .fetch_quote_summary(symbol, "price,summaryProfile")
            .await?;
        Ok(Self::map_quote_summary_to_profile(symbol, &result))
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Pick the display name: long name with HTML entities cleaned, then short
/// name, then the ticker itself.
fn format_name(long_name: Option<&str>, short_name: Option<&str>, symbol: &str) -> String {
    let name = long_name.unwrap_or("").replace("&amp;", "&");
    let name = name.trim();

    if name.is_empty() {
        short_name.unwrap_or(symbol).to_string()
    } else {
        name.to_string()
    }
}

/// Convert snake_case sector to Title Case.
fn format_sector(sector: &str) -> String {
    sector
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Tests
// ============================================================================
