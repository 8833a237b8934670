#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use argon2::{password_hash::SaltString, Argon2, PasswordHasher};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use quantfolio_market_data::{AssetProfile, MarketDataError, MarketDataProvider, Quote};
use quantfolio_server::{
    api::app_router,
    auth::AuthConfig,
    build_state_with_provider,
    config::{Config, MarketDataConfig, OptimizerConfig},
};
use rand::{rngs::OsRng, rngs::StdRng, Rng, SeedableRng};
use rust_decimal::Decimal;
use tower::ServiceExt;

pub const SECRET: [u8; 32] = [42u8; 32];

// ============================================================================
// Mock Provider
// ============================================================================

struct Asset {
    name: &'static str,
    sector: &'static str,
    closes: Vec<f64>,
}

/// In-memory provider with a fixed universe of seeded random walks.
pub struct MockProvider {
    assets: HashMap<&'static str, Asset>,
}

impl MockProvider {
    pub fn new() -> Self {
        let universe = [
            ("AAPL", "Apple Inc.", "Technology", 0.0008, 0.018, 1),
            ("MSFT", "Microsoft Corporation", "Technology", 0.0006, 0.015, 2),
            ("XOM", "Exxon Mobil Corporation", "Energy", 0.0003, 0.012, 3),
            ("JNJ", "Johnson & Johnson", "Healthcare", 0.0002, 0.009, 4),
            ("SPY", "SPDR S&P 500 ETF Trust", "Financial Services", 0.0004, 0.01, 5),
        ];
        let assets = universe
            .into_iter()
            .map(|(symbol, name, sector, drift, vol, seed)| {
                (
                    symbol,
                    Asset {
                        name,
                        sector,
                        closes: random_walk(260, drift, vol, seed),
                    },
                )
            })
            .collect();
        Self { assets }
    }

    fn asset(&self, symbol: &str) -> Result<&Asset, MarketDataError> {
        self.assets
            .get(symbol)
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))
    }
}

fn random_walk(days: usize, drift: f64, vol: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut price = 100.0;
    (0..days)
        .map(|i| {
            if i > 0 {
                // Uniform shocks with the requested standard deviation
                let shock: f64 = rng.gen_range(-1.0..1.0) * vol * 3f64.sqrt();
                price *= 1.0 + drift + shock;
            }
            price
        })
        .collect()
}

fn quote(day: usize, close: f64) -> Quote {
    let start = Utc.with_ymd_and_hms(2023, 1, 2, 20, 0, 0).unwrap();
    let close = Decimal::from_f64_retain(close).unwrap().round_dp(4);
    Quote::new(
        start + ChronoDuration::days(day as i64),
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

    async fn get_latest_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let asset = self.asset(symbol)?;
        let last = asset.closes.len() - 1;
        Ok(quote(last, asset.closes[last]))
    }

    async fn get_historical_quotes(
        &self,
        symbol: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<Quote>, MarketDataError> {
        let asset = self.asset(symbol)?;
        Ok(asset
            .closes
            .iter()
            .enumerate()
            .map(|(day, close)| quote(day, *close))
            .collect())
    }

    async fn get_profile(&self, symbol: &str) -> Result<AssetProfile, MarketDataError> {
        let asset = self.asset(symbol)?;
        Ok(AssetProfile::with_name(asset.name).sector(asset.sector))
    }
}

// ============================================================================
// Router helpers
// ============================================================================

pub fn hash_password(password: &str) -> String {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .unwrap()
        .to_string()
}

pub fn test_config(password_hash: Option<String>) -> Config {
    Config {
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        cors_allow: vec!["*".to_string()],
        request_timeout: Duration::from_secs(30),
        auth: AuthConfig {
            password_hash,
            jwt_secret: SECRET.to_vec(),
            access_token_ttl: Duration::from_secs(3600),
        },
        optimizer: OptimizerConfig::default(),
        market_data: MarketDataConfig::default(),
    }
}

pub fn build_router(config: &Config) -> Router {
    let state = build_state_with_provider(config, Arc::new(MockProvider::new())).unwrap();
    app_router(state, config)
}

/// Mints a token the way an upstream identity service sharing the secret
/// would.
pub fn external_token(user_id: &str, expires_in: i64) -> String {
    let now = Utc::now().timestamp();
    let claims = serde_json::json!({
        "user_id": user_id,
        "roles": ["User"],
        "iat": now,
        "exp": now + expires_in,
        "aud": "StockTradingClient",
    });
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(&SECRET),
    )
    .unwrap()
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into()));
    (status, json)
}
