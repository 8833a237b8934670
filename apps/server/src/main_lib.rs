use std::sync::Arc;

use crate::{auth::AuthManager, config::Config};
use quantfolio_core::{
    market_data::{HistoryCache, MarketDataService, MarketDataSettings},
    OptimizationService, OptimizationServiceTrait, OptimizerSettings,
};
use quantfolio_market_data::{MarketDataProvider, YahooProvider};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub struct AppState {
    pub optimization_service: Arc<dyn OptimizationServiceTrait>,
    pub history_cache: Arc<HistoryCache>,
    pub auth: Arc<AuthManager>,
}

pub fn init_tracing() {
    let log_format = std::env::var("QF_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let provider: Arc<dyn MarketDataProvider> = Arc::new(YahooProvider::new()?);
    tracing::info!("Market data provider: {}", provider.id());
    build_state_with_provider(config, provider)
}

/// Wires the services around an explicit market data provider.
pub fn build_state_with_provider(
    config: &Config,
    provider: Arc<dyn MarketDataProvider>,
) -> anyhow::Result<Arc<AppState>> {
    let history_cache = Arc::new(HistoryCache::new(
        config.market_data.cache_ttl,
        config.market_data.cache_capacity,
    ));

    let market_data = Arc::new(
        MarketDataService::new(
            provider,
            MarketDataSettings {
                fetch_timeout: config.market_data.fetch_timeout,
                max_attempts: config.market_data.max_attempts,
                ..MarketDataSettings::default()
            },
        )
        .with_cache(history_cache.clone()),
    );

    let optimizer = &config.optimizer;
    let optimization_service: Arc<dyn OptimizationServiceTrait> =
        Arc::new(OptimizationService::new(
            market_data,
            OptimizerSettings {
                risk_free_rate: optimizer.risk_free_rate,
                history_days: optimizer.history_days,
                benchmark_symbol: optimizer.benchmark_symbol.clone(),
                max_iterations: optimizer.max_iterations,
                request_timeout: config.request_timeout,
                ..OptimizerSettings::default()
            },
        ));

    let auth = Arc::new(AuthManager::new(&config.auth)?);
    if !auth.requires_password() {
        tracing::info!("Password login disabled; bearer tokens must be issued externally");
    }

    Ok(Arc::new(AppState {
        optimization_service,
        history_cache,
        auth,
    }))
}
