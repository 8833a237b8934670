//! Market data facade used by the optimizer.
//!
//! Wraps a [`MarketDataProvider`](quantfolio_market_data::MarketDataProvider)
//! with per-call timeouts, bounded retries and a price-history cache, and
//! converts provider quotes into the plain `f64` series the math works on.

mod history_cache;
mod market_data_model;
mod market_data_service;
mod market_data_traits;

pub use history_cache::HistoryCache;
pub use market_data_model::*;
pub use market_data_service::{MarketDataService, MarketDataSettings};
pub use market_data_traits::MarketDataAdapter;

#[cfg(test)]
mod market_data_service_tests;
