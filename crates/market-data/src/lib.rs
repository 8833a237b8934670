//! Quantfolio Market Data Crate
//!
//! This crate fetches the raw inputs the portfolio optimizer needs:
//! daily price history, the latest price, and company profile data
//! (name, sector) for plain ticker symbols.
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |  Optimizer core  |  (MarketDataAdapter facade, retries, cache)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |    Provider      |  (Yahoo Finance)
//! +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! |     Quote        |     |  AssetProfile    |
//! +------------------+     +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`Quote`] - Market data quote with OHLCV data
//! - [`AssetProfile`] - Provider-sourced profile data (name, sector, industry)
//! - [`MarketDataProvider`] - Trait implemented by every data source
//! - [`MarketDataError`] - Error taxonomy with a [`RetryClass`] per variant

pub mod errors;
pub mod models;
pub mod provider;

pub use errors::{MarketDataError, RetryClass};
pub use models::{AssetProfile, Quote};
pub use provider::yahoo::YahooProvider;
pub use provider::{MarketDataProvider, RateLimit};
