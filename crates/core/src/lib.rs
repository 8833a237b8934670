//! Quantfolio Core - portfolio allocation under Modern Portfolio Theory.
//!
//! The crate turns a list of symbols, an investment amount and optional
//! constraints into a weight vector, share-level allocations and a risk
//! report. Price data arrives through the [`market_data::MarketDataAdapter`]
//! trait so the numeric pipeline never talks to a provider directly.
//!
//! ```text
//! MarketDataAdapter -> ReturnsEstimator -> ConstraintBuilder + WeightOptimizer
//!     -> RiskMetricsEngine -> AllocationBuilder -> SuggestionGenerator
//! ```

pub mod constants;
pub mod errors;
pub mod market_data;
pub mod optimization;

pub use optimization::*;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
