/// Trading days used to annualize daily statistics
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Annual risk-free rate used by Sharpe calculations
pub const RISK_FREE_RATE: f64 = 0.02;

/// Calendar days of price history requested per symbol (two years)
pub const DEFAULT_HISTORY_DAYS: i64 = 730;

/// Benchmark index used for portfolio beta
pub const BENCHMARK_SYMBOL: &str = "SPY";

/// Minimum overlapping observations before beta is estimated
pub const MIN_BENCHMARK_OVERLAP: usize = 50;

/// Allowed deviation of the weight sum from 1
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-4;

/// Solver iteration cap
pub const MAX_SOLVER_ITERATIONS: usize = 1000;

/// Sector label for symbols without profile data
pub const UNKNOWN_SECTOR: &str = "Unknown";

/// Rebalance cadence echoed when the caller supplies none
pub const DEFAULT_REBALANCE_FREQUENCY: &str = "monthly";

/// Defaults reported when a risk metric cannot be computed
pub const DEFAULT_VALUE_AT_RISK: f64 = 0.05;
pub const DEFAULT_MAX_DRAWDOWN: f64 = 0.10;
pub const DEFAULT_BETA: f64 = 1.0;
