//! Portfolio risk measures derived from weights and historical returns.

use std::collections::HashMap;

use chrono::NaiveDate;
use log::warn;
use nalgebra::DVector;

use super::optimization_model::{OptimizationNotice, RiskMetrics};
use super::returns_estimator::ReturnsEstimate;
use crate::constants::{
    DEFAULT_BETA, DEFAULT_MAX_DRAWDOWN, DEFAULT_VALUE_AT_RISK, MIN_BENCHMARK_OVERLAP,
    RISK_FREE_RATE, TRADING_DAYS_PER_YEAR,
};
use crate::market_data::AssetSeries;

const VAR_PERCENTILE: f64 = 0.05;
const MIN_VOLATILITY: f64 = 1e-12;

/// Outcome of a beta estimate against the benchmark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BetaEstimate {
    Estimated(f64),
    /// Too few overlapping observations; beta defaults to 1.0.
    Insufficient { overlap: usize },
}

impl BetaEstimate {
    pub fn value(&self) -> f64 {
        match self {
            BetaEstimate::Estimated(beta) => *beta,
            BetaEstimate::Insufficient { .. } => DEFAULT_BETA,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RiskMetricsEngine {
    risk_free_rate: f64,
    trading_days: f64,
    min_benchmark_overlap: usize,
}

impl Default for RiskMetricsEngine {
    fn default() -> Self {
        Self::new(RISK_FREE_RATE, TRADING_DAYS_PER_YEAR)
    }
}

impl RiskMetricsEngine {
    pub fn new(risk_free_rate: f64, trading_days: f64) -> Self {
        Self {
            risk_free_rate,
            trading_days,
            min_benchmark_overlap: MIN_BENCHMARK_OVERLAP,
        }
    }

    /// Computes the full risk report.
    ///
    /// `benchmark` is the benchmark price history, or the reason it could not
    /// be fetched.
    pub fn compute(
        &self,
        weights: &[f64],
        estimate: &ReturnsEstimate,
        benchmark_symbol: &str,
        benchmark: std::result::Result<&AssetSeries, String>,
    ) -> (RiskMetrics, Vec<OptimizationNotice>) {
        let w = DVector::from_column_slice(weights);
        let mut notices = Vec::new();

        let expected_return = estimate.expected_returns.dot(&w);
        let annual_cov = estimate.annualized_covariance(self.trading_days);
        let volatility = w.dot(&(&annual_cov * &w)).max(0.0).sqrt();
        let sharpe_ratio = self.sharpe_ratio(expected_return, volatility);

        let daily = portfolio_returns(weights, estimate);
        let values: Vec<f64> = daily.iter().map(|(_, r)| *r).collect();

        let beta = match benchmark {
            Ok(series) => match self.beta(&daily, series) {
                BetaEstimate::Estimated(beta) => beta,
                BetaEstimate::Insufficient { overlap } => {
                    warn!(
                        "Only {} overlapping dates with {}; using default beta",
                        overlap, benchmark_symbol
                    );
                    notices.push(OptimizationNotice::BenchmarkInsufficient {
                        symbol: benchmark_symbol.to_string(),
                        overlap,
                    });
                    DEFAULT_BETA
                }
            },
            Err(reason) => {
                warn!(
                    "Benchmark {} unavailable ({}); using default beta",
                    benchmark_symbol, reason
                );
                notices.push(OptimizationNotice::BenchmarkUnavailable {
                    symbol: benchmark_symbol.to_string(),
                    reason,
                });
                DEFAULT_BETA
            }
        };

        let metrics = RiskMetrics {
            portfolio_volatility: volatility,
            value_at_risk_95: value_at_risk(&values, VAR_PERCENTILE),
            expected_return,
            sharpe_ratio,
            max_drawdown: max_drawdown(&values),
            beta,
        };

        (metrics, notices)
    }

    pub fn sharpe_ratio(&self, expected_return: f64, volatility: f64) -> f64 {
        if volatility < MIN_VOLATILITY || !volatility.is_finite() {
            return 0.0;
        }
        (expected_return - self.risk_free_rate) / volatility
    }

    /// Beta of dated portfolio returns against the benchmark's daily returns.
    pub fn beta(&self, portfolio: &[(NaiveDate, f64)], benchmark: &AssetSeries) -> BetaEstimate {
        let benchmark_returns: HashMap<NaiveDate, f64> = benchmark
            .points
            .windows(2)
            .map(|pair| (pair[1].date, pair[1].price / pair[0].price - 1.0))
            .collect();

        let (p, b): (Vec<f64>, Vec<f64>) = portfolio
            .iter()
            .filter_map(|(date, r)| benchmark_returns.get(date).map(|br| (*r, *br)))
            .unzip();

        if p.len() < self.min_benchmark_overlap {
            return BetaEstimate::Insufficient { overlap: p.len() };
        }

        let variance = sample_variance(&b);
        if variance <= 0.0 || !variance.is_finite() {
            return BetaEstimate::Estimated(DEFAULT_BETA);
        }
        BetaEstimate::Estimated(sample_covariance(&p, &b) / variance)
    }
}

/// Weighted daily portfolio returns `R · w`, keyed by return date.
pub fn portfolio_returns(weights: &[f64], estimate: &ReturnsEstimate) -> Vec<(NaiveDate, f64)> {
    let w = DVector::from_column_slice(weights);
    let daily = &estimate.returns * &w;
    estimate
        .dates
        .iter()
        .copied()
        .zip(daily.iter().copied())
        .collect()
}

/// Linear-interpolated percentile (`q` in `[0, 1]`) of unsorted values.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Historical-simulation VaR: absolute value of the `percentile`-th
/// quantile of daily returns. Defaults to 0.05 without usable data.
pub fn value_at_risk(returns: &[f64], percentile_level: f64) -> f64 {
    percentile(returns, percentile_level)
        .map(f64::abs)
        .unwrap_or(DEFAULT_VALUE_AT_RISK)
}

/// Largest peak-to-trough decline of the compounded return curve.
/// Defaults to 0.10 without usable data.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    if returns.is_empty() || returns.iter().any(|r| !r.is_finite()) {
        return DEFAULT_MAX_DRAWDOWN;
    }

    let mut wealth = 1.0;
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;

    for r in returns {
        wealth *= 1.0 + r;
        peak = peak.max(wealth);
        if peak > 0.0 {
            worst = worst.min((wealth - peak) / peak);
        }
    }

    worst.abs()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_variance(values: &[f64]) -> f64 {
    sample_covariance(values, values)
}

fn sample_covariance(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len();
    if n < 2 {
        return 0.0;
    }
    let (mean_a, mean_b) = (mean(a), mean(b));
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - mean_a) * (y - mean_b))
        .sum::<f64>()
        / (n - 1) as f64
}
