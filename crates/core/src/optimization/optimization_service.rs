use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use log::{debug, info, warn};
use rust_decimal::Decimal;

use super::allocation_builder::AllocationBuilder;
use super::constraint_builder::ConstraintBuilder;
use super::optimization_model::{
    CovarianceMethod, OptimizationMetadata, OptimizationNotice, OptimizationRequest,
    OptimizationResult, OptimizationStatus,
};
use super::optimization_traits::OptimizationServiceTrait;
use super::returns_estimator::ReturnsEstimator;
use super::risk_metrics::RiskMetricsEngine;
use super::suggestions::{diversification_score, rebalancing_suggestions};
use super::weight_optimizer::{OptimizationOutcome, WeightOptimizer};
use crate::constants::{
    BENCHMARK_SYMBOL, DEFAULT_HISTORY_DAYS, MAX_SOLVER_ITERATIONS, RISK_FREE_RATE,
    TRADING_DAYS_PER_YEAR,
};
use crate::errors::{Error, Result};
use crate::market_data::{AssetSeries, CompanyInfo, HistoryWindow, MarketDataAdapter};

/// Tunables for a single optimization run.
#[derive(Debug, Clone)]
pub struct OptimizerSettings {
    pub risk_free_rate: f64,
    pub trading_days: f64,
    /// Calendar days of history requested per symbol.
    pub history_days: i64,
    pub benchmark_symbol: String,
    pub max_iterations: usize,
    /// Deadline for the whole request, fetches included.
    pub request_timeout: Duration,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            risk_free_rate: RISK_FREE_RATE,
            trading_days: TRADING_DAYS_PER_YEAR,
            history_days: DEFAULT_HISTORY_DAYS,
            benchmark_symbol: BENCHMARK_SYMBOL.to_string(),
            max_iterations: MAX_SOLVER_ITERATIONS,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Raises the cancel flag when the request future completes or is dropped,
/// so an orphaned solver stops at its next iteration.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Service running the full optimization pipeline against a market data
/// adapter.
pub struct OptimizationService {
    market_data: Arc<dyn MarketDataAdapter>,
    settings: OptimizerSettings,
}

impl OptimizationService {
    pub fn new(market_data: Arc<dyn MarketDataAdapter>, settings: OptimizerSettings) -> Self {
        Self {
            market_data,
            settings,
        }
    }

    pub fn settings(&self) -> &OptimizerSettings {
        &self.settings
    }

    async fn run(
        &self,
        request: OptimizationRequest,
        cancel: Arc<AtomicBool>,
    ) -> Result<OptimizationResult> {
        let request = request.validated()?;
        let objective = request.effective_objective();
        let symbols = request.symbols.clone();
        let window = HistoryWindow::trailing(Utc::now().date_naive(), self.settings.history_days);
        let benchmark_symbol = self.settings.benchmark_symbol.as_str();
        let market_data = &self.market_data;

        debug!(
            "Optimizing {:?} with objective {} over {} to {}",
            symbols, objective, window.start, window.end
        );

        let (histories, prices, companies, benchmark) = tokio::join!(
            join_all(symbols.iter().map(|s| market_data.price_history(s, window))),
            join_all(symbols.iter().map(|s| market_data.current_price(s))),
            join_all(symbols.iter().map(|s| market_data.company_info(s))),
            market_data.price_history(benchmark_symbol, window),
        );

        let mut notices = Vec::new();

        let mut series: Vec<AssetSeries> = Vec::with_capacity(symbols.len());
        let mut missing = Vec::new();
        for (symbol, history) in symbols.iter().zip(histories) {
            match history {
                Ok(s) if !s.is_empty() => series.push(s),
                Ok(_) => {
                    warn!("No price history for {}", symbol);
                    missing.push(symbol.clone());
                }
                Err(e) => {
                    warn!("Failed to fetch price history for {}: {}", symbol, e);
                    missing.push(symbol.clone());
                }
            }
        }
        if !missing.is_empty() {
            return Err(Error::DataUnavailable(missing));
        }

        let mut price_map: HashMap<String, Decimal> = HashMap::with_capacity(symbols.len());
        for (symbol, price) in symbols.iter().zip(prices) {
            match price {
                Ok(p) => {
                    price_map.insert(symbol.clone(), p);
                }
                Err(e) => {
                    warn!("No current price for {}: {}", symbol, e);
                    notices.push(OptimizationNotice::PriceUnavailable {
                        symbol: symbol.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let mut company_map: HashMap<String, CompanyInfo> = HashMap::with_capacity(symbols.len());
        for (symbol, company) in symbols.iter().zip(companies) {
            let info = company.unwrap_or_else(|e| {
                warn!("No company profile for {}: {}", symbol, e);
                notices.push(OptimizationNotice::CompanyInfoUnavailable {
                    symbol: symbol.clone(),
                    reason: e.to_string(),
                });
                CompanyInfo::unknown(symbol)
            });
            company_map.insert(symbol.clone(), info);
        }

        let estimate = ReturnsEstimator::new(self.settings.trading_days).estimate(&series)?;
        if estimate.covariance_method == CovarianceMethod::Sample {
            notices.push(OptimizationNotice::ShrinkageFallback);
        }

        let sectors: Vec<String> = symbols
            .iter()
            .map(|s| {
                company_map
                    .get(s)
                    .map(|c| c.sector.clone())
                    .unwrap_or_default()
            })
            .collect();
        let built = ConstraintBuilder::new(&symbols, &sectors).build(&request.constraints);
        notices.extend(built.notices);

        let optimizer = WeightOptimizer::new(
            self.settings.max_iterations,
            self.settings.risk_free_rate,
            self.settings.trading_days,
        );
        let expected_returns = estimate.expected_returns.clone();
        let covariance = estimate.covariance.clone();
        let constraints = built.constraints;
        let solver_cancel = cancel.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            optimizer.solve(
                objective,
                &expected_returns,
                &covariance,
                &constraints,
                &solver_cancel,
            )
        })
        .await??;

        if let OptimizationOutcome::Fallback { reason, .. } = &outcome {
            warn!(
                "Optimization of {:?} fell back to equal weights: {}",
                symbols, reason
            );
        }
        let weights = outcome.weights();

        let benchmark = match &benchmark {
            Ok(s) if !s.is_empty() => Ok(s),
            Ok(_) => Err("no price history".to_string()),
            Err(e) => Err(e.to_string()),
        };
        let engine =
            RiskMetricsEngine::new(self.settings.risk_free_rate, self.settings.trading_days);
        let (risk_metrics, risk_notices) =
            engine.compute(weights, &estimate, benchmark_symbol, benchmark);
        notices.extend(risk_notices);

        let allocations = AllocationBuilder::new(&estimate, &price_map, &company_map)
            .build(weights, request.investment_amount);

        let metadata = OptimizationMetadata {
            objective,
            status: match outcome.fallback_reason() {
                None => OptimizationStatus::Converged,
                Some(_) => OptimizationStatus::Fallback,
            },
            fallback_reason: outcome.fallback_reason(),
            iterations: outcome.iterations(),
            covariance_method: estimate.covariance_method,
            shrinkage_intensity: estimate.shrinkage,
            observations: estimate.observations(),
            rebalance_frequency: request.rebalance_frequency().to_string(),
            notices,
        };

        info!(
            "Optimized {} symbols ({}): status {:?}, return {:.4}, volatility {:.4}, {} notices",
            symbols.len(),
            objective,
            metadata.status,
            risk_metrics.expected_return,
            risk_metrics.portfolio_volatility,
            metadata.notices.len()
        );

        Ok(OptimizationResult {
            allocations,
            expected_annual_return: risk_metrics.expected_return,
            optimization_score: risk_metrics.sharpe_ratio,
            rebalancing_suggestions: rebalancing_suggestions(weights, request.risk_tolerance),
            diversification_score: diversification_score(weights),
            risk_metrics,
            total_investment: request.investment_amount,
            generated_at: Utc::now(),
            metadata,
        })
    }
}

#[async_trait]
impl OptimizationServiceTrait for OptimizationService {
    async fn optimize(&self, request: OptimizationRequest) -> Result<OptimizationResult> {
        let cancel = Arc::new(AtomicBool::new(false));
        let _cancel_on_drop = CancelOnDrop(cancel.clone());
        let deadline = self.settings.request_timeout;

        match tokio::time::timeout(deadline, self.run(request, cancel)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Optimization exceeded deadline of {:?}", deadline);
                Err(Error::Timeout(deadline))
            }
        }
    }
}
