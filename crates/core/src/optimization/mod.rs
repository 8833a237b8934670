//! Optimization module - estimation, solving, risk reporting and the
//! service that ties them together.

mod allocation_builder;
mod constraint_builder;
mod optimization_model;
mod optimization_service;
mod optimization_traits;
mod returns_estimator;
mod risk_metrics;
mod suggestions;
mod weight_optimizer;

pub use allocation_builder::{allocation_amount, risk_contributions, whole_shares, AllocationBuilder};
pub use constraint_builder::{BuiltConstraints, ConstraintBuilder, LinearConstraint, SolverConstraints};
pub use optimization_model::*;
pub use optimization_service::{OptimizationService, OptimizerSettings};
pub use optimization_traits::OptimizationServiceTrait;
pub use returns_estimator::{
    align_prices, ledoit_wolf, sample_covariance, simple_returns, ReturnsEstimate,
    ReturnsEstimator,
};
pub use risk_metrics::{
    max_drawdown, percentile, portfolio_returns, value_at_risk, BetaEstimate, RiskMetricsEngine,
};
pub use suggestions::{diversification_score, rebalancing_suggestions};
pub use weight_optimizer::{
    equal_weights, project, satisfies_invariants, OptimizationOutcome, WeightOptimizer,
};
