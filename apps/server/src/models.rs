use chrono::{DateTime, Utc};
use quantfolio_core::{
    AllocationRecommendation, Constraint, OptimizationMetadata, OptimizationObjective,
    OptimizationRequest, OptimizationResult, RiskMetrics, RiskTolerance,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema, Debug, Clone)]
pub struct OptimizeRequest {
    #[schema(example = json!(["AAPL", "MSFT", "XOM"]))]
    pub symbols: Vec<String>,
    /// conservative | moderate | aggressive
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "moderate")]
    pub risk_tolerance: Option<RiskTolerance>,
    #[schema(example = 10000.0)]
    pub investment_amount: Decimal,
    /// max_return | min_risk | max_sharpe | equal_weight
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "max_sharpe")]
    pub objective: Option<OptimizationObjective>,
    /// `{type: max_weight | min_weight, symbol, value}` or
    /// `{type: sector_limit, sector, value}`
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub rebalance_frequency: Option<String>,
}

impl From<OptimizeRequest> for OptimizationRequest {
    fn from(r: OptimizeRequest) -> Self {
        Self {
            symbols: r.symbols,
            risk_tolerance: r.risk_tolerance.unwrap_or_default(),
            investment_amount: r.investment_amount,
            objective: r.objective,
            constraints: r.constraints,
            rebalance_frequency: r.rebalance_frequency,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct Allocation {
    pub symbol: String,
    pub company_name: String,
    pub recommended_weight: f64,
    pub recommended_shares: i64,
    pub recommended_amount: Decimal,
    pub expected_return: f64,
    pub risk_contribution: f64,
    pub sector: String,
}

impl From<AllocationRecommendation> for Allocation {
    fn from(a: AllocationRecommendation) -> Self {
        Self {
            symbol: a.symbol,
            company_name: a.company_name,
            recommended_weight: a.recommended_weight,
            recommended_shares: a.recommended_shares,
            recommended_amount: a.recommended_amount,
            expected_return: a.expected_return,
            risk_contribution: a.risk_contribution,
            sector: a.sector,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct PortfolioRisk {
    pub portfolio_volatility: f64,
    pub value_at_risk_95: f64,
    pub expected_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub beta: f64,
}

impl From<RiskMetrics> for PortfolioRisk {
    fn from(m: RiskMetrics) -> Self {
        Self {
            portfolio_volatility: m.portfolio_volatility,
            value_at_risk_95: m.value_at_risk_95,
            expected_return: m.expected_return,
            sharpe_ratio: m.sharpe_ratio,
            max_drawdown: m.max_drawdown,
            beta: m.beta,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct OptimizeResponse {
    pub allocations: Vec<Allocation>,
    pub risk_metrics: PortfolioRisk,
    pub total_investment: Decimal,
    pub expected_annual_return: f64,
    /// Sharpe ratio of the recommended portfolio.
    pub optimization_score: f64,
    pub rebalancing_suggestions: Vec<String>,
    pub diversification_score: f64,
    pub generated_at: DateTime<Utc>,
    /// Solver status, fallback reason, covariance method and notices.
    #[schema(value_type = Object)]
    pub metadata: OptimizationMetadata,
}

impl From<OptimizationResult> for OptimizeResponse {
    fn from(r: OptimizationResult) -> Self {
        Self {
            allocations: r.allocations.into_iter().map(Allocation::from).collect(),
            risk_metrics: r.risk_metrics.into(),
            total_investment: r.total_investment,
            expected_annual_return: r.expected_annual_return,
            optimization_score: r.optimization_score,
            rebalancing_suggestions: r.rebalancing_suggestions,
            diversification_score: r.diversification_score,
            generated_at: r.generated_at,
            metadata: r.metadata,
        }
    }
}
