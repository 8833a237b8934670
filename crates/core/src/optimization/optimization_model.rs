//! Domain models for portfolio optimization requests and results.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_REBALANCE_FREQUENCY;
use crate::errors::ValidationError;

/// Investor risk appetite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTolerance {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

impl RiskTolerance {
    /// Objective used when the caller does not pick one.
    pub fn default_objective(self) -> OptimizationObjective {
        match self {
            RiskTolerance::Conservative => OptimizationObjective::MinRisk,
            RiskTolerance::Moderate => OptimizationObjective::MaxSharpe,
            RiskTolerance::Aggressive => OptimizationObjective::MaxReturn,
        }
    }
}

/// What the solver optimizes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationObjective {
    MaxReturn,
    MinRisk,
    MaxSharpe,
    EqualWeight,
}

impl OptimizationObjective {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationObjective::MaxReturn => "max_return",
            OptimizationObjective::MinRisk => "min_risk",
            OptimizationObjective::MaxSharpe => "max_sharpe",
            OptimizationObjective::EqualWeight => "equal_weight",
        }
    }
}

impl fmt::Display for OptimizationObjective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-supplied allocation rule.
///
/// Values are weights in `[0, 1]`. `SectorLimit` caps the summed weight of
/// every symbol in the sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Constraint {
    MaxWeight { symbol: String, value: f64 },
    MinWeight { symbol: String, value: f64 },
    SectorLimit { sector: String, value: f64 },
}

impl Constraint {
    pub fn value(&self) -> f64 {
        match self {
            Constraint::MaxWeight { value, .. }
            | Constraint::MinWeight { value, .. }
            | Constraint::SectorLimit { value, .. } => *value,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let value = self.value();
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(ValidationError::OutOfRange {
                field: format!("constraints[{}].value", self),
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        match self {
            Constraint::MaxWeight { symbol, .. } | Constraint::MinWeight { symbol, .. }
                if symbol.trim().is_empty() =>
            {
                Err(ValidationError::MissingField("constraint symbol".to_string()))
            }
            Constraint::SectorLimit { sector, .. } if sector.trim().is_empty() => {
                Err(ValidationError::MissingField("constraint sector".to_string()))
            }
            _ => Ok(()),
        }
    }

    fn normalized(self) -> Self {
        match self {
            Constraint::MaxWeight { symbol, value } => Constraint::MaxWeight {
                symbol: normalize_symbol(&symbol),
                value,
            },
            Constraint::MinWeight { symbol, value } => Constraint::MinWeight {
                symbol: normalize_symbol(&symbol),
                value,
            },
            Constraint::SectorLimit { sector, value } => Constraint::SectorLimit {
                sector: sector.trim().to_string(),
                value,
            },
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::MaxWeight { symbol, value } => write!(f, "max_weight({symbol}, {value})"),
            Constraint::MinWeight { symbol, value } => write!(f, "min_weight({symbol}, {value})"),
            Constraint::SectorLimit { sector, value } => {
                write!(f, "sector_limit({sector}, {value})")
            }
        }
    }
}

fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Input to a single optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRequest {
    pub symbols: Vec<String>,
    #[serde(default)]
    pub risk_tolerance: RiskTolerance,
    pub investment_amount: Decimal,
    #[serde(default)]
    pub objective: Option<OptimizationObjective>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub rebalance_frequency: Option<String>,
}

impl OptimizationRequest {
    pub fn new(symbols: Vec<String>, investment_amount: Decimal) -> Self {
        Self {
            symbols,
            risk_tolerance: RiskTolerance::default(),
            investment_amount,
            objective: None,
            constraints: Vec::new(),
            rebalance_frequency: None,
        }
    }

    pub fn with_objective(mut self, objective: OptimizationObjective) -> Self {
        self.objective = Some(objective);
        self
    }

    pub fn with_risk_tolerance(mut self, risk_tolerance: RiskTolerance) -> Self {
        self.risk_tolerance = risk_tolerance;
        self
    }

    pub fn with_constraints(mut self, constraints: Vec<Constraint>) -> Self {
        self.constraints = constraints;
        self
    }

    /// Objective after applying the risk-tolerance mapping.
    pub fn effective_objective(&self) -> OptimizationObjective {
        self.objective
            .unwrap_or_else(|| self.risk_tolerance.default_objective())
    }

    pub fn rebalance_frequency(&self) -> &str {
        self.rebalance_frequency
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(DEFAULT_REBALANCE_FREQUENCY)
    }

    /// Normalizes symbols (trimmed, upper-cased, first occurrence kept) and
    /// checks amounts and constraint values.
    pub fn validated(mut self) -> Result<Self, ValidationError> {
        let mut seen = HashSet::new();
        let mut symbols = Vec::with_capacity(self.symbols.len());
        for raw in &self.symbols {
            let symbol = normalize_symbol(raw);
            if symbol.is_empty() {
                return Err(ValidationError::InvalidInput(
                    "symbols must not contain blank entries".to_string(),
                ));
            }
            if seen.insert(symbol.clone()) {
                symbols.push(symbol);
            } else {
                debug!("Ignoring duplicate symbol {}", symbol);
            }
        }
        if symbols.is_empty() {
            return Err(ValidationError::MissingField("symbols".to_string()));
        }
        self.symbols = symbols;

        if self.investment_amount <= Decimal::ZERO {
            return Err(ValidationError::InvalidInput(
                "investment_amount must be greater than zero".to_string(),
            ));
        }

        for constraint in &self.constraints {
            constraint.validate()?;
        }
        self.constraints = self
            .constraints
            .into_iter()
            .map(Constraint::normalized)
            .collect();

        Ok(self)
    }
}

/// Why the solver result was replaced with equal weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    NotConverged,
    NumericalError,
    InvariantViolation,
    InfeasibleConstraints,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FallbackReason::NotConverged => "solver did not converge within the iteration limit",
            FallbackReason::NumericalError => "solver hit a non-finite value",
            FallbackReason::InvariantViolation => "solver result violated weight constraints",
            FallbackReason::InfeasibleConstraints => "constraints cannot be satisfied together",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationStatus {
    Converged,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovarianceMethod {
    LedoitWolf,
    Sample,
}

/// Recovered degradation recorded while building a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizationNotice {
    ConstraintDropped { constraint: String, reason: String },
    BenchmarkInsufficient { symbol: String, overlap: usize },
    BenchmarkUnavailable { symbol: String, reason: String },
    ShrinkageFallback,
    PriceUnavailable { symbol: String, reason: String },
    CompanyInfoUnavailable { symbol: String, reason: String },
}

impl fmt::Display for OptimizationNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizationNotice::ConstraintDropped { constraint, reason } => {
                write!(f, "Ignored constraint {constraint}: {reason}")
            }
            OptimizationNotice::BenchmarkInsufficient { symbol, overlap } => write!(
                f,
                "Only {overlap} dates overlap with {symbol}; beta defaulted to 1.0"
            ),
            OptimizationNotice::BenchmarkUnavailable { symbol, reason } => {
                write!(f, "Benchmark {symbol} unavailable ({reason}); beta defaulted to 1.0")
            }
            OptimizationNotice::ShrinkageFallback => {
                f.write_str("Shrinkage estimate failed; used sample covariance")
            }
            OptimizationNotice::PriceUnavailable { symbol, reason } => {
                write!(f, "No current price for {symbol} ({reason}); shares set to 0")
            }
            OptimizationNotice::CompanyInfoUnavailable { symbol, reason } => {
                write!(f, "No profile for {symbol} ({reason}); sector set to Unknown")
            }
        }
    }
}

/// Portfolio-level risk report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub portfolio_volatility: f64,
    pub value_at_risk_95: f64,
    pub expected_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub beta: f64,
}

/// Recommended position for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRecommendation {
    pub symbol: String,
    pub company_name: String,
    pub recommended_weight: f64,
    pub recommended_shares: i64,
    pub recommended_amount: Decimal,
    pub expected_return: f64,
    pub risk_contribution: f64,
    pub sector: String,
}

/// How the weights were produced and what was recovered along the way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationMetadata {
    pub objective: OptimizationObjective,
    pub status: OptimizationStatus,
    pub fallback_reason: Option<FallbackReason>,
    pub iterations: usize,
    pub covariance_method: CovarianceMethod,
    pub shrinkage_intensity: Option<f64>,
    pub observations: usize,
    pub rebalance_frequency: String,
    pub notices: Vec<OptimizationNotice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub allocations: Vec<AllocationRecommendation>,
    pub risk_metrics: RiskMetrics,
    pub total_investment: Decimal,
    pub expected_annual_return: f64,
    pub optimization_score: f64,
    pub rebalancing_suggestions: Vec<String>,
    pub diversification_score: f64,
    pub generated_at: DateTime<Utc>,
    pub metadata: OptimizationMetadata,
}
