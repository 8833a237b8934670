//! Turns solver weights into per-symbol allocation recommendations.

use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};
use num_traits::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

use super::optimization_model::AllocationRecommendation;
use super::returns_estimator::ReturnsEstimate;
use crate::market_data::CompanyInfo;

const MIN_VARIANCE: f64 = 1e-18;
const AMOUNT_DECIMALS: u32 = 2;

pub struct AllocationBuilder<'a> {
    estimate: &'a ReturnsEstimate,
    prices: &'a HashMap<String, Decimal>,
    companies: &'a HashMap<String, CompanyInfo>,
}

impl<'a> AllocationBuilder<'a> {
    pub fn new(
        estimate: &'a ReturnsEstimate,
        prices: &'a HashMap<String, Decimal>,
        companies: &'a HashMap<String, CompanyInfo>,
    ) -> Self {
        Self {
            estimate,
            prices,
            companies,
        }
    }

    /// One recommendation per symbol, in request order.
    pub fn build(
        &self,
        weights: &[f64],
        investment_amount: Decimal,
    ) -> Vec<AllocationRecommendation> {
        let contributions = risk_contributions(weights, &self.estimate.covariance);

        self.estimate
            .symbols
            .iter()
            .enumerate()
            .map(|(i, symbol)| {
                let weight = weights[i];
                let amount = allocation_amount(investment_amount, weight);
                let price = self.prices.get(symbol).copied().unwrap_or(Decimal::ZERO);
                let company = self
                    .companies
                    .get(symbol)
                    .cloned()
                    .unwrap_or_else(|| CompanyInfo::unknown(symbol));

                AllocationRecommendation {
                    symbol: symbol.clone(),
                    company_name: company.name,
                    recommended_weight: weight,
                    recommended_shares: whole_shares(amount, price),
                    recommended_amount: amount,
                    expected_return: self.estimate.expected_returns[i],
                    risk_contribution: contributions[i],
                    sector: company.sector,
                }
            })
            .collect()
    }
}

/// `investment * weight`, rounded to cents.
pub fn allocation_amount(investment_amount: Decimal, weight: f64) -> Decimal {
    let weight = Decimal::from_f64(weight).unwrap_or(Decimal::ZERO);
    (investment_amount * weight)
        .round_dp_with_strategy(AMOUNT_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

/// Whole shares affordable with `amount`; zero when the price is unknown.
pub fn whole_shares(amount: Decimal, price: Decimal) -> i64 {
    if price <= Decimal::ZERO {
        return 0;
    }
    (amount / price).floor().to_i64().unwrap_or(0)
}

/// Fraction of portfolio variance attributable to each position.
///
/// Falls back to the weights themselves when the portfolio has no variance.
pub fn risk_contributions(weights: &[f64], covariance: &DMatrix<f64>) -> Vec<f64> {
    let w = DVector::from_column_slice(weights);
    let marginal = covariance * &w;
    let variance = w.dot(&marginal);

    if variance.abs() < MIN_VARIANCE || !variance.is_finite() {
        return weights.to_vec();
    }
    w.component_mul(&marginal)
        .iter()
        .map(|c| c / variance)
        .collect()
}
