//! Constrained portfolio weight solver.
//!
//! Single-symbol inequalities are folded into per-weight bounds, so the
//! feasible set handled by the projection is
//! `{ w : lo <= w <= hi, sum(w) = 1 }`. The remaining multi-symbol
//! inequalities (sector limits) go through an augmented-Lagrangian outer
//! loop. Each subproblem is solved by spectral projected gradient with
//! Armijo backtracking.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};
use nalgebra::{DMatrix, DVector};

use super::constraint_builder::{LinearConstraint, SolverConstraints};
use super::optimization_model::{FallbackReason, OptimizationObjective};
use crate::constants::{
    MAX_SOLVER_ITERATIONS, RISK_FREE_RATE, TRADING_DAYS_PER_YEAR, WEIGHT_SUM_TOLERANCE,
};
use crate::errors::{Error, Result};

const STATIONARITY_TOLERANCE: f64 = 1e-7;
const FEASIBILITY_TOLERANCE: f64 = 1e-7;
const ARMIJO_SIGMA: f64 = 1e-4;
const MIN_STEP: f64 = 1e-10;
const MAX_STEP: f64 = 1e6;
const INITIAL_PENALTY: f64 = 10.0;
const MAX_PENALTY: f64 = 1e8;
const MIN_VOLATILITY: f64 = 1e-12;
const MAX_OUTER_ROUNDS: usize = 50;

/// Solver result. A fallback always carries equal weights.
#[derive(Debug, Clone, PartialEq)]
pub enum OptimizationOutcome {
    Converged { weights: Vec<f64>, iterations: usize },
    Fallback { weights: Vec<f64>, reason: FallbackReason },
}

impl OptimizationOutcome {
    pub fn weights(&self) -> &[f64] {
        match self {
            OptimizationOutcome::Converged { weights, .. }
            | OptimizationOutcome::Fallback { weights, .. } => weights,
        }
    }

    pub fn fallback_reason(&self) -> Option<FallbackReason> {
        match self {
            OptimizationOutcome::Converged { .. } => None,
            OptimizationOutcome::Fallback { reason, .. } => Some(*reason),
        }
    }

    pub fn iterations(&self) -> usize {
        match self {
            OptimizationOutcome::Converged { iterations, .. } => *iterations,
            OptimizationOutcome::Fallback { .. } => 0,
        }
    }
}

/// `w[i] = 1/N` for every symbol.
pub fn equal_weights(n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    vec![1.0 / n as f64; n]
}

#[derive(Debug, Clone, Copy)]
pub struct WeightOptimizer {
    max_iterations: usize,
    risk_free_rate: f64,
    trading_days: f64,
}

impl Default for WeightOptimizer {
    fn default() -> Self {
        Self::new(MAX_SOLVER_ITERATIONS, RISK_FREE_RATE, TRADING_DAYS_PER_YEAR)
    }
}

/// Objective evaluated on annualized inputs.
struct Objective<'a> {
    kind: OptimizationObjective,
    expected_returns: &'a DVector<f64>,
    covariance: DMatrix<f64>,
    risk_free_rate: f64,
}

impl Objective<'_> {
    /// Value and gradient of the minimized function. `None` when the
    /// portfolio volatility degenerates.
    fn evaluate(&self, w: &DVector<f64>) -> Option<(f64, DVector<f64>)> {
        match self.kind {
            OptimizationObjective::MaxReturn => {
                Some((-self.expected_returns.dot(w), -self.expected_returns.clone()))
            }
            OptimizationObjective::MinRisk => {
                let sigma_w = &self.covariance * w;
                let volatility = w.dot(&sigma_w).max(0.0).sqrt();
                if volatility < MIN_VOLATILITY {
                    return None;
                }
                Some((volatility, sigma_w / volatility))
            }
            OptimizationObjective::MaxSharpe => {
                let sigma_w = &self.covariance * w;
                let volatility = w.dot(&sigma_w).max(0.0).sqrt();
                if volatility < MIN_VOLATILITY {
                    return None;
                }
                let excess = self.expected_returns.dot(w) - self.risk_free_rate;
                let value = -excess / volatility;
                let gradient = self.expected_returns * (-1.0 / volatility)
                    + sigma_w * (excess / volatility.powi(3));
                Some((value, gradient))
            }
            OptimizationObjective::EqualWeight => Some((0.0, DVector::zeros(w.len()))),
        }
    }
}

/// Multi-symbol inequalities with their augmented-Lagrangian state.
struct Penalized<'a> {
    constraints: Vec<&'a LinearConstraint>,
    gradients: Vec<DVector<f64>>,
    multipliers: Vec<f64>,
    penalty: f64,
}

impl<'a> Penalized<'a> {
    fn new(constraints: Vec<&'a LinearConstraint>) -> Self {
        let gradients = constraints
            .iter()
            .map(|c| DVector::from_column_slice(&c.coefficients))
            .collect();
        let multipliers = vec![0.0; constraints.len()];
        Self {
            constraints,
            gradients,
            multipliers,
            penalty: INITIAL_PENALTY,
        }
    }

    /// Adds the penalty terms to `(value, gradient)`.
    fn augment(&self, w: &DVector<f64>, value: &mut f64, gradient: &mut DVector<f64>) {
        for ((constraint, grad_g), lambda) in self
            .constraints
            .iter()
            .zip(&self.gradients)
            .zip(&self.multipliers)
        {
            let g = constraint.evaluate(w.as_slice());
            let shifted = (lambda - self.penalty * g).max(0.0);
            *value += (shifted * shifted - lambda * lambda) / (2.0 * self.penalty);
            *gradient -= grad_g * shifted;
        }
    }

    fn max_violation(&self, w: &[f64]) -> f64 {
        self.constraints
            .iter()
            .map(|c| (-c.evaluate(w)).max(0.0))
            .fold(0.0, f64::max)
    }

    /// First-order multiplier update; the penalty grows when the violation
    /// did not shrink enough since the previous round.
    fn update(&mut self, w: &[f64], current_violation: f64, previous_violation: f64) {
        for (constraint, lambda) in self.constraints.iter().zip(self.multipliers.iter_mut()) {
            *lambda = (*lambda - self.penalty * constraint.evaluate(w)).max(0.0);
        }
        if current_violation > 0.25 * previous_violation {
            self.penalty = (self.penalty * 10.0).min(MAX_PENALTY);
        }
    }
}

enum InnerStatus {
    Stationary,
    IterationLimit,
    NonFinite,
}

impl WeightOptimizer {
    pub fn new(max_iterations: usize, risk_free_rate: f64, trading_days: f64) -> Self {
        Self {
            max_iterations,
            risk_free_rate,
            trading_days,
        }
    }

    /// Solves for weights under `constraints`.
    ///
    /// `expected_returns` is annualized, `daily_covariance` is daily scale.
    /// Failures to converge come back as [`OptimizationOutcome::Fallback`];
    /// cancellation and mismatched dimensions are errors.
    pub fn solve(
        &self,
        objective: OptimizationObjective,
        expected_returns: &DVector<f64>,
        daily_covariance: &DMatrix<f64>,
        constraints: &SolverConstraints,
        cancel: &AtomicBool,
    ) -> Result<OptimizationOutcome> {
        let n = expected_returns.len();
        if n == 0 || daily_covariance.nrows() != n || daily_covariance.ncols() != n {
            return Err(Error::Calculation(format!(
                "dimension mismatch: {} returns, {}x{} covariance",
                n,
                daily_covariance.nrows(),
                daily_covariance.ncols()
            )));
        }

        let equal = equal_weights(n);
        if objective == OptimizationObjective::EqualWeight {
            return Ok(OptimizationOutcome::Converged {
                weights: equal,
                iterations: 0,
            });
        }

        let fallback = |reason: FallbackReason| {
            warn!("Optimization fell back to equal weights: {}", reason);
            Ok(OptimizationOutcome::Fallback {
                weights: equal_weights(n),
                reason,
            })
        };

        let Some((lower, upper, general)) = fold_bounds(n, &constraints.inequalities) else {
            return fallback(FallbackReason::InfeasibleConstraints);
        };
        if !is_feasible_region(&lower, &upper, &general) {
            return fallback(FallbackReason::InfeasibleConstraints);
        }

        let objective_fn = Objective {
            kind: objective,
            expected_returns,
            covariance: daily_covariance * self.trading_days,
            risk_free_rate: self.risk_free_rate,
        };
        let mut penalized = Penalized::new(general);

        let mut w = project(&DVector::from_vec(equal), &lower, &upper);
        let mut iterations = 0usize;
        let mut violation = f64::INFINITY;
        let mut rounds = 0usize;

        loop {
            rounds += 1;
            let status = self.minimize_subproblem(
                &objective_fn,
                &penalized,
                &lower,
                &upper,
                &mut w,
                &mut iterations,
                cancel,
            )?;

            match status {
                InnerStatus::NonFinite => return fallback(FallbackReason::NumericalError),
                InnerStatus::IterationLimit => return fallback(FallbackReason::NotConverged),
                InnerStatus::Stationary => {}
            }

            let current = penalized.max_violation(w.as_slice());
            if current <= FEASIBILITY_TOLERANCE {
                break;
            }
            if penalized.penalty >= MAX_PENALTY || rounds >= MAX_OUTER_ROUNDS {
                return fallback(FallbackReason::NotConverged);
            }
            penalized.update(w.as_slice(), current, violation);
            violation = current;
        }

        let weights: Vec<f64> = w.iter().map(|v| v.clamp(0.0, 1.0)).collect();
        if !satisfies_invariants(&weights, constraints) {
            return fallback(FallbackReason::InvariantViolation);
        }

        debug!(
            "Optimization ({}) converged after {} iterations",
            objective, iterations
        );
        Ok(OptimizationOutcome::Converged {
            weights,
            iterations,
        })
    }

    /// Spectral projected gradient on the current augmented Lagrangian.
    #[allow(clippy::too_many_arguments)]
    fn minimize_subproblem(
        &self,
        objective: &Objective<'_>,
        penalized: &Penalized<'_>,
        lower: &[f64],
        upper: &[f64],
        w: &mut DVector<f64>,
        iterations: &mut usize,
        cancel: &AtomicBool,
    ) -> Result<InnerStatus> {
        let evaluate = |x: &DVector<f64>| -> Option<(f64, DVector<f64>)> {
            let (mut value, mut gradient) = objective.evaluate(x)?;
            penalized.augment(x, &mut value, &mut gradient);
            let finite = value.is_finite() && gradient.iter().all(|g| g.is_finite());
            finite.then_some((value, gradient))
        };

        let Some((mut value, mut gradient)) = evaluate(&*w) else {
            return Ok(InnerStatus::NonFinite);
        };
        let mut step = 1.0;

        loop {
            if cancel.load(Ordering::Relaxed) {
                return Err(Error::Cancelled);
            }

            let stationarity = (project(&(&*w - &gradient), lower, upper) - &*w).amax();
            if stationarity <= STATIONARITY_TOLERANCE {
                return Ok(InnerStatus::Stationary);
            }
            if *iterations >= self.max_iterations {
                return Ok(InnerStatus::IterationLimit);
            }
            *iterations += 1;

            let direction = project(&(&*w - &gradient * step), lower, upper) - &*w;
            let slope = gradient.dot(&direction);

            let mut t = 1.0;
            let (candidate, candidate_value, candidate_gradient) = loop {
                let candidate = &*w + &direction * t;
                let Some((candidate_value, candidate_gradient)) = evaluate(&candidate) else {
                    return Ok(InnerStatus::NonFinite);
                };
                if candidate_value <= value + ARMIJO_SIGMA * t * slope || t < MIN_STEP {
                    break (candidate, candidate_value, candidate_gradient);
                }
                t *= 0.5;
            };

            let s = &candidate - &*w;
            let y = &candidate_gradient - &gradient;
            let sy = s.dot(&y);
            step = if sy > 0.0 {
                (s.dot(&s) / sy).clamp(MIN_STEP, MAX_STEP)
            } else {
                MAX_STEP
            };

            let moved = s.amax();
            *w = candidate;
            value = candidate_value;
            gradient = candidate_gradient;

            if moved < f64::EPSILON {
                return Ok(InnerStatus::Stationary);
            }
        }
    }
}

/// Folds single-symbol inequalities into bounds. Returns `None` when a
/// bound pair is contradictory.
fn fold_bounds(
    n: usize,
    inequalities: &[LinearConstraint],
) -> Option<(Vec<f64>, Vec<f64>, Vec<&LinearConstraint>)> {
    let mut lower = vec![0.0_f64; n];
    let mut upper = vec![1.0_f64; n];
    let mut general = Vec::new();

    for inequality in inequalities {
        let support = inequality.support();
        match support.as_slice() {
            [] if inequality.constant < -FEASIBILITY_TOLERANCE => return None,
            [] => {}
            [i] => {
                let a = inequality.coefficients[*i];
                let bound = -inequality.constant / a;
                if a > 0.0 {
                    lower[*i] = lower[*i].max(bound);
                } else {
                    upper[*i] = upper[*i].min(bound);
                }
            }
            _ => general.push(inequality),
        }
    }

    for i in 0..n {
        lower[i] = lower[i].max(0.0);
        upper[i] = upper[i].min(1.0);
        if lower[i] > upper[i] + FEASIBILITY_TOLERANCE {
            return None;
        }
        upper[i] = upper[i].max(lower[i]);
    }

    Some((lower, upper, general))
}

/// Checks the budget against the bounds and against cap-style inequalities
/// (`c - sum_{i in S} w_i >= 0`). Disjoint caps are checked jointly.
fn is_feasible_region(lower: &[f64], upper: &[f64], general: &[&LinearConstraint]) -> bool {
    let lower_sum: f64 = lower.iter().sum();
    let upper_sum: f64 = upper.iter().sum();
    if lower_sum > 1.0 + FEASIBILITY_TOLERANCE || upper_sum < 1.0 - FEASIBILITY_TOLERANCE {
        return false;
    }

    // Tightest cap per member set
    let mut caps: BTreeMap<Vec<usize>, f64> = BTreeMap::new();
    for constraint in general {
        let support = constraint.support();
        let is_cap = support
            .iter()
            .all(|&i| (constraint.coefficients[i] + 1.0).abs() < f64::EPSILON);
        if !is_cap {
            continue;
        }
        let members_lower: f64 = support.iter().map(|&i| lower[i]).sum();
        if members_lower > constraint.constant + FEASIBILITY_TOLERANCE {
            return false;
        }
        caps.entry(support)
            .and_modify(|cap| *cap = cap.min(constraint.constant))
            .or_insert(constraint.constant);
    }

    let mut covered = vec![false; lower.len()];
    for members in caps.keys() {
        for &i in members {
            if covered[i] {
                // Overlapping caps: leave the joint check to the solver
                return true;
            }
            covered[i] = true;
        }
    }

    let capped_max: f64 = caps
        .iter()
        .map(|(members, cap)| cap.min(members.iter().map(|&i| upper[i]).sum()))
        .sum();
    let free_max: f64 = (0..lower.len())
        .filter(|&i| !covered[i])
        .map(|i| upper[i])
        .sum();

    capped_max + free_max >= 1.0 - FEASIBILITY_TOLERANCE
}

/// Euclidean projection onto `{ lo <= w <= hi, sum(w) = 1 }`.
///
/// The projection has the form `clamp(v - theta, lo, hi)`; `theta` is found
/// by bisection since the clamped sum is monotone in it. Requires
/// `sum(lo) <= 1 <= sum(hi)`.
pub fn project(v: &DVector<f64>, lower: &[f64], upper: &[f64]) -> DVector<f64> {
    let clamped_sum = |theta: f64| -> f64 {
        v.iter()
            .zip(lower.iter().zip(upper))
            .map(|(x, (lo, hi))| (x - theta).clamp(*lo, *hi))
            .sum()
    };

    let mut theta_low = v
        .iter()
        .zip(upper)
        .map(|(x, hi)| x - hi)
        .fold(f64::INFINITY, f64::min)
        - 1.0;
    let mut theta_high = v
        .iter()
        .zip(lower)
        .map(|(x, lo)| x - lo)
        .fold(f64::NEG_INFINITY, f64::max)
        + 1.0;

    for _ in 0..200 {
        let mid = 0.5 * (theta_low + theta_high);
        if mid <= theta_low || mid >= theta_high {
            break;
        }
        if clamped_sum(mid) > 1.0 {
            theta_low = mid;
        } else {
            theta_high = mid;
        }
    }

    let theta = 0.5 * (theta_low + theta_high);
    DVector::from_iterator(
        v.len(),
        v.iter()
            .zip(lower.iter().zip(upper))
            .map(|(x, (lo, hi))| (x - theta).clamp(*lo, *hi)),
    )
}

/// Weight sum, per-weight bounds and every inequality within tolerance.
pub fn satisfies_invariants(weights: &[f64], constraints: &SolverConstraints) -> bool {
    let sum: f64 = weights.iter().sum();
    (sum - 1.0).abs() <= WEIGHT_SUM_TOLERANCE
        && weights.iter().all(|w| w.is_finite() && (0.0..=1.0).contains(w))
        && constraints
            .inequalities
            .iter()
            .all(|c| c.evaluate(weights) >= -WEIGHT_SUM_TOLERANCE)
}
