//! Translates user constraints into linear solver constraints.

use log::warn;

use super::optimization_model::{Constraint, OptimizationNotice};

/// Affine function `constant + coefficients · w`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub coefficients: Vec<f64>,
    pub constant: f64,
}

impl LinearConstraint {
    pub fn evaluate(&self, weights: &[f64]) -> f64 {
        self.constant
            + self
                .coefficients
                .iter()
                .zip(weights)
                .map(|(a, w)| a * w)
                .sum::<f64>()
    }

    /// Indices with a non-zero coefficient.
    pub fn support(&self) -> Vec<usize> {
        self.coefficients
            .iter()
            .enumerate()
            .filter(|(_, a)| **a != 0.0)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Constraint set handed to the weight optimizer.
///
/// `equality` must evaluate to zero and every entry of `inequalities` must
/// evaluate to a non-negative value. Box bounds `0 <= w <= 1` are implied.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConstraints {
    pub equality: LinearConstraint,
    pub inequalities: Vec<LinearConstraint>,
}

impl SolverConstraints {
    /// Only the budget constraint `sum(w) = 1`.
    pub fn budget_only(n: usize) -> Self {
        Self {
            equality: LinearConstraint {
                coefficients: vec![1.0; n],
                constant: -1.0,
            },
            inequalities: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuiltConstraints {
    pub constraints: SolverConstraints,
    pub notices: Vec<OptimizationNotice>,
}

pub struct ConstraintBuilder<'a> {
    symbols: &'a [String],
    sectors: &'a [String],
}

impl<'a> ConstraintBuilder<'a> {
    /// `sectors[i]` is the sector of `symbols[i]`.
    pub fn new(symbols: &'a [String], sectors: &'a [String]) -> Self {
        Self { symbols, sectors }
    }

    pub fn build(&self, constraints: &[Constraint]) -> BuiltConstraints {
        let n = self.symbols.len();
        let mut built = SolverConstraints::budget_only(n);
        let mut notices = Vec::new();

        for constraint in constraints {
            match self.translate(constraint) {
                Some(inequality) => built.inequalities.push(inequality),
                None => {
                    let reason = match constraint {
                        Constraint::SectorLimit { sector, .. } => {
                            format!("no requested symbol is in sector '{sector}'")
                        }
                        Constraint::MaxWeight { symbol, .. }
                        | Constraint::MinWeight { symbol, .. } => {
                            format!("symbol '{symbol}' is not in the portfolio")
                        }
                    };
                    warn!("Dropping constraint {}: {}", constraint, reason);
                    notices.push(OptimizationNotice::ConstraintDropped {
                        constraint: constraint.to_string(),
                        reason,
                    });
                }
            }
        }

        BuiltConstraints {
            constraints: built,
            notices,
        }
    }

    fn translate(&self, constraint: &Constraint) -> Option<LinearConstraint> {
        let n = self.symbols.len();
        match constraint {
            Constraint::MaxWeight { symbol, value } => {
                let i = self.symbol_index(symbol)?;
                let mut coefficients = vec![0.0; n];
                coefficients[i] = -1.0;
                Some(LinearConstraint {
                    coefficients,
                    constant: *value,
                })
            }
            Constraint::MinWeight { symbol, value } => {
                let i = self.symbol_index(symbol)?;
                let mut coefficients = vec![0.0; n];
                coefficients[i] = 1.0;
                Some(LinearConstraint {
                    coefficients,
                    constant: -*value,
                })
            }
            Constraint::SectorLimit { sector, value } => {
                let coefficients: Vec<f64> = self
                    .sectors
                    .iter()
                    .map(|s| {
                        if s.eq_ignore_ascii_case(sector.trim()) {
                            -1.0
                        } else {
                            0.0
                        }
                    })
                    .collect();
                if coefficients.iter().all(|a| *a == 0.0) {
                    return None;
                }
                Some(LinearConstraint {
                    coefficients,
                    constant: *value,
                })
            }
        }
    }

    fn symbol_index(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn universe() -> (Vec<String>, Vec<String>) {
        (
            vec!["AAPL".into(), "MSFT".into(), "XOM".into()],
            vec!["Technology".into(), "Technology".into(), "Energy".into()],
        )
    }

    #[test]
    fn test_budget_is_always_present() {
        let (symbols, sectors) = universe();
        let built = ConstraintBuilder::new(&symbols, &sectors).build(&[]);
        assert!(built.constraints.inequalities.is_empty());
        assert_eq!(built.constraints.equality.evaluate(&[0.2, 0.3, 0.5]), 0.0);
    }

    #[test]
    fn test_weight_bounds_translate_to_inequalities() {
        let (symbols, sectors) = universe();
        let built = ConstraintBuilder::new(&symbols, &sectors).build(&[
            Constraint::MaxWeight {
                symbol: "AAPL".into(),
                value: 0.3,
            },
            Constraint::MinWeight {
                symbol: "XOM".into(),
                value: 0.1,
            },
        ]);

        let [max, min] = built.constraints.inequalities.as_slice() else {
            panic!("expected two inequalities");
        };
        assert!((max.evaluate(&[0.25, 0.5, 0.25]) - 0.05).abs() < 1e-12);
        assert!(max.evaluate(&[0.35, 0.4, 0.25]) < 0.0);
        assert!((min.evaluate(&[0.5, 0.4, 0.1])).abs() < 1e-12);
        assert_eq!(min.support(), vec![2]);
    }

    #[test]
    fn test_sector_limit_sums_sector_members_case_insensitively() {
        let (symbols, sectors) = universe();
        let built = ConstraintBuilder::new(&symbols, &sectors).build(&[Constraint::SectorLimit {
            sector: "technology".into(),
            value: 0.5,
        }]);

        let sector = &built.constraints.inequalities[0];
        assert_eq!(sector.support(), vec![0, 1]);
        assert!((sector.evaluate(&[0.3, 0.3, 0.4]) + 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_references_are_dropped_with_notice() {
        let (symbols, sectors) = universe();
        let built = ConstraintBuilder::new(&symbols, &sectors).build(&[
            Constraint::MaxWeight {
                symbol: "TSLA".into(),
                value: 0.2,
            },
            Constraint::SectorLimit {
                sector: "Utilities".into(),
                value: 0.2,
            },
        ]);

        assert!(built.constraints.inequalities.is_empty());
        assert_eq!(built.notices.len(), 2);
        assert!(matches!(
            &built.notices[0],
            OptimizationNotice::ConstraintDropped { constraint, .. } if constraint.contains("TSLA")
        ));
    }
}
