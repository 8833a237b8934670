//! Return statistics and covariance estimation from price histories.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};

use super::optimization_model::CovarianceMethod;
use crate::constants::TRADING_DAYS_PER_YEAR;
use crate::errors::{Error, Result};
use crate::market_data::AssetSeries;

/// Aligned returns and the statistics derived from them.
#[derive(Debug, Clone)]
pub struct ReturnsEstimate {
    pub symbols: Vec<String>,
    /// Date of each return row (the later day of each pair).
    pub dates: Vec<NaiveDate>,
    /// Daily simple returns, one row per date and one column per symbol.
    pub returns: DMatrix<f64>,
    /// Mean daily return times trading days per year.
    pub expected_returns: DVector<f64>,
    /// Daily-scale covariance.
    pub covariance: DMatrix<f64>,
    pub covariance_method: CovarianceMethod,
    pub shrinkage: Option<f64>,
}

impl ReturnsEstimate {
    pub fn observations(&self) -> usize {
        self.returns.nrows()
    }

    pub fn annualized_covariance(&self, trading_days: f64) -> DMatrix<f64> {
        &self.covariance * trading_days
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReturnsEstimator {
    trading_days: f64,
}

impl Default for ReturnsEstimator {
    fn default() -> Self {
        Self::new(TRADING_DAYS_PER_YEAR)
    }
}

impl ReturnsEstimator {
    pub fn new(trading_days: f64) -> Self {
        Self { trading_days }
    }

    /// Builds the returns matrix, expected returns and a shrunk covariance.
    ///
    /// Every series must carry at least one price; symbols without history
    /// are reported together in [`Error::DataUnavailable`].
    pub fn estimate(&self, series: &[AssetSeries]) -> Result<ReturnsEstimate> {
        let missing: Vec<String> = series
            .iter()
            .filter(|s| s.is_empty())
            .map(|s| s.symbol.clone())
            .collect();
        if !missing.is_empty() {
            return Err(Error::DataUnavailable(missing));
        }
        if series.is_empty() {
            return Err(Error::Calculation("no series to estimate".to_string()));
        }

        let symbols: Vec<String> = series.iter().map(|s| s.symbol.clone()).collect();
        let (dates, prices) = align_prices(series);
        if dates.len() < 3 {
            warn!(
                "Only {} aligned price dates for {:?}; need at least 3",
                dates.len(),
                symbols
            );
            return Err(Error::DataUnavailable(symbols));
        }

        let returns = simple_returns(&prices);
        let return_dates = dates[1..].to_vec();

        let expected_returns = DVector::from_iterator(
            returns.ncols(),
            returns
                .column_iter()
                .map(|column| column.mean() * self.trading_days),
        );

        let (covariance, covariance_method, shrinkage) = match ledoit_wolf(&returns) {
            Some((covariance, shrinkage)) => {
                debug!("Ledoit-Wolf shrinkage intensity {:.4}", shrinkage);
                (covariance, CovarianceMethod::LedoitWolf, Some(shrinkage))
            }
            None => {
                warn!("Ledoit-Wolf estimate failed; falling back to sample covariance");
                (sample_covariance(&returns), CovarianceMethod::Sample, None)
            }
        };

        if covariance.iter().any(|v| !v.is_finite()) {
            return Err(Error::Calculation(
                "covariance matrix contains non-finite values".to_string(),
            ));
        }

        Ok(ReturnsEstimate {
            symbols,
            dates: return_dates,
            returns,
            expected_returns,
            covariance,
            covariance_method,
            shrinkage,
        })
    }
}

/// Aligns series on the union of their dates, forward-filling gaps and
/// back-filling leading gaps. Returns the dates and a dates × symbols matrix.
pub fn align_prices(series: &[AssetSeries]) -> (Vec<NaiveDate>, DMatrix<f64>) {
    let dates: Vec<NaiveDate> = series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.date))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut prices = DMatrix::<f64>::zeros(dates.len(), series.len());
    for (col, s) in series.iter().enumerate() {
        let first_price = s.points.first().map(|p| p.price).unwrap_or(f64::NAN);
        let mut points = s.points.iter().peekable();
        let mut last: Option<f64> = None;

        for (row, date) in dates.iter().enumerate() {
            while let Some(point) = points.next_if(|p| p.date <= *date) {
                last = Some(point.price);
            }
            prices[(row, col)] = last.unwrap_or(first_price);
        }
    }

    (dates, prices)
}

/// Period-over-period simple returns; the first row has no predecessor and
/// is dropped.
pub fn simple_returns(prices: &DMatrix<f64>) -> DMatrix<f64> {
    let rows = prices.nrows().saturating_sub(1);
    DMatrix::from_fn(rows, prices.ncols(), |i, j| {
        prices[(i + 1, j)] / prices[(i, j)] - 1.0
    })
}

fn centered(returns: &DMatrix<f64>) -> DMatrix<f64> {
    let means: Vec<f64> = returns.column_iter().map(|c| c.mean()).collect();
    DMatrix::from_fn(returns.nrows(), returns.ncols(), |i, j| {
        returns[(i, j)] - means[j]
    })
}

/// Unbiased sample covariance (divides by `n - 1`).
pub fn sample_covariance(returns: &DMatrix<f64>) -> DMatrix<f64> {
    let n = returns.nrows();
    let x = centered(returns);
    let denom = n.saturating_sub(1).max(1) as f64;
    (x.transpose() * &x) / denom
}

/// Ledoit-Wolf shrinkage towards `mu * I` where `mu` is the mean variance.
///
/// Returns the shrunk covariance and the shrinkage intensity, or `None`
/// when the estimate is undefined (fewer than two observations, zero
/// dispersion around the target, non-finite intermediate values).
pub fn ledoit_wolf(returns: &DMatrix<f64>) -> Option<(DMatrix<f64>, f64)> {
    let n = returns.nrows();
    let p = returns.ncols();
    if n < 2 || p == 0 {
        return None;
    }

    let x = centered(returns);
    let n_f = n as f64;
    let p_f = p as f64;
    let gram = x.transpose() * &x;
    let emp_cov = &gram / n_f;

    if p == 1 {
        return Some((emp_cov, 0.0));
    }

    let x2 = x.map(|v| v * v);
    let emp_cov_trace: Vec<f64> = x2.column_iter().map(|c| c.sum() / n_f).collect();
    let trace_sum: f64 = emp_cov_trace.iter().sum();
    let mu = trace_sum / p_f;

    let beta_raw = (x2.transpose() * &x2).sum();
    let delta_raw = gram.map(|v| v * v).sum() / (n_f * n_f);

    let beta = (beta_raw / n_f - delta_raw) / (p_f * n_f);
    let delta = (delta_raw - 2.0 * mu * trace_sum + p_f * mu * mu) / p_f;

    if !beta.is_finite() || !delta.is_finite() || delta <= 0.0 {
        return None;
    }

    let beta = beta.min(delta);
    let shrinkage = if beta <= 0.0 { 0.0 } else { beta / delta };

    let mut shrunk = emp_cov * (1.0 - shrinkage);
    for i in 0..p {
        shrunk[(i, i)] += shrinkage * mu;
    }

    if shrunk.iter().all(|v| v.is_finite()) {
        Some((shrunk, shrinkage))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::PricePoint;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn series(symbol: &str, points: &[(u32, f64)]) -> AssetSeries {
        AssetSeries::new(
            symbol,
            points
                .iter()
                .map(|&(d, price)| PricePoint { date: date(d), price }),
        )
    }

    #[test]
    fn test_align_forward_and_back_fills() {
        let a = series("A", &[(1, 10.0), (2, 11.0), (4, 12.0)]);
        let b = series("B", &[(2, 20.0), (3, 21.0)]);

        let (dates, prices) = align_prices(&[a, b]);

        assert_eq!(dates, vec![date(1), date(2), date(3), date(4)]);
        // A: day 3 carries day 2 forward
        assert_eq!(prices.column(0).iter().copied().collect::<Vec<_>>(), vec![10.0, 11.0, 11.0, 12.0]);
        // B: day 1 back-filled, day 4 forward-filled
        assert_eq!(prices.column(1).iter().copied().collect::<Vec<_>>(), vec![20.0, 20.0, 21.0, 21.0]);
    }

    #[test]
    fn test_simple_returns_drop_first_row() {
        let prices = DMatrix::from_row_slice(3, 1, &[100.0, 110.0, 99.0]);
        let returns = simple_returns(&prices);
        assert_eq!(returns.nrows(), 2);
        assert!((returns[(0, 0)] - 0.10).abs() < 1e-12);
        assert!((returns[(1, 0)] + 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_missing_history_names_symbols() {
        let a = series("A", &[(1, 10.0), (2, 11.0), (3, 12.0)]);
        let b = AssetSeries::new("B", vec![]);
        let c = AssetSeries::new("C", vec![]);

        let err = ReturnsEstimator::default().estimate(&[a, b, c]).unwrap_err();
        match err {
            Error::DataUnavailable(symbols) => assert_eq!(symbols, vec!["B", "C"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_expected_returns_are_annualized() {
        // Constant 1% daily growth
        let points: Vec<(u32, f64)> = (1..=10).map(|d| (d, 100.0 * 1.01f64.powi(d as i32))).collect();
        let a = series("A", &points);
        let b = series("B", &[(1, 50.0), (3, 51.0), (5, 50.5), (7, 52.0), (10, 53.0)]);

        let estimate = ReturnsEstimator::new(252.0).estimate(&[a, b]).unwrap();

        assert_eq!(estimate.observations(), 9);
        assert!((estimate.expected_returns[0] - 0.01 * 252.0).abs() < 1e-9);
        assert_eq!(estimate.dates.first(), Some(&date(2)));
    }

    #[test]
    fn test_ledoit_wolf_is_symmetric_and_shrinks() {
        let returns = DMatrix::from_row_slice(
            6,
            3,
            &[
                0.010, 0.020, -0.010, //
                -0.020, 0.010, 0.000, //
                0.015, -0.010, 0.020, //
                0.000, 0.005, -0.015, //
                0.030, 0.020, 0.010, //
                -0.010, -0.025, 0.005,
            ],
        );

        let (cov, shrinkage) = ledoit_wolf(&returns).unwrap();

        assert!((0.0..=1.0).contains(&shrinkage));
        for i in 0..3 {
            assert!(cov[(i, i)] > 0.0);
            for j in 0..3 {
                assert!((cov[(i, j)] - cov[(j, i)]).abs() < 1e-15);
            }
        }

        // Off-diagonal entries move towards zero
        let emp = {
            let x = centered(&returns);
            (x.transpose() * &x) / 6.0
        };
        assert!(cov[(0, 1)].abs() <= emp[(0, 1)].abs() + 1e-15);
    }

    #[test]
    fn test_ledoit_wolf_needs_two_observations() {
        let returns = DMatrix::from_row_slice(1, 2, &[0.01, 0.02]);
        assert!(ledoit_wolf(&returns).is_none());
    }

    #[test]
    fn test_sample_covariance_matches_hand_computation() {
        let returns = DMatrix::from_row_slice(3, 1, &[1.0, 2.0, 3.0]);
        let cov = sample_covariance(&returns);
        assert!((cov[(0, 0)] - 1.0).abs() < 1e-12);
    }
}
