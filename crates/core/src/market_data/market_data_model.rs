//! Price series and company metadata consumed by the optimizer.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::constants::UNKNOWN_SECTOR;

/// Inclusive calendar window of requested price history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl HistoryWindow {
    /// Window of `days` calendar days ending on `end`.
    pub fn trailing(end: NaiveDate, days: i64) -> Self {
        Self {
            start: end - Duration::days(days.max(1)),
            end,
        }
    }
}

/// One adjusted-close observation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Daily price history for one symbol, ordered by date ascending.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetSeries {
    pub symbol: String,
    pub points: Vec<PricePoint>,
}

impl AssetSeries {
    /// Builds a series, sorting by date and keeping the last price seen
    /// for a duplicated date. Non-finite and non-positive prices are dropped.
    pub fn new(symbol: impl Into<String>, points: impl IntoIterator<Item = PricePoint>) -> Self {
        let mut points: Vec<PricePoint> = points
            .into_iter()
            .filter(|p| p.price.is_finite() && p.price > 0.0)
            .collect();
        points.sort_by_key(|p| p.date);

        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.date == point.date => *last = point,
                _ => deduped.push(point),
            }
        }

        Self {
            symbol: symbol.into(),
            points: deduped,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }
}

/// Display name and sector for an allocation line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyInfo {
    pub name: String,
    pub sector: String,
}

impl CompanyInfo {
    /// Placeholder used when the provider has no profile for `symbol`.
    pub fn unknown(symbol: &str) -> Self {
        Self {
            name: symbol.to_string(),
            sector: UNKNOWN_SECTOR.to_string(),
        }
    }
}
