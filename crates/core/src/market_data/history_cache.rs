//! Bounded, time-limited cache of price histories.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use log::debug;

use super::market_data_model::{AssetSeries, HistoryWindow};

struct CachedSeries {
    series: AssetSeries,
    inserted_at: Instant,
}

/// Price-history cache keyed by `(symbol, window)`.
///
/// Entries expire after `ttl`. When `capacity` is reached the oldest entry
/// is evicted. A capacity of zero disables caching.
pub struct HistoryCache {
    entries: DashMap<(String, HistoryWindow), CachedSeries>,
    ttl: Duration,
    capacity: usize,
}

impl HistoryCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            capacity,
        }
    }

    /// Returns a fresh cached series, dropping it if it has expired.
    pub fn get(&self, symbol: &str, window: HistoryWindow) -> Option<AssetSeries> {
        let key = (symbol.to_string(), window);
        let lookup = self
            .entries
            .get(&key)
            .map(|entry| (entry.inserted_at.elapsed() < self.ttl, entry.series.clone()));

        match lookup {
            Some((true, series)) => Some(series),
            Some((false, _)) => {
                self.entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, window: HistoryWindow, series: AssetSeries) {
        if self.capacity == 0 {
            return;
        }

        let key = (series.symbol.clone(), window);
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.entries
                .retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
            if self.entries.len() >= self.capacity {
                self.evict_oldest();
            }
        }

        self.entries.insert(
            key,
            CachedSeries {
                series,
                inserted_at: Instant::now(),
            },
        );
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.inserted_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            debug!("Evicting cached history for {}", key.0);
            self.entries.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::PricePoint;
    use chrono::NaiveDate;

    fn window() -> HistoryWindow {
        HistoryWindow::trailing(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(), 730)
    }

    fn series(symbol: &str) -> AssetSeries {
        AssetSeries::new(
            symbol,
            vec![PricePoint {
                date: NaiveDate::from_ymd_opt(2024, 6, 28).unwrap(),
                price: 100.0,
            }],
        )
    }

    #[test]
    fn test_hit_within_ttl() {
        let cache = HistoryCache::new(Duration::from_secs(60), 8);
        cache.insert(window(), series("AAPL"));
        assert_eq!(cache.get("AAPL", window()), Some(series("AAPL")));
        assert!(cache.get("MSFT", window()).is_none());
    }

    #[test]
    fn test_expired_entry_is_removed() {
        let cache = HistoryCache::new(Duration::ZERO, 8);
        cache.insert(window(), series("AAPL"));
        assert!(cache.get("AAPL", window()).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let cache = HistoryCache::new(Duration::from_secs(60), 2);
        cache.insert(window(), series("AAPL"));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(window(), series("MSFT"));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(window(), series("GOOG"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("AAPL", window()).is_none());
        assert!(cache.get("GOOG", window()).is_some());
    }

    #[test]
    fn test_zero_capacity_disables_cache() {
        let cache = HistoryCache::new(Duration::from_secs(60), 0);
        cache.insert(window(), series("AAPL"));
        assert!(cache.is_empty());
    }
}
