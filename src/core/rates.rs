//! In-memory exchange rate cache

use super::currency::validate_rate;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Freshness window of a cached rate.
pub fn default_cache_duration() -> Duration {
    Duration::hours(24)
}

/// Ordered currency pair, rendered as `FROM:TO`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RateKey {
    pub from: String,
    pub to: String,
}

impl RateKey {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn inverse(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }
}

impl Display for RateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.from, self.to)
    }
}

impl FromStr for RateKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((from, to)) if !from.is_empty() && !to.is_empty() => Ok(RateKey::new(from, to)),
            _ => Err(anyhow::anyhow!("Invalid rate key: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateEntry {
    pub rate: f64,
    pub timestamp: DateTime<Utc>,
}

impl RateEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now - self.timestamp < max_age
    }
}

/// Process-wide rate cache owned by the resolver.
///
/// Stale entries are ignored on read but never evicted; only [`RateCache::clear`]
/// and [`RateCache::invalidate_pair`] remove entries. The lock is never held
/// across an await point.
pub struct RateCache {
    entries: RwLock<HashMap<RateKey, RateEntry>>,
    max_age: Duration,
}

impl RateCache {
    pub fn new(max_age: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_age,
        }
    }

    pub fn get(&self, from: &str, to: &str) -> Option<f64> {
        self.get_at(from, to, Utc::now())
    }

    pub fn get_at(&self, from: &str, to: &str, now: DateTime<Utc>) -> Option<f64> {
        let key = RateKey::new(from, to);
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        match entries.get(&key) {
            Some(entry) if entry.is_fresh(now, self.max_age) => {
                debug!("Cache HIT for key: {}", key);
                Some(entry.rate)
            }
            Some(_) => {
                debug!("Cache entry stale for key: {}", key);
                None
            }
            None => {
                debug!("Cache MISS for key: {}", key);
                None
            }
        }
    }

    /// Stores `rate` for `from -> to` and its reciprocal for `to -> from`.
    ///
    /// Rates that are not finite and positive are not stored, and neither is
    /// a reciprocal that over- or underflows.
    pub fn put_pair(&self, from: &str, to: &str, rate: f64) {
        self.put_pair_at(from, to, rate, Utc::now());
    }

    pub fn put_pair_at(&self, from: &str, to: &str, rate: f64, timestamp: DateTime<Utc>) {
        let key = RateKey::new(from, to);
        if validate_rate(rate).is_err() {
            debug!("Cache SKIP for key: {} (rate {})", key, rate);
            return;
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match validate_rate(1.0 / rate) {
            Ok(inverse) => {
                entries.insert(key.inverse(), RateEntry {
                    rate: inverse,
                    timestamp,
                });
            }
            Err(_) => debug!("Cache SKIP for key: {} (reciprocal of {})", key.inverse(), rate),
        }
        debug!("Cache PUT for key: {}", key);
        entries.insert(key, RateEntry { rate, timestamp });
    }

    pub fn invalidate_pair(&self, from: &str, to: &str) {
        let key = RateKey::new(from, to);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(&key.inverse());
        entries.remove(&key);
        debug!("Cache REMOVE for pair: {}", key);
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        debug!("Cache CLEAR");
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RateCache {
    fn default() -> Self {
        Self::new(default_cache_duration())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_get_put() {
        let cache = RateCache::default();

        // Initially, cache is empty
        assert!(cache.get("USD", "EUR").is_none());

        cache.put_pair("USD", "EUR", 0.8);

        // Both directions are served
        assert_eq!(cache.get("USD", "EUR"), Some(0.8));
        assert_eq!(cache.get("EUR", "USD"), Some(1.25));
        assert!(cache.get("USD", "GBP").is_none());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_entry_fresh_until_window_ends() {
        let cache = RateCache::default();
        let written = Utc::now();
        cache.put_pair_at("USD", "EUR", 0.9, written);

        let just_before = written + Duration::hours(24) - Duration::seconds(1);
        assert_eq!(cache.get_at("USD", "EUR", just_before), Some(0.9));

        let at_expiry = written + Duration::hours(24);
        assert!(cache.get_at("USD", "EUR", at_expiry).is_none());
        assert!(cache.get_at("EUR", "USD", at_expiry).is_none());

        // Stale entries stay in the map until cleared
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_custom_max_age() {
        let cache = RateCache::new(Duration::minutes(5));
        let written = Utc::now();
        cache.put_pair_at("GBP", "JPY", 190.0, written);

        assert!(
            cache
                .get_at("GBP", "JPY", written + Duration::minutes(4))
                .is_some()
        );
        assert!(
            cache
                .get_at("GBP", "JPY", written + Duration::minutes(5))
                .is_none()
        );
    }

    #[test]
    fn test_invalidate_pair_removes_both_directions() {
        let cache = RateCache::default();
        cache.put_pair("USD", "EUR", 0.8);
        cache.put_pair("USD", "GBP", 0.7);

        cache.invalidate_pair("EUR", "USD");

        assert!(cache.get("USD", "EUR").is_none());
        assert!(cache.get("EUR", "USD").is_none());
        assert_eq!(cache.get("USD", "GBP"), Some(0.7));
    }

    #[test]
    fn test_unrepresentable_reciprocal_is_not_cached() {
        let cache = RateCache::default();

        // 1 / 1e-310 overflows to infinity
        cache.put_pair("AAA", "BBB", 1e-310);
        assert_eq!(cache.get("AAA", "BBB"), Some(1e-310));
        assert!(cache.get("BBB", "AAA").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalid_rate_is_not_cached() {
        let cache = RateCache::default();

        for rate in [0.0, -1.0, f64::INFINITY, f64::NAN] {
            cache.put_pair("USD", "EUR", rate);
        }
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_clear() {
        let cache = RateCache::default();
        cache.put_pair("USD", "EUR", 0.8);
        cache.put_pair("USD", "GBP", 0.7);

        cache.clear();

        assert!(cache.is_empty());
        assert!(cache.get("USD", "EUR").is_none());
    }

    #[test]
    fn test_rate_key_round_trip() {
        let key = RateKey::new("USD", "EUR");
        assert_eq!(key.to_string(), "USD:EUR");
        assert_eq!("USD:EUR".parse::<RateKey>().unwrap(), key);
        assert_eq!(key.inverse(), RateKey::new("EUR", "USD"));
        assert!("USDEUR".parse::<RateKey>().is_err());
        assert!(":EUR".parse::<RateKey>().is_err());
    }
}
