//! Exchange rate resolution
//!
//! [`ExchangeRateService`] answers "how many `to` for one `from`" by walking a
//! fixed chain: identity, the in-memory cache, then each [`RateSource`] in
//! order (local store, backend, external provider), and finally a cross rate
//! through [`PIVOT_CURRENCY`]. Every failing step is logged and treated as a
//! miss, so callers only ever see a rate or `None`.

use crate::core::currency::{PIVOT_CURRENCY, validate_rate};
use crate::core::rates::default_cache_duration;
use crate::core::{LocalRateStore, RateCache, RateSource, Resolution, Source};
use crate::providers::LocalStoreSource;
use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub struct ExchangeRateService {
    cache: RateCache,
    local: Arc<dyn LocalRateStore>,
    sources: Vec<Arc<dyn RateSource>>,
    external: Arc<dyn RateSource>,
}

impl ExchangeRateService {
    /// Builds the fallback chain `local store -> backend -> external`.
    pub fn new(
        local: Arc<dyn LocalRateStore>,
        backend: Option<Arc<dyn RateSource>>,
        external: Arc<dyn RateSource>,
    ) -> Self {
        let mut sources: Vec<Arc<dyn RateSource>> =
            vec![Arc::new(LocalStoreSource::new(Arc::clone(&local)))];
        sources.extend(backend);
        sources.push(Arc::clone(&external));
        Self {
            cache: RateCache::new(default_cache_duration()),
            local,
            sources,
            external,
        }
    }

    pub fn with_cache_duration(mut self, max_age: Duration) -> Self {
        self.cache = RateCache::new(max_age);
        self
    }

    pub fn cache(&self) -> &RateCache {
        &self.cache
    }

    /// Rate to multiply an amount in `from` by to get `to`, if one can be found.
    pub async fn get_rate(&self, from: &str, to: &str) -> Option<f64> {
        self.resolve(from, to).await.map(|resolution| resolution.rate)
    }

    #[instrument(name = "ResolveRate", skip(self), fields(from = %from, to = %to))]
    pub async fn resolve(&self, from: &str, to: &str) -> Option<Resolution> {
        if let Some(resolution) = self.resolve_direct(from, to).await {
            return Some(resolution);
        }

        if from == PIVOT_CURRENCY || to == PIVOT_CURRENCY {
            debug!("No direct rate and pair includes pivot, giving up");
            return None;
        }

        // Both legs include the pivot, so they never reach this point again.
        let to_pivot = self.resolve_direct(from, PIVOT_CURRENCY).await?;
        let from_pivot = self.resolve_direct(PIVOT_CURRENCY, to).await?;
        let rate = match validate_rate(to_pivot.rate * from_pivot.rate) {
            Ok(rate) => rate,
            Err(e) => {
                warn!(
                    kind = e.kind(),
                    error = %e,
                    "Cross rate via {} for {}->{} is unusable",
                    PIVOT_CURRENCY,
                    from,
                    to
                );
                return None;
            }
        };

        debug!(
            "Cross rate via {}: {} * {} = {}",
            PIVOT_CURRENCY, to_pivot.rate, from_pivot.rate, rate
        );
        self.remember(from, to, rate, Source::Cross).await;
        Some(Resolution {
            rate,
            source: Source::Cross,
        })
    }

    /// Converts `amount`, returning it unchanged when no rate is available.
    pub async fn convert(&self, amount: f64, from: &str, to: &str) -> f64 {
        if from == to {
            return amount;
        }
        match self.get_rate(from, to).await {
            Some(rate) => amount * rate,
            None => {
                debug!("No rate for {}->{}, leaving amount unconverted", from, to);
                amount
            }
        }
    }

    /// Drops the cached pair and asks the external provider directly.
    pub async fn force_update_rate(&self, from: &str, to: &str) -> Option<f64> {
        if from == to {
            return Some(1.0);
        }
        self.cache.invalidate_pair(from, to);
        let rate = self.try_source(self.external.as_ref(), from, to).await?;
        self.remember(from, to, rate, Source::External).await;
        Some(rate)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    async fn resolve_direct(&self, from: &str, to: &str) -> Option<Resolution> {
        if from == to {
            return Some(Resolution {
                rate: 1.0,
                source: Source::Identity,
            });
        }

        if let Some(rate) = self.cache.get(from, to) {
            return Some(Resolution {
                rate,
                source: Source::Cache,
            });
        }

        for source in &self.sources {
            if !source.is_available() {
                debug!("Skipping unavailable source: {}", source.source());
                continue;
            }
            if let Some(rate) = self.try_source(source.as_ref(), from, to).await {
                self.remember(from, to, rate, source.source()).await;
                return Some(Resolution {
                    rate,
                    source: source.source(),
                });
            }
        }

        None
    }

    async fn try_source(&self, source: &dyn RateSource, from: &str, to: &str) -> Option<f64> {
        match source.lookup(from, to).await.and_then(|found| found.map(validate_rate).transpose()) {
            Ok(Some(rate)) => {
                debug!("Rate {}->{} = {} from {}", from, to, rate, source.source());
                Some(rate)
            }
            Ok(None) => {
                debug!("No rate {}->{} from {}", from, to, source.source());
                None
            }
            Err(e) => {
                warn!(
                    source = %source.source(),
                    kind = e.kind(),
                    error = %e,
                    "Rate lookup failed for {}->{}",
                    from,
                    to
                );
                None
            }
        }
    }

    async fn remember(&self, from: &str, to: &str, rate: f64, source: Source) {
        self.cache.put_pair(from, to, rate);

        if source == Source::LocalStore || !self.local.is_ready() {
            return;
        }
        if let Err(e) = self.local.save_rate(from, to, rate).await {
            warn!(kind = e.kind(), error = %e, "Failed to persist rate for {}->{}", from, to);
        }
    }
}
