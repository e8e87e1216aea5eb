use crate::core::cache::{KeyValueCollection, Store};
use crate::core::currency::validate_rate;
use crate::core::{LocalRateStore, RateError, RateKey, RateSource, Source};
use crate::store::KeyValueStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

const COLLECTION_NAME: &str = "rates";

/// Persisted value for a currency pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoredRate {
    pub rate: f64,
    pub updated_at: DateTime<Utc>,
}

/// Rates kept on the device between runs.
///
/// The store is "not ready" when its collection could not be opened; lookups
/// then miss instead of failing.
pub struct KvRateStore {
    collection: Option<Arc<dyn KeyValueCollection>>,
}

impl KvRateStore {
    pub fn new(store: &KeyValueStore) -> Self {
        Self {
            collection: store.get_collection(COLLECTION_NAME),
        }
    }

    pub fn with_collection(collection: Arc<dyn KeyValueCollection>) -> Self {
        Self {
            collection: Some(collection),
        }
    }

    pub fn unavailable() -> Self {
        Self { collection: None }
    }

    fn collection(&self) -> Result<&Arc<dyn KeyValueCollection>, RateError> {
        self.collection
            .as_ref()
            .ok_or_else(|| RateError::Store("rate store is not initialized".to_string()))
    }

    async fn put(&self, key: &RateKey, rate: f64, updated_at: DateTime<Utc>) -> Result<(), RateError> {
        let value = serde_json::to_vec(&StoredRate { rate, updated_at })
            .map_err(|e| RateError::Store(e.to_string()))?;
        self.collection()?
            .put(key.to_string().as_bytes(), &value)
            .await
            .map_err(|e| RateError::Store(e.to_string()))
    }

    /// All persisted rates, ordered by pair. Unreadable entries are skipped.
    pub async fn list(&self) -> Result<Vec<(RateKey, StoredRate)>, RateError> {
        let entries = self
            .collection()?
            .entries()
            .await
            .map_err(|e| RateError::Store(e.to_string()))?;

        Ok(entries
            .into_iter()
            .filter_map(|(key, value)| {
                let key = String::from_utf8(key).ok()?.parse::<RateKey>().ok()?;
                let stored = serde_json::from_slice::<StoredRate>(&value).ok()?;
                Some((key, stored))
            })
            .collect())
    }

    pub async fn clear(&self) -> Result<(), RateError> {
        self.collection()?
            .clear()
            .await
            .map_err(|e| RateError::Store(e.to_string()))
    }
}

#[async_trait]
impl LocalRateStore for KvRateStore {
    fn is_ready(&self) -> bool {
        self.collection.is_some()
    }

    async fn get_rate(&self, from: &str, to: &str) -> Result<Option<f64>, RateError> {
        let key = RateKey::new(from, to);
        let raw = self
            .collection()?
            .get(key.to_string().as_bytes())
            .await
            .map_err(|e| RateError::Store(e.to_string()))?;

        match raw {
            Some(raw) => {
                let stored: StoredRate = serde_json::from_slice(&raw)
                    .map_err(|e| RateError::Malformed(format!("stored rate for {key}: {e}")))?;
                Ok(Some(stored.rate))
            }
            None => Ok(None),
        }
    }

    /// Saves the rate and, when it is representable, its reciprocal.
    async fn save_rate(&self, from: &str, to: &str, rate: f64) -> Result<(), RateError> {
        let rate = validate_rate(rate)?;
        let key = RateKey::new(from, to);
        let now = Utc::now();
        self.put(&key, rate, now).await?;
        match validate_rate(1.0 / rate) {
            Ok(inverse) => self.put(&key.inverse(), inverse, now).await?,
            Err(_) => debug!("Reciprocal of {} not representable, skipping", key),
        }
        debug!("Persisted rate for {}", key);
        Ok(())
    }
}

/// Adapts a [`LocalRateStore`] to the resolver's fallback chain.
pub struct LocalStoreSource {
    store: Arc<dyn LocalRateStore>,
}

impl LocalStoreSource {
    pub fn new(store: Arc<dyn LocalRateStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RateSource for LocalStoreSource {
    fn source(&self) -> Source {
        Source::LocalStore
    }

    fn is_available(&self) -> bool {
        self.store.is_ready()
    }

    async fn lookup(&self, from: &str, to: &str) -> Result<Option<f64>, RateError> {
        match self.store.get_rate(from, to).await? {
            Some(rate) => validate_rate(rate).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryCollection;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_save_and_get_rate() {
        let store = KvRateStore::with_collection(Arc::new(MemoryCollection::new()));
        assert!(store.is_ready());

        // Initially, store is empty
        assert_eq!(store.get_rate("USD", "EUR").await.unwrap(), None);

        // Saving one direction also stores the reciprocal
        store.save_rate("USD", "EUR", 0.8).await.unwrap();

        assert_eq!(store.get_rate("USD", "EUR").await.unwrap(), Some(0.8));
        assert_eq!(store.get_rate("EUR", "USD").await.unwrap(), Some(1.25));
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let store = KvRateStore::unavailable();
        assert!(!store.is_ready());
        assert!(matches!(
            store.get_rate("USD", "EUR").await,
            Err(RateError::Store(_))
        ));
        assert!(store.save_rate("USD", "EUR", 0.8).await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_invalid_rate() {
        let store = KvRateStore::with_collection(Arc::new(MemoryCollection::new()));
        assert!(store.save_rate("USD", "EUR", 0.0).await.is_err());
        assert_eq!(store.get_rate("USD", "EUR").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unrepresentable_reciprocal_is_not_saved() {
        let store = KvRateStore::with_collection(Arc::new(MemoryCollection::new()));
        store.save_rate("AAA", "BBB", 1e-310).await.unwrap();

        assert!(store.get_rate("AAA", "BBB").await.unwrap().is_some());
        // 1 / 1e-310 overflows to infinity
        assert_eq!(store.get_rate("BBB", "AAA").await.unwrap(), None);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_malformed() {
        let collection = Arc::new(MemoryCollection::new());
        collection.put(b"USD:EUR", b"garbage").await.unwrap();
        let store = KvRateStore::with_collection(collection);

        assert!(matches!(
            store.get_rate("USD", "EUR").await,
            Err(RateError::Malformed(_))
        ));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_and_clear() {
        let store = KvRateStore::with_collection(Arc::new(MemoryCollection::new()));
        store.save_rate("USD", "EUR", 0.8).await.unwrap();
        store.save_rate("GBP", "USD", 1.25).await.unwrap();

        let listed = store.list().await.unwrap();
        let keys: Vec<String> = listed.iter().map(|(key, _)| key.to_string()).collect();
        assert_eq!(keys, vec!["EUR:USD", "GBP:USD", "USD:EUR", "USD:GBP"]);

        store.clear().await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disk_backed_store() {
        let dir = tempdir().unwrap();
        let kv = KeyValueStore::open(dir.path());
        let store = KvRateStore::new(&kv);
        assert!(store.is_ready());

        store.save_rate("USD", "JPY", 150.0).await.unwrap();
        assert_eq!(store.get_rate("USD", "JPY").await.unwrap(), Some(150.0));

        // Same collection handed out again by the store
        let again = KvRateStore::new(&kv);
        assert_eq!(again.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_local_store_source() {
        let store = Arc::new(KvRateStore::with_collection(Arc::new(MemoryCollection::new())));
        store.save_rate("USD", "EUR", 0.8).await.unwrap();

        let source = LocalStoreSource::new(store);
        assert!(source.is_available());
        assert_eq!(source.source(), Source::LocalStore);
        assert_eq!(source.lookup("USD", "EUR").await.unwrap(), Some(0.8));
        assert_eq!(source.lookup("USD", "GBP").await.unwrap(), None);

        let unavailable = LocalStoreSource::new(Arc::new(KvRateStore::unavailable()));
        assert!(!unavailable.is_available());
    }
}
