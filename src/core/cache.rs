//! Key-value persistence abstractions

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A named bucket of byte keys and values.
#[async_trait]
pub trait KeyValueCollection: Send + Sync {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// All entries, ordered by key.
    async fn entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    async fn clear(&self) -> Result<()>;
}

pub trait Store {
    /// Opens (or creates) the named collection, `None` when the store is unusable.
    fn get_collection(&self, name: &str) -> Option<Arc<dyn KeyValueCollection>>;
}
