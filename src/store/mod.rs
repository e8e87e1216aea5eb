pub mod disk;
pub mod memory;

use crate::core::cache::{KeyValueCollection, Store};
use disk::DiskCollection;
use fjall::{Keyspace, PartitionCreateOptions};
use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, PoisonError, RwLock},
};
use tracing::warn;

/// A thread-safe fjall-backed store that can hold multiple collections.
///
/// When the keyspace could not be opened every collection is unavailable.
pub struct KeyValueStore {
    collections: RwLock<HashMap<String, Arc<dyn KeyValueCollection>>>,
    keyspace: Option<Keyspace>,
}

impl KeyValueStore {
    pub fn open(path: &Path) -> Self {
        let keyspace = match fjall::Config::new(path.join("cache")).open() {
            Ok(keyspace) => Some(keyspace),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Failed to open rate store");
                None
            }
        };

        Self {
            collections: RwLock::new(HashMap::new()),
            keyspace,
        }
    }
}

impl Store for KeyValueStore {
    fn get_collection(&self, name: &str) -> Option<Arc<dyn KeyValueCollection>> {
        if let Some(collection) = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Some(Arc::clone(collection));
        }

        let keyspace = self.keyspace.as_ref()?;
        let new_collection: Arc<dyn KeyValueCollection> =
            match keyspace.open_partition(name, PartitionCreateOptions::default()) {
                Ok(partition) => Arc::new(DiskCollection::new(keyspace.clone(), partition)),
                Err(e) => {
                    warn!(error = %e, collection = name, "Failed to open partition");
                    return None;
                }
            };

        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Some(Arc::clone(
            collections
                .entry(name.to_string())
                .or_insert(new_collection),
        ))
    }
}
