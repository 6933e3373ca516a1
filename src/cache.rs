use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::model::PlaceHit;

/// Storage for ranked suggestion lists, keyed by [`crate::text::cache_key`].
///
/// Writes for a key always carry the same ranked value, so implementations
/// need no ordering between concurrent writers.
pub trait SuggestionCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<PlaceHit>>;
    fn set(&self, key: &str, hits: Vec<PlaceHit>);
}

static SHARED: Lazy<Arc<MemoryCache>> = Lazy::new(|| Arc::new(MemoryCache::default()));

/// Process-lifetime map. Entries are never evicted.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Vec<PlaceHit>>>,
}

impl MemoryCache {
    /// The instance shared by every field in the process.
    pub fn shared() -> Arc<MemoryCache> {
        Arc::clone(&SHARED)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl SuggestionCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Vec<PlaceHit>> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, hits: Vec<PlaceHit>) {
        self.entries.write().insert(key.to_string(), hits);
    }
}
