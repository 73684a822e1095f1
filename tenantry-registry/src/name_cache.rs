//! Bounded, bidirectional name to tenant id cache.
//!
//! Cache-aside over a [`NameFetcher`]. Only positive results are cached, so a
//! name that does not exist yet is looked up again on every call. Evictions
//! bump a generation counter; a miss-load that started before an eviction
//! returns its result to the caller but never repopulates the cache.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use tenantry_core::naming::{APPLICATION_INFOS, PROPERTY_ACTIVE_NAME};
use tenantry_core::{ApplicationInfo, CollectionScope, TenantId, TenantryResult, MANAGEMENT_TENANT_ID};
use tenantry_storage::EntityStore;

/// Authoritative name lookup used on a cache miss.
pub trait NameFetcher: Send + Sync {
    /// Id of the active tenant holding `name`, if any.
    fn fetch_id(&self, name: &str) -> TenantryResult<Option<TenantId>>;
}

/// Resolves names through the management tenant's `application_infos`
/// collection, keyed by the unique `active_name` property.
pub struct ApplicationInfoFetcher {
    entities: Arc<dyn EntityStore>,
}

impl ApplicationInfoFetcher {
    pub fn new(entities: Arc<dyn EntityStore>) -> Self {
        Self { entities }
    }
}

impl NameFetcher for ApplicationInfoFetcher {
    fn fetch_id(&self, name: &str) -> TenantryResult<Option<TenantId>> {
        let scope = CollectionScope::new(MANAGEMENT_TENANT_ID, APPLICATION_INFOS);
        let Some(entity) = self
            .entities
            .find_by_unique(&scope, PROPERTY_ACTIVE_NAME, name)?
        else {
            return Ok(None);
        };
        let info = ApplicationInfo::from_entity(&entity)?;
        Ok(Some(info.tenant_id))
    }
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NameCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entry_count: u64,
}

impl NameCacheStats {
    /// Hit rate in `[0.0, 1.0]`.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct NameState {
    forward: LruCache<String, TenantId>,
    reverse: HashMap<TenantId, String>,
    generation: u64,
}

impl NameState {
    /// Drop the reverse mapping of a forward entry that left the cache.
    fn forget(&mut self, name: &str, id: TenantId) {
        if self.reverse.get(&id).is_some_and(|n| n == name) {
            self.reverse.remove(&id);
        }
    }
}

pub struct NameIdCache {
    state: Mutex<NameState>,
    fetcher: Arc<dyn NameFetcher>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl NameIdCache {
    pub fn new(capacity: usize, fetcher: Arc<dyn NameFetcher>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(NameState {
                forward: LruCache::new(capacity),
                reverse: HashMap::new(),
                generation: 0,
            }),
            fetcher,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    // The state is plain data, valid after any panic in a holder.
    fn state(&self) -> MutexGuard<'_, NameState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve a canonical name to its tenant id.
    ///
    /// Fetch errors are returned as-is and leave the cache untouched.
    pub fn resolve(&self, name: &str) -> TenantryResult<Option<TenantId>> {
        let generation = {
            let mut state = self.state();
            if let Some(id) = state.forward.get(name) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(*id));
            }
            state.generation
        };
        self.misses.fetch_add(1, Ordering::Relaxed);

        let fetched = self.fetcher.fetch_id(name)?;
        let Some(id) = fetched else {
            return Ok(None);
        };

        let mut state = self.state();
        if state.generation == generation {
            if let Some((old_name, old_id)) = state.forward.push(name.to_string(), id) {
                state.forget(&old_name, old_id);
            }
            state.reverse.insert(id, name.to_string());
        } else {
            tracing::debug!(name, "Name evicted during load, not caching");
        }
        Ok(Some(id))
    }

    /// Remove one name. Any miss-load in flight will not cache its result.
    pub fn evict(&self, name: &str) {
        let mut state = self.state();
        if let Some(id) = state.forward.pop(name) {
            state.forget(name, id);
        }
        state.generation += 1;
    }

    pub fn evict_all(&self) {
        let mut state = self.state();
        state.forward.clear();
        state.reverse.clear();
        state.generation += 1;
    }

    /// Reverse lookup of a cached entry. Never touches the store.
    pub fn cached_name(&self, id: TenantId) -> Option<String> {
        self.state().reverse.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state().forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> NameCacheStats {
        NameCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::RwLock;
    use tenantry_core::{StorageError, TenantryError};

    #[derive(Default)]
    struct MapFetcher {
        names: RwLock<HashMap<String, TenantId>>,
        calls: AtomicU64,
        fail: std::sync::atomic::AtomicBool,
    }

    impl MapFetcher {
        fn set(&self, name: &str, id: TenantId) {
            self.names.write().unwrap().insert(name.to_string(), id);
        }

        fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl NameFetcher for MapFetcher {
        fn fetch_id(&self, name: &str) -> TenantryResult<Option<TenantId>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable {
                    reason: "down".to_string(),
                }
                .into());
            }
            Ok(self.names.read().unwrap().get(name).copied())
        }
    }

    fn cache_with(capacity: usize) -> (NameIdCache, Arc<MapFetcher>) {
        let fetcher = Arc::new(MapFetcher::default());
        (NameIdCache::new(capacity, fetcher.clone()), fetcher)
    }

    #[test]
    fn test_hit_skips_fetcher() {
        let (cache, fetcher) = cache_with(8);
        let id = TenantId::now_v7();
        fetcher.set("org/app", id);

        assert_eq!(cache.resolve("org/app").unwrap(), Some(id));
        assert_eq!(cache.resolve("org/app").unwrap(), Some(id));
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(cache.cached_name(id).as_deref(), Some("org/app"));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_absent_is_not_cached() {
        let (cache, fetcher) = cache_with(8);
        assert_eq!(cache.resolve("org/app").unwrap(), None);

        let id = TenantId::now_v7();
        fetcher.set("org/app", id);
        assert_eq!(cache.resolve("org/app").unwrap(), Some(id));
        assert_eq!(fetcher.calls(), 2);
    }

    #[test]
    fn test_fetch_error_is_typed() {
        let (cache, fetcher) = cache_with(8);
        fetcher.fail.store(true, Ordering::SeqCst);

        let err = cache.resolve("org/app").unwrap_err();
        assert!(matches!(err, TenantryError::Storage(StorageError::Unavailable { .. })));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_evict_forces_reload() {
        let (cache, fetcher) = cache_with(8);
        let first = TenantId::now_v7();
        fetcher.set("org/app", first);
        cache.resolve("org/app").unwrap();

        let second = TenantId::now_v7();
        fetcher.set("org/app", second);
        assert_eq!(cache.resolve("org/app").unwrap(), Some(first));

        cache.evict("org/app");
        assert!(cache.cached_name(first).is_none());
        assert_eq!(cache.resolve("org/app").unwrap(), Some(second));
    }

    #[test]
    fn test_eviction_during_load_does_not_repopulate() {
        struct EvictingFetcher {
            cache: std::sync::OnceLock<Arc<NameIdCache>>,
            id: TenantId,
        }

        impl NameFetcher for EvictingFetcher {
            fn fetch_id(&self, name: &str) -> TenantryResult<Option<TenantId>> {
                if let Some(cache) = self.cache.get() {
                    cache.evict(name);
                }
                Ok(Some(self.id))
            }
        }

        let id = TenantId::now_v7();
        let fetcher = Arc::new(EvictingFetcher {
            cache: std::sync::OnceLock::new(),
            id,
        });
        let cache = Arc::new(NameIdCache::new(8, fetcher.clone()));
        let _ = fetcher.cache.set(cache.clone());

        assert_eq!(cache.resolve("org/app").unwrap(), Some(id));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_evict_all_clears_both_directions() {
        let (cache, fetcher) = cache_with(8);
        let id = TenantId::now_v7();
        fetcher.set("org/app", id);
        cache.resolve("org/app").unwrap();

        cache.evict_all();
        assert!(cache.is_empty());
        assert!(cache.cached_name(id).is_none());
    }

    proptest! {
        #[test]
        fn prop_cache_stays_bounded(capacity in 1usize..8, names in prop::collection::vec("[a-z]{1,6}/[a-z]{1,6}", 0..40)) {
            let (cache, fetcher) = cache_with(capacity);
            for name in &names {
                fetcher.set(name, TenantId::now_v7());
                cache.resolve(name).unwrap();
            }
            prop_assert!(cache.len() <= capacity);
            let reverse_len = cache.state().reverse.len();
            prop_assert_eq!(reverse_len, cache.len());
        }
    }
}
