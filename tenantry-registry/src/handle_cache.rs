//! Bounded cache of per-tenant handles with single-flight construction.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use once_cell::sync::OnceCell;
use tenantry_core::{TenantId, TenantryResult};

type Slot<H> = Arc<OnceCell<Arc<H>>>;
type Loader<H> = Box<dyn Fn(TenantId) -> TenantryResult<H> + Send + Sync>;

/// LRU of tenant handles.
///
/// Each id maps to a slot that is filled at most once. Concurrent `get`
/// calls for the same id block on the slot and receive the same `Arc`. A
/// failed construction leaves the slot empty, so the next caller retries.
/// The slot table lock is never held while a handle is being built.
///
/// Slots under construction are also tracked outside the LRU, so neither
/// eviction nor [`invalidate_all`](Self::invalidate_all) can start a second
/// build for an id whose first build is still running.
pub struct TenantHandleCache<H> {
    slots: Mutex<Slots<H>>,
    loader: Loader<H>,
    constructions: AtomicU64,
}

struct Slots<H> {
    lru: LruCache<TenantId, Slot<H>>,
    building: HashMap<TenantId, Slot<H>>,
}

impl<H> Slots<H> {
    /// Slot for `tenant`, joining a build in flight or starting a new one.
    fn slot_for(&mut self, tenant: TenantId) -> Slot<H> {
        if let Some(slot) = self.lru.get(&tenant) {
            return Arc::clone(slot);
        }
        let slot = match self.building.get(&tenant) {
            Some(slot) => Arc::clone(slot),
            None => {
                let slot: Slot<H> = Arc::new(OnceCell::new());
                self.building.insert(tenant, Arc::clone(&slot));
                slot
            }
        };
        self.lru.push(tenant, Arc::clone(&slot));
        slot
    }

    /// Forget `slot` once its build has finished, dropping it from the LRU
    /// too if the build failed.
    fn finish(&mut self, tenant: TenantId, slot: &Slot<H>) {
        if self
            .building
            .get(&tenant)
            .is_some_and(|s| Arc::ptr_eq(s, slot))
        {
            self.building.remove(&tenant);
        }
        let failed = self
            .lru
            .peek(&tenant)
            .is_some_and(|s| Arc::ptr_eq(s, slot) && s.get().is_none());
        if failed {
            self.lru.pop(&tenant);
        }
    }
}

impl<H> TenantHandleCache<H> {
    pub fn new<F>(capacity: usize, loader: F) -> Self
    where
        F: Fn(TenantId) -> TenantryResult<H> + Send + Sync + 'static,
    {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            slots: Mutex::new(Slots {
                lru: LruCache::new(capacity),
                building: HashMap::new(),
            }),
            loader: Box::new(loader),
            constructions: AtomicU64::new(0),
        }
    }

    fn slots(&self) -> MutexGuard<'_, Slots<H>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn construct(&self, tenant: TenantId) -> TenantryResult<H> {
        self.constructions.fetch_add(1, Ordering::SeqCst);
        (self.loader)(tenant)
    }

    /// Get the handle for a tenant, building it on first use.
    ///
    /// A failed cached load is retried once. If that fails too, an uncached
    /// handle is built directly; only its failure is returned.
    pub fn get(&self, tenant: TenantId) -> TenantryResult<Arc<H>> {
        if let Ok(handle) = self.get_cached(tenant) {
            return Ok(handle);
        }
        tracing::warn!(tenant_id = %tenant, "Handle construction failed, retrying");

        match self.get_cached(tenant) {
            Ok(handle) => Ok(handle),
            Err(err) => {
                tracing::error!(
                    tenant_id = %tenant,
                    error = %err,
                    "Cached handle construction failed twice, building uncached handle"
                );
                self.construct(tenant).map(Arc::new)
            }
        }
    }

    fn get_cached(&self, tenant: TenantId) -> TenantryResult<Arc<H>> {
        let slot = self.slots().slot_for(tenant);
        if let Some(handle) = slot.get() {
            return Ok(Arc::clone(handle));
        }

        let built = slot
            .get_or_try_init(|| self.construct(tenant).map(Arc::new))
            .map(Arc::clone);
        self.slots().finish(tenant, &slot);
        built
    }

    /// Cached handle, without building or touching recency.
    pub fn peek(&self, tenant: TenantId) -> Option<Arc<H>> {
        self.slots()
            .lru
            .peek(&tenant)
            .and_then(|slot| slot.get().cloned())
    }

    /// Drop every cached handle. A build still running is joined by later
    /// callers instead of being started again.
    pub fn invalidate_all(&self) {
        self.slots().lru.clear();
    }

    /// Snapshot of every built handle.
    pub fn handles(&self) -> Vec<Arc<H>> {
        self.slots()
            .lru
            .iter()
            .filter_map(|(_, slot)| slot.get().cloned())
            .collect()
    }

    /// Number of built handles.
    pub fn len(&self) -> usize {
        self.slots()
            .lru
            .iter()
            .filter(|(_, slot)| slot.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total constructions attempted, cached or not.
    pub fn constructions(&self) -> u64 {
        self.constructions.load(Ordering::SeqCst)
    }
}
