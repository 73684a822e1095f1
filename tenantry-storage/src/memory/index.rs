//! In-memory search index.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tenantry_core::naming::index_name;
use tenantry_core::{CollectionScope, Entity, EntityId, StorageError, TenantId, TenantryResult};

use super::faults::{FaultInjector, FaultPoint};
use crate::traits::SearchIndex;

#[derive(Debug, Default)]
struct TenantIndex {
    /// Documents written since the last refresh are pending, not searchable.
    pending: HashMap<(String, EntityId), Entity>,
    visible: HashMap<(String, EntityId), Entity>,
    extra_indexes: HashSet<String>,
}

/// One logical index per tenant with explicit refresh visibility.
#[derive(Debug, Default)]
pub struct InMemorySearchIndex {
    indexes: RwLock<HashMap<TenantId, TenantIndex>>,
    initialize_calls: AtomicU64,
    faults: Arc<FaultInjector>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: Arc<FaultInjector>) -> Self {
        Self {
            faults,
            ..Self::default()
        }
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    /// Total `initialize_index` calls that reached the engine.
    pub fn initialize_calls(&self) -> u64 {
        self.initialize_calls.load(Ordering::SeqCst)
    }

    /// Searchable (refreshed) document count for a tenant.
    pub fn visible_count(&self, tenant: TenantId) -> u64 {
        self.indexes
            .read()
            .map(|indexes| indexes.get(&tenant).map_or(0, |i| i.visible.len() as u64))
            .unwrap_or(0)
    }

    /// Physical indexes added behind the tenant's alias.
    pub fn extra_indexes(&self, tenant: TenantId) -> Vec<String> {
        let mut names: Vec<String> = self
            .indexes
            .read()
            .map(|indexes| {
                indexes
                    .get(&tenant)
                    .map(|i| i.extra_indexes.iter().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    fn missing(tenant: TenantId) -> StorageError {
        StorageError::IndexError {
            index_name: index_name(tenant),
            reason: "index does not exist".to_string(),
        }
    }
}

impl SearchIndex for InMemorySearchIndex {
    fn initialize_index(&self, tenant: TenantId) -> TenantryResult<()> {
        self.faults.check(FaultPoint::IndexInitialize, Some(tenant))?;
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        let mut indexes = self.indexes.write().map_err(|_| StorageError::LockPoisoned)?;
        indexes.entry(tenant).or_default();
        Ok(())
    }

    fn index_exists(&self, tenant: TenantId) -> TenantryResult<bool> {
        let indexes = self.indexes.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(indexes.contains_key(&tenant))
    }

    fn refresh(&self, tenant: TenantId) -> TenantryResult<()> {
        self.faults.check(FaultPoint::IndexRefresh, Some(tenant))?;
        let mut indexes = self.indexes.write().map_err(|_| StorageError::LockPoisoned)?;
        let index = indexes.get_mut(&tenant).ok_or_else(|| Self::missing(tenant))?;
        let pending = std::mem::take(&mut index.pending);
        index.visible.extend(pending);
        Ok(())
    }

    fn delete_index(&self, tenant: TenantId) -> TenantryResult<()> {
        self.faults.check(FaultPoint::IndexDelete, Some(tenant))?;
        let mut indexes = self.indexes.write().map_err(|_| StorageError::LockPoisoned)?;
        indexes.remove(&tenant);
        Ok(())
    }

    fn index_entity(&self, scope: &CollectionScope, entity: &Entity) -> TenantryResult<()> {
        self.faults.check(FaultPoint::IndexEntity, Some(scope.tenant))?;
        let mut indexes = self.indexes.write().map_err(|_| StorageError::LockPoisoned)?;
        let index = indexes
            .get_mut(&scope.tenant)
            .ok_or_else(|| Self::missing(scope.tenant))?;
        index
            .pending
            .insert((scope.collection.clone(), entity.id), entity.clone());
        Ok(())
    }

    fn remove_entity(&self, scope: &CollectionScope, id: EntityId) -> TenantryResult<()> {
        self.faults.check(FaultPoint::IndexEntity, Some(scope.tenant))?;
        let mut indexes = self.indexes.write().map_err(|_| StorageError::LockPoisoned)?;
        if let Some(index) = indexes.get_mut(&scope.tenant) {
            let key = (scope.collection.clone(), id);
            index.pending.remove(&key);
            index.visible.remove(&key);
        }
        Ok(())
    }

    fn add_index(
        &self,
        tenant: TenantId,
        suffix: &str,
        shards: u32,
        replicas: u32,
        write_consistency: &str,
    ) -> TenantryResult<()> {
        self.faults.check(FaultPoint::IndexInitialize, Some(tenant))?;
        if shards == 0 {
            return Err(StorageError::IndexError {
                index_name: format!("{}_{suffix}", index_name(tenant)),
                reason: "shard count must be positive".to_string(),
            }
            .into());
        }
        let mut indexes = self.indexes.write().map_err(|_| StorageError::LockPoisoned)?;
        let index = indexes.get_mut(&tenant).ok_or_else(|| Self::missing(tenant))?;
        index
            .extra_indexes
            .insert(format!("{}_{suffix}", index_name(tenant)));
        tracing::debug!(
            tenant_id = %tenant,
            suffix,
            shards,
            replicas,
            write_consistency,
            "Added physical index"
        );
        Ok(())
    }

    fn document_count(&self, tenant: TenantId) -> TenantryResult<u64> {
        let indexes = self.indexes.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(indexes
            .get(&tenant)
            .map_or(0, |i| {
                let pending_only = i.pending.keys().filter(|k| !i.visible.contains_key(*k)).count();
                (i.visible.len() + pending_only) as u64
            }))
    }
}
