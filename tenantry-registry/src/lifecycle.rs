//! Application lifecycle: create, initialize, delete, restore and lookup.
//!
//! None of the stores share a transaction, so each protocol is an ordered
//! sequence of independent writes. A failure part way through is returned
//! to the caller without rollback; the bookkeeping record's status is the
//! source of truth and [`ApplicationRegistry::reconcile_bookkeeping`]
//! realigns the listing edges with it.

use std::sync::Arc;

use tenantry_core::naming::{management_root, APPLICATION_INFOS};
use tenantry_core::{
    ApplicationInfo, CollectionScope, Edge, Entity, HealthCheck, Properties, RegistryConfig,
    RegistryError, StorageError, TenantId, TenantName, TenantStatus, TenantryError,
    TenantryResult, MANAGEMENT_TENANT_ID,
};

use crate::handle_cache::TenantHandleCache;
use crate::index_guard::IndexInitGuard;
use crate::manager::TenantManager;
use crate::name_cache::{ApplicationInfoFetcher, NameIdCache};
use crate::name_lock::NameLocks;
use crate::progress::ProgressObserver;
use crate::stores::Stores;

/// Entry point for tenant bookkeeping and per-tenant handles.
pub struct ApplicationRegistry {
    pub(crate) config: RegistryConfig,
    pub(crate) stores: Stores,
    pub(crate) names: NameIdCache,
    pub(crate) handles: TenantHandleCache<TenantManager>,
    pub(crate) management_index: IndexInitGuard,
    pub(crate) name_locks: NameLocks,
}

/// Scope of the bookkeeping records.
pub(crate) fn infos_scope() -> CollectionScope {
    CollectionScope::new(MANAGEMENT_TENANT_ID, APPLICATION_INFOS)
}

impl ApplicationRegistry {
    /// Build a registry over the given stores. Nothing is written until
    /// [`setup`](Self::setup).
    pub fn new(config: RegistryConfig, stores: Stores) -> TenantryResult<Self> {
        config.validate()?;

        let fetcher = Arc::new(ApplicationInfoFetcher::new(Arc::clone(&stores.entities)));
        let names = NameIdCache::new(config.name_cache_capacity, fetcher);

        let handle_stores = stores.clone();
        let reindex_log_every = config.reindex_log_every;
        let handles = TenantHandleCache::new(config.handle_cache_capacity, move |tenant| {
            Ok(TenantManager::new(tenant, handle_stores.clone(), reindex_log_every))
        });

        Ok(Self {
            config,
            stores,
            names,
            handles,
            management_index: IndexInitGuard::new(),
            name_locks: NameLocks::new(),
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn management_tenant_id(&self) -> TenantId {
        MANAGEMENT_TENANT_ID
    }

    pub fn name_cache(&self) -> &NameIdCache {
        &self.names
    }

    pub fn handle_cache(&self) -> &TenantHandleCache<TenantManager> {
        &self.handles
    }

    // ========================================================================
    // SETUP
    // ========================================================================

    /// One-time system setup: provisioning, then the management tenant's
    /// root entity and index. Any failure is fatal to the caller.
    pub fn setup(&self) -> TenantryResult<()> {
        self.bootstrap().map_err(|err| {
            tracing::error!(error = %err, "Management tenant bootstrap failed");
            StorageError::TransactionFailed {
                reason: format!("management tenant bootstrap failed: {err}"),
            }
            .into()
        })
    }

    fn bootstrap(&self) -> TenantryResult<()> {
        self.stores.provisioner.init()?;

        let manager = self.get_entity_manager(MANAGEMENT_TENANT_ID)?;
        self.ensure_management_index()?;

        if manager.application()?.is_none() {
            let name = TenantName::from_qualified(&self.config.management_app_name);
            self.stores
                .provisioner
                .setup_tenant_keyspace(MANAGEMENT_TENANT_ID, &name)?;
            manager.create_application(&name, Properties::new())?;
            tracing::info!(
                tenant_id = %MANAGEMENT_TENANT_ID,
                name = %name,
                "Created management application"
            );
        }

        manager.refresh_index()
    }

    /// Create the management index once per registry, retrying after failure.
    pub(crate) fn ensure_management_index(&self) -> TenantryResult<()> {
        self.management_index.ensure_initialized(|| {
            tracing::debug!("Initializing management index");
            self.stores.index.initialize_index(MANAGEMENT_TENANT_ID)
        })
    }

    /// Make sure the management index exists, then refresh it.
    pub fn refresh_index(&self) -> TenantryResult<()> {
        self.ensure_management_index()?;
        self.stores.index.refresh(MANAGEMENT_TENANT_ID)
    }

    // ========================================================================
    // CREATE / INITIALIZE
    // ========================================================================

    /// Create a tenant under a fresh time-ordered id.
    pub fn create_tenant(
        &self,
        organization: &str,
        name: &str,
        properties: Option<Properties>,
    ) -> TenantryResult<TenantId> {
        let name = TenantName::canonical(organization, name);
        self.name_locks.with_name_lock(name.as_str(), || {
            self.initialize_locked(TenantId::now_v7(), name.clone(), properties.unwrap_or_default())
        })
    }

    /// Create a tenant under a caller-chosen id.
    pub fn initialize_tenant(
        &self,
        organization: &str,
        tenant_id: TenantId,
        name: &str,
        properties: Properties,
    ) -> TenantryResult<TenantId> {
        let name = TenantName::canonical(organization, name);
        self.name_locks.with_name_lock(name.as_str(), || {
            self.initialize_locked(tenant_id, name.clone(), properties)
        })
    }

    /// Caller holds the name lock.
    fn initialize_locked(
        &self,
        tenant_id: TenantId,
        name: TenantName,
        properties: Properties,
    ) -> TenantryResult<TenantId> {
        if self.names.resolve(name.as_str())?.is_some() {
            return Err(RegistryError::AlreadyExists {
                name: name.into_string(),
            }
            .into());
        }
        if self.load_record(tenant_id)?.is_some() {
            return Err(RegistryError::Conflict {
                tenant_id,
                reason: "tenant id is already registered".to_string(),
            }
            .into());
        }

        tracing::info!(tenant_id = %tenant_id, name = %name, "Initializing application");

        self.stores.provisioner.setup_tenant_keyspace(tenant_id, &name)?;

        let manager = self.get_entity_manager(tenant_id)?;
        manager.create_index()?;
        manager.create_application(&name, properties)?;
        manager.reset_roles()?;
        manager.refresh_index()?;

        let info = ApplicationInfo::active(tenant_id, name.clone());
        let stored = self
            .stores
            .entities
            .insert(&infos_scope(), &info.to_entity())
            .map_err(|err| already_exists_on_clash(err, &name))?;
        self.names.evict(name.as_str());

        self.ensure_management_index()?;
        self.stores.index.index_entity(&infos_scope(), &stored)?;
        self.stores.graph.write_edge(
            MANAGEMENT_TENANT_ID,
            &Edge::new(management_root(), TenantStatus::Active.edge_type(), stored.node_id()),
        )?;
        self.refresh_index()?;

        tracing::info!(tenant_id = %tenant_id, name = %name, "Application initialized");
        Ok(tenant_id)
    }

    /// Importing tenant data is not supported.
    pub fn import_tenant(&self, tenant_id: TenantId) -> TenantryResult<()> {
        tracing::warn!(tenant_id = %tenant_id, "Rejected application import");
        Err(RegistryError::Unsupported {
            operation: "import_tenant".to_string(),
        }
        .into())
    }

    // ========================================================================
    // DELETE / RESTORE
    // ========================================================================

    /// Soft-delete a tenant. Its data stays; its search index is dropped and
    /// its name becomes available.
    pub fn delete_tenant(&self, tenant_id: TenantId) -> TenantryResult<()> {
        let (info, record) = match self.load_record(tenant_id)? {
            Some((info, record)) if info.status == TenantStatus::Active => (info, record),
            _ => {
                return Err(RegistryError::NotFound {
                    tenant_id,
                    record: "application_info".to_string(),
                }
                .into())
            }
        };

        let stored = self.transition(&info, &record, TenantStatus::Deleted)?;
        self.refresh_index()?;
        self.stores.index.delete_index(tenant_id)?;

        tracing::info!(tenant_id = %tenant_id, name = %info.name, version = stored.version, "Application deleted");
        Ok(())
    }

    /// Bring a deleted tenant back under its original id and rebuild its
    /// search index, reporting each re-indexed entity to `progress`.
    pub fn restore_tenant(
        &self,
        tenant_id: TenantId,
        progress: &dyn ProgressObserver,
    ) -> TenantryResult<()> {
        let (info, record) = match self.load_record(tenant_id)? {
            Some((info, record)) if info.status == TenantStatus::Deleted => (info, record),
            _ => {
                return Err(RegistryError::NotFound {
                    tenant_id,
                    record: "deleted_application_info".to_string(),
                }
                .into())
            }
        };

        self.name_locks.with_name_lock(info.name.as_str(), || -> TenantryResult<()> {
            if let Some(owner) = self.names.resolve(info.name.as_str())? {
                if owner != tenant_id {
                    return Err(TenantryError::from(RegistryError::AlreadyExists {
                        name: info.name.to_string(),
                    }));
                }
            }
            self.transition(&info, &record, TenantStatus::Active)?;
            self.refresh_index()
        })?;

        tracing::info!(tenant_id = %tenant_id, name = %info.name, "Application restored, rebuilding index");
        self.rebuild_tenant(tenant_id, progress)?;
        Ok(())
    }

    /// Flip a record's status with a versioned update, then move its listing
    /// edge to match. The name is evicted as soon as the record changes, so
    /// a later failure cannot leave a stale mapping behind.
    fn transition(
        &self,
        info: &ApplicationInfo,
        record: &Entity,
        to: TenantStatus,
    ) -> TenantryResult<Entity> {
        let mut next = info.clone();
        next.status = to;
        let mut entity = record.clone();
        next.apply_to(&mut entity);

        let stored = self
            .stores
            .entities
            .update(&infos_scope(), &entity)
            .map_err(|err| match err {
                TenantryError::Storage(StorageError::VersionConflict { .. }) => {
                    TenantryError::from(RegistryError::Conflict {
                        tenant_id: info.tenant_id,
                        reason: format!("record changed concurrently while moving to {to}"),
                    })
                }
                other => already_exists_on_clash(other, &info.name),
            })?;
        self.names.evict(info.name.as_str());

        self.ensure_management_index()?;
        self.stores.index.index_entity(&infos_scope(), &stored)?;

        let node = stored.node_id();
        self.stores.graph.write_edge(
            MANAGEMENT_TENANT_ID,
            &Edge::new(management_root(), to.edge_type(), node.clone()),
        )?;
        self.stores.graph.delete_edge(
            MANAGEMENT_TENANT_ID,
            &Edge::new(management_root(), to.opposite().edge_type(), node),
        )?;
        Ok(stored)
    }

    // ========================================================================
    // LOOKUP
    // ========================================================================

    /// Resolve a qualified name to an active tenant. Store failures are
    /// logged and reported as no match.
    pub fn lookup_tenant(&self, name: &str) -> Option<TenantId> {
        let name = TenantName::from_qualified(name);
        match self.names.resolve(name.as_str()) {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(name = %name, error = %err, "Application lookup failed");
                None
            }
        }
    }

    /// Bookkeeping record of a tenant, in either status.
    pub fn application_info(&self, tenant_id: TenantId) -> TenantryResult<Option<ApplicationInfo>> {
        Ok(self.load_record(tenant_id)?.map(|(info, _)| info))
    }

    pub(crate) fn load_record(
        &self,
        tenant_id: TenantId,
    ) -> TenantryResult<Option<(ApplicationInfo, Entity)>> {
        let Some(entity) = self
            .stores
            .entities
            .load(&infos_scope(), tenant_id.as_uuid())?
        else {
            return Ok(None);
        };
        let info = ApplicationInfo::from_entity(&entity)?;
        Ok(Some((info, entity)))
    }

    /// Handle for a tenant, built on first use.
    pub fn get_entity_manager(&self, tenant_id: TenantId) -> TenantryResult<Arc<TenantManager>> {
        self.handles.get(tenant_id)
    }

    // ========================================================================
    // MAINTENANCE
    // ========================================================================

    pub fn entity_store_health(&self) -> TenantryResult<HealthCheck> {
        self.stores.entities.health()
    }

    /// Forget every cached name and handle. Later reads go to the stores.
    pub fn invalidate_all_caches(&self) {
        self.names.evict_all();
        for handle in self.handles.handles() {
            handle.flush_caches();
        }
        self.handles.invalidate_all();
        tracing::info!("Invalidated registry caches");
    }

    /// Add a physical index behind a tenant's search alias.
    pub fn add_index(
        &self,
        tenant_id: TenantId,
        suffix: &str,
        shards: u32,
        replicas: u32,
        write_consistency: &str,
    ) -> TenantryResult<()> {
        self.stores
            .index
            .add_index(tenant_id, suffix, shards, replicas, write_consistency)
    }

    /// Entities stored across every tenant.
    pub fn entity_count(&self) -> TenantryResult<u64> {
        self.stores.entities.count()
    }
}

/// Translate a unique-property clash into the registry's identity error.
fn already_exists_on_clash(err: TenantryError, name: &TenantName) -> TenantryError {
    match err {
        TenantryError::Storage(StorageError::DuplicateUniqueProperty { .. }) => {
            RegistryError::AlreadyExists {
                name: name.to_string(),
            }
            .into()
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clash_maps_to_already_exists() {
        let name = TenantName::canonical("org", "app");
        let clash = TenantryError::from(StorageError::DuplicateUniqueProperty {
            collection: APPLICATION_INFOS.to_string(),
            property: "active_name".to_string(),
            value: "org/app".to_string(),
        });
        assert!(already_exists_on_clash(clash, &name).is_already_exists());

        let other = TenantryError::from(StorageError::LockPoisoned);
        assert_eq!(already_exists_on_clash(other.clone(), &name), other);
    }
}
