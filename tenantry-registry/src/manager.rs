//! Per-tenant operational handle.
//!
//! A [`TenantManager`] is bound to one tenant id and works on that tenant's
//! collections, graph and search index. Entities created through it are
//! linked from the tenant's application node by a `collection:<name>` edge.
//! Handles are cheap to build and are cached by the registry.

use std::sync::{PoisonError, RwLock};

use tenantry_core::naming::{
    application_node, collection_for_edge_type, collection_for_type, edge_type_for_collection,
    DEFAULT_ROLES, PROPERTY_NAME, ROLES, TYPE_APPLICATION, TYPE_ROLE,
};
use tenantry_core::{
    new_entity_id, CollectionScope, Edge, EdgeOrder, Entity, EntityRef, Properties,
    SearchByEdgeType, TenantId, TenantName, TenantryResult,
};

use crate::progress::ProgressObserver;
use crate::stores::Stores;

pub struct TenantManager {
    tenant_id: TenantId,
    stores: Stores,
    reindex_log_every: u64,
    /// Root entity, loaded on first use.
    application: RwLock<Option<Entity>>,
}

impl TenantManager {
    pub fn new(tenant_id: TenantId, stores: Stores, reindex_log_every: u64) -> Self {
        Self {
            tenant_id,
            stores,
            reindex_log_every: reindex_log_every.max(1),
            application: RwLock::new(None),
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn scope(&self, collection: &str) -> CollectionScope {
        CollectionScope::new(self.tenant_id, collection)
    }

    fn application_scope(&self) -> CollectionScope {
        self.scope(&collection_for_type(TYPE_APPLICATION))
    }

    // ========================================================================
    // APPLICATION ROOT
    // ========================================================================

    /// The tenant's root entity, cached after the first successful load.
    pub fn application(&self) -> TenantryResult<Option<Entity>> {
        if let Some(cached) = self
            .application
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(Some(cached.clone()));
        }

        let loaded = self
            .stores
            .entities
            .load(&self.application_scope(), self.tenant_id.as_uuid())?;
        if let Some(entity) = &loaded {
            *self
                .application
                .write()
                .unwrap_or_else(PoisonError::into_inner) = Some(entity.clone());
        }
        Ok(loaded)
    }

    /// Name stored on the root entity.
    pub fn application_name(&self) -> TenantryResult<Option<String>> {
        Ok(self
            .application()?
            .and_then(|app| app.str_property(PROPERTY_NAME).map(str::to_string)))
    }

    /// Write the root entity. The `name` property is always the canonical
    /// name, whatever the caller supplied. Requires the tenant index.
    pub fn create_application(
        &self,
        name: &TenantName,
        mut properties: Properties,
    ) -> TenantryResult<Entity> {
        properties.insert(PROPERTY_NAME.to_string(), name.as_str().into());
        let entity = Entity::new(self.tenant_id.as_uuid(), TYPE_APPLICATION, properties);

        let scope = self.application_scope();
        let stored = self.stores.entities.insert(&scope, &entity)?;
        self.stores.index.index_entity(&scope, &stored)?;

        *self
            .application
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(stored.clone());
        Ok(stored)
    }

    /// Drop cached state so the next read goes to the store.
    pub fn flush_caches(&self) {
        *self
            .application
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    // ========================================================================
    // ENTITIES
    // ========================================================================

    /// Create an entity in the collection named after its type.
    pub fn create(&self, entity_type: &str, properties: Properties) -> TenantryResult<Entity> {
        let collection = collection_for_type(entity_type);
        let entity = Entity::new(new_entity_id(), entity_type, properties);

        let scope = self.scope(&collection);
        let stored = self.stores.entities.insert(&scope, &entity)?;
        self.stores.index.index_entity(&scope, &stored)?;
        self.stores.graph.write_edge(
            self.tenant_id,
            &Edge::new(
                application_node(self.tenant_id),
                edge_type_for_collection(&collection),
                stored.node_id(),
            ),
        )?;

        tracing::debug!(
            tenant_id = %self.tenant_id,
            entity = %stored.entity_ref(),
            "Created entity"
        );
        Ok(stored)
    }

    pub fn get(&self, entity: &EntityRef) -> TenantryResult<Option<Entity>> {
        self.stores
            .entities
            .load(&self.scope(&collection_for_type(&entity.entity_type)), entity.id)
    }

    /// Conditionally update an entity and re-index it.
    pub fn update(&self, entity: &Entity) -> TenantryResult<Entity> {
        let scope = self.scope(&collection_for_type(&entity.entity_type));
        let stored = self.stores.entities.update(&scope, entity)?;
        self.stores.index.index_entity(&scope, &stored)?;

        if stored.entity_type == TYPE_APPLICATION && stored.id == self.tenant_id.as_uuid() {
            *self
                .application
                .write()
                .unwrap_or_else(PoisonError::into_inner) = Some(stored.clone());
        }
        Ok(stored)
    }

    /// Delete an entity with its index document and every edge touching it.
    pub fn delete(&self, entity: &EntityRef) -> TenantryResult<bool> {
        let scope = self.scope(&collection_for_type(&entity.entity_type));
        let existed = self.stores.entities.delete(&scope, entity.id)?;
        self.stores.index.remove_entity(&scope, entity.id)?;
        self.stores.graph.delete_node(self.tenant_id, &entity.into())?;
        Ok(existed)
    }

    // ========================================================================
    // CONNECTIONS
    // ========================================================================

    pub fn connect(
        &self,
        source: &EntityRef,
        connection_type: &str,
        target: &EntityRef,
    ) -> TenantryResult<()> {
        self.stores.graph.write_edge(
            self.tenant_id,
            &Edge::new(source.into(), connection_type, target.into()),
        )
    }

    pub fn disconnect(
        &self,
        source: &EntityRef,
        connection_type: &str,
        target: &EntityRef,
    ) -> TenantryResult<bool> {
        self.stores.graph.delete_edge(
            self.tenant_id,
            &Edge::new(source.into(), connection_type, target.into()),
        )
    }

    /// Connection types leaving an entity, collection membership excluded.
    pub fn connection_types(&self, source: &EntityRef) -> TenantryResult<Vec<String>> {
        let types = self
            .stores
            .graph
            .edge_types_from_source(self.tenant_id, &source.into())?;
        Ok(types
            .into_iter()
            .filter(|t| collection_for_edge_type(t).is_none())
            .collect())
    }

    /// Targets of one connection type, oldest first.
    pub fn connected_entities(
        &self,
        source: &EntityRef,
        connection_type: &str,
    ) -> TenantryResult<Vec<EntityRef>> {
        let search = SearchByEdgeType::all(source.into(), connection_type, EdgeOrder::Ascending);
        self.stores
            .graph
            .load_edges_from_source(self.tenant_id, &search)?
            .map(|edge| edge.map(|e| EntityRef::new(e.target.node_type, e.target.id)))
            .collect()
    }

    // ========================================================================
    // SEARCH INDEX
    // ========================================================================

    /// Create the tenant's index. Safe to repeat.
    pub fn create_index(&self) -> TenantryResult<()> {
        self.stores.index.initialize_index(self.tenant_id)
    }

    pub fn refresh_index(&self) -> TenantryResult<()> {
        self.stores.index.refresh(self.tenant_id)
    }

    /// Make sure the default roles exist.
    pub fn reset_roles(&self) -> TenantryResult<()> {
        let scope = self.scope(ROLES);
        for role in DEFAULT_ROLES {
            if self
                .stores
                .entities
                .find_by_unique(&scope, PROPERTY_NAME, role)?
                .is_some()
            {
                continue;
            }
            let mut properties = Properties::new();
            properties.insert(PROPERTY_NAME.to_string(), role.into());
            self.create(TYPE_ROLE, properties)?;
        }
        Ok(())
    }

    /// Re-index every collection of the tenant, then refresh.
    pub fn reindex(&self, progress: &dyn ProgressObserver) -> TenantryResult<u64> {
        let mut total = 0;
        for collection in self.stores.entities.collections(self.tenant_id)? {
            total += self.index_collection(progress, &collection, false)?;
        }
        self.refresh_index()?;
        Ok(total)
    }

    /// Re-index one collection, optionally newest first, then refresh.
    pub fn reindex_collection(
        &self,
        progress: &dyn ProgressObserver,
        collection: &str,
        reverse: bool,
    ) -> TenantryResult<u64> {
        let count = self.index_collection(progress, collection, reverse)?;
        self.refresh_index()?;
        Ok(count)
    }

    fn index_collection(
        &self,
        progress: &dyn ProgressObserver,
        collection: &str,
        reverse: bool,
    ) -> TenantryResult<u64> {
        let scope = self.scope(collection);
        let mut count = 0u64;
        for entity in self.stores.entities.scan(&scope, reverse)? {
            let entity = entity?;
            self.stores.index.index_entity(&scope, &entity)?;
            progress.on_progress(&entity.entity_ref());
            count += 1;
            if count % self.reindex_log_every == 0 {
                tracing::info!(
                    tenant_id = %self.tenant_id,
                    collection,
                    count,
                    "Reindex progress"
                );
            }
        }
        tracing::debug!(tenant_id = %self.tenant_id, collection, count, "Reindexed collection");
        Ok(count)
    }
}

impl std::fmt::Debug for TenantManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantManager")
            .field("tenant_id", &self.tenant_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressCounter;
    use std::sync::Arc;
    use tenantry_core::naming::index_name;
    use tenantry_storage::{
        EntityStore, InMemoryEntityStore, InMemoryGraphStore, InMemoryProvisioner,
        InMemorySearchIndex, SearchIndex,
    };

    struct Fixture {
        manager: TenantManager,
        entities: Arc<InMemoryEntityStore>,
        index: Arc<InMemorySearchIndex>,
    }

    fn fixture() -> Fixture {
        let entities = Arc::new(InMemoryEntityStore::new());
        let index = Arc::new(InMemorySearchIndex::new());
        let stores = Stores::new(
            Arc::new(InMemoryGraphStore::new()),
            entities.clone(),
            index.clone(),
            Arc::new(InMemoryProvisioner::new()),
        );
        let manager = TenantManager::new(TenantId::now_v7(), stores, 2);
        manager.create_index().unwrap();
        Fixture {
            manager,
            entities,
            index,
        }
    }

    fn props(name: &str) -> Properties {
        let mut props = Properties::new();
        props.insert(PROPERTY_NAME.to_string(), name.into());
        props
    }

    #[test]
    fn test_create_application_forces_canonical_name() {
        let fx = fixture();
        let name = TenantName::canonical("Org", "App");
        let root = fx.manager.create_application(&name, props("something else")).unwrap();

        assert_eq!(root.str_property(PROPERTY_NAME), Some("org/app"));
        assert_eq!(fx.manager.application_name().unwrap().as_deref(), Some("org/app"));
    }

    #[test]
    fn test_application_is_cached_until_flushed() {
        let fx = fixture();
        let name = TenantName::canonical("org", "app");
        let root = fx.manager.create_application(&name, Properties::new()).unwrap();

        let mut changed = root.clone();
        changed.set_property("title", "direct write");
        fx.entities
            .update(&fx.manager.application_scope(), &changed)
            .unwrap();

        assert!(fx.manager.application().unwrap().unwrap().property("title").is_none());
        fx.manager.flush_caches();
        assert!(fx.manager.application().unwrap().unwrap().property("title").is_some());
    }

    #[test]
    fn test_crud_and_connections() {
        let fx = fixture();
        let alice = fx.manager.create("user", props("alice")).unwrap();
        let ops = fx.manager.create("group", props("ops")).unwrap();

        fx.manager
            .connect(&alice.entity_ref(), "member_of", &ops.entity_ref())
            .unwrap();
        assert_eq!(
            fx.manager.connection_types(&alice.entity_ref()).unwrap(),
            vec!["member_of".to_string()]
        );
        assert_eq!(
            fx.manager
                .connected_entities(&alice.entity_ref(), "member_of")
                .unwrap(),
            vec![ops.entity_ref()]
        );

        let mut renamed = fx.manager.get(&alice.entity_ref()).unwrap().unwrap();
        renamed.set_property("email", "alice@example.com");
        assert_eq!(fx.manager.update(&renamed).unwrap().version, 2);

        assert!(fx.manager.delete(&ops.entity_ref()).unwrap());
        assert!(fx
            .manager
            .connected_entities(&alice.entity_ref(), "member_of")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_reset_roles_is_idempotent() {
        let fx = fixture();
        fx.manager.reset_roles().unwrap();
        fx.manager.reset_roles().unwrap();

        let roles = fx
            .entities
            .scan(&fx.manager.scope(ROLES), false)
            .unwrap()
            .count();
        assert_eq!(roles, DEFAULT_ROLES.len());
    }

    #[test]
    fn test_reindex_reports_every_entity() {
        let fx = fixture();
        fx.manager.create("user", props("a")).unwrap();
        fx.manager.create("user", props("b")).unwrap();
        fx.manager.create("group", props("g")).unwrap();

        fx.index.delete_index(fx.manager.tenant_id()).unwrap();
        fx.manager.create_index().unwrap();

        let counter = ProgressCounter::new();
        assert_eq!(fx.manager.reindex(&counter).unwrap(), 3);
        assert_eq!(counter.count(), 3);
        assert_eq!(fx.index.visible_count(fx.manager.tenant_id()), 3);
    }

    #[test]
    fn test_reindex_collection_newest_first() {
        let fx = fixture();
        let first = fx.manager.create("user", props("a")).unwrap();
        let second = fx.manager.create("user", props("b")).unwrap();

        let seen = std::cell::RefCell::new(Vec::new());
        let observer = |entity: &EntityRef| seen.borrow_mut().push(entity.id);
        fx.manager.reindex_collection(&observer, "users", true).unwrap();

        assert_eq!(seen.into_inner(), vec![second.id, first.id]);
    }

    #[test]
    fn test_missing_index_fails_writes() {
        let fx = fixture();
        fx.index.delete_index(fx.manager.tenant_id()).unwrap();
        let err = fx.manager.create("user", props("a")).unwrap_err();
        assert!(err.to_string().contains(&index_name(fx.manager.tenant_id())));
    }
}
