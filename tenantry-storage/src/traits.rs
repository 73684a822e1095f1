//! Interfaces of the three backing stores and the provisioning hook.
//!
//! None of the stores share a transaction boundary. Every method is a single
//! independent operation; multi-step protocols are the registry's job.

use tenantry_core::{
    CollectionScope, Edge, Entity, EntityId, HealthCheck, NodeId, SearchByEdgeType, TenantId,
    TenantName, TenantryResult,
};

/// Pull-based stream of edges. The caller drains it to completion.
pub type EdgeStream<'a> = Box<dyn Iterator<Item = TenantryResult<Edge>> + Send + 'a>;

/// Pull-based stream of entities.
pub type EntityStream<'a> = Box<dyn Iterator<Item = TenantryResult<Entity>> + Send + 'a>;

/// Graph/edge store. Edges are scoped to the tenant that owns them.
pub trait GraphStore: Send + Sync {
    /// Write an edge. Writing an edge that already exists (same source,
    /// type and target) is a no-op.
    fn write_edge(&self, tenant: TenantId, edge: &Edge) -> TenantryResult<()>;

    /// Delete an edge matched by source, type and target.
    ///
    /// Returns whether an edge was removed.
    fn delete_edge(&self, tenant: TenantId, edge: &Edge) -> TenantryResult<bool>;

    /// Stream edges of one type leaving a node, in the requested order.
    fn load_edges_from_source(
        &self,
        tenant: TenantId,
        search: &SearchByEdgeType,
    ) -> TenantryResult<EdgeStream<'_>>;

    /// Distinct edge types leaving a node.
    fn edge_types_from_source(&self, tenant: TenantId, node: &NodeId)
        -> TenantryResult<Vec<String>>;

    /// Remove every edge touching a node. Returns the number removed.
    fn delete_node(&self, tenant: TenantId, node: &NodeId) -> TenantryResult<u64>;
}

/// Entity-collection store.
pub trait EntityStore: Send + Sync {
    /// Insert a new entity. Fails with `InsertFailed` if the id exists in
    /// the collection and with `DuplicateUniqueProperty` on a unique clash.
    /// Returns the stored entity (version 1).
    fn insert(&self, scope: &CollectionScope, entity: &Entity) -> TenantryResult<Entity>;

    /// Load an entity by id.
    fn load(&self, scope: &CollectionScope, id: EntityId) -> TenantryResult<Option<Entity>>;

    /// Conditionally replace an entity.
    ///
    /// Succeeds only if `entity.version` equals the stored version
    /// (`VersionConflict` otherwise). Returns the stored entity with the
    /// bumped version.
    fn update(&self, scope: &CollectionScope, entity: &Entity) -> TenantryResult<Entity>;

    /// Delete an entity. Returns whether it existed.
    fn delete(&self, scope: &CollectionScope, id: EntityId) -> TenantryResult<bool>;

    /// Find the entity holding `value` for a unique property.
    fn find_by_unique(
        &self,
        scope: &CollectionScope,
        property: &str,
        value: &str,
    ) -> TenantryResult<Option<Entity>>;

    /// Stream a collection in insertion order, or newest first.
    fn scan(&self, scope: &CollectionScope, reverse: bool) -> TenantryResult<EntityStream<'_>>;

    /// Names of the non-empty collections of a tenant.
    fn collections(&self, tenant: TenantId) -> TenantryResult<Vec<String>>;

    /// Total number of entities across every tenant.
    fn count(&self) -> TenantryResult<u64>;

    /// Health of the store.
    fn health(&self) -> TenantryResult<HealthCheck>;
}

/// Search index engine, one logical index per tenant.
pub trait SearchIndex: Send + Sync {
    /// Create the tenant's index. Idempotent.
    fn initialize_index(&self, tenant: TenantId) -> TenantryResult<()>;

    fn index_exists(&self, tenant: TenantId) -> TenantryResult<bool>;

    /// Make recent writes visible to searches. Fails if the index is missing.
    fn refresh(&self, tenant: TenantId) -> TenantryResult<()>;

    /// Drop the tenant's index and every document in it. Irreversible.
    fn delete_index(&self, tenant: TenantId) -> TenantryResult<()>;

    /// Index (or re-index) one entity. Fails if the index is missing.
    fn index_entity(&self, scope: &CollectionScope, entity: &Entity) -> TenantryResult<()>;

    /// Remove one entity's document.
    fn remove_entity(&self, scope: &CollectionScope, id: EntityId) -> TenantryResult<()>;

    /// Add an extra physical index behind the tenant's alias.
    fn add_index(
        &self,
        tenant: TenantId,
        suffix: &str,
        shards: u32,
        replicas: u32,
        write_consistency: &str,
    ) -> TenantryResult<()>;

    /// Number of indexed documents for a tenant.
    fn document_count(&self, tenant: TenantId) -> TenantryResult<u64>;
}

/// Keyspace/schema provisioning.
pub trait Provisioner: Send + Sync {
    /// One-time system setup (system keyspaces, schema).
    fn init(&self) -> TenantryResult<()>;

    /// Provision the storage scope of a new tenant.
    fn setup_tenant_keyspace(&self, tenant: TenantId, name: &TenantName) -> TenantryResult<()>;
}
