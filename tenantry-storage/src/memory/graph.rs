//! In-memory graph store.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use tenantry_core::{Edge, EdgeOrder, NodeId, SearchByEdgeType, StorageError, TenantId, TenantryResult};

use super::faults::{FaultInjector, FaultPoint};
use crate::traits::{EdgeStream, GraphStore};

/// Edges are keyed by tenant; lookups filter the tenant's list.
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    edges: RwLock<HashMap<TenantId, Vec<Edge>>>,
    faults: Arc<FaultInjector>,
}

fn same_edge(a: &Edge, b: &Edge) -> bool {
    a.source == b.source && a.edge_type == b.edge_type && a.target == b.target
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share a fault injector with other stores.
    pub fn with_faults(faults: Arc<FaultInjector>) -> Self {
        Self {
            edges: RwLock::default(),
            faults,
        }
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    /// Number of edges stored for a tenant.
    pub fn edge_count(&self, tenant: TenantId) -> usize {
        self.edges
            .read()
            .map(|edges| edges.get(&tenant).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

impl GraphStore for InMemoryGraphStore {
    fn write_edge(&self, tenant: TenantId, edge: &Edge) -> TenantryResult<()> {
        self.faults.check(FaultPoint::GraphWrite, Some(tenant))?;
        let mut edges = self.edges.write().map_err(|_| StorageError::LockPoisoned)?;
        let tenant_edges = edges.entry(tenant).or_default();
        if !tenant_edges.iter().any(|e| same_edge(e, edge)) {
            tenant_edges.push(edge.clone());
        }
        Ok(())
    }

    fn delete_edge(&self, tenant: TenantId, edge: &Edge) -> TenantryResult<bool> {
        self.faults.check(FaultPoint::GraphDelete, Some(tenant))?;
        let mut edges = self.edges.write().map_err(|_| StorageError::LockPoisoned)?;
        let Some(tenant_edges) = edges.get_mut(&tenant) else {
            return Ok(false);
        };
        let before = tenant_edges.len();
        tenant_edges.retain(|e| !same_edge(e, edge));
        Ok(tenant_edges.len() != before)
    }

    fn load_edges_from_source(
        &self,
        tenant: TenantId,
        search: &SearchByEdgeType,
    ) -> TenantryResult<EdgeStream<'_>> {
        self.faults.check(FaultPoint::GraphLoad, Some(tenant))?;
        let edges = self.edges.read().map_err(|_| StorageError::LockPoisoned)?;

        let mut matching: Vec<Edge> = edges
            .get(&tenant)
            .map(|tenant_edges| {
                tenant_edges
                    .iter()
                    .filter(|e| {
                        e.source == search.node
                            && e.edge_type == search.edge_type
                            && e.timestamp <= search.max_timestamp
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        matching.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.target.cmp(&b.target))
        });
        if search.order == EdgeOrder::Descending {
            matching.reverse();
        }

        Ok(Box::new(matching.into_iter().map(Ok)))
    }

    fn edge_types_from_source(
        &self,
        tenant: TenantId,
        node: &NodeId,
    ) -> TenantryResult<Vec<String>> {
        self.faults.check(FaultPoint::GraphLoad, Some(tenant))?;
        let edges = self.edges.read().map_err(|_| StorageError::LockPoisoned)?;
        let types: BTreeSet<String> = edges
            .get(&tenant)
            .into_iter()
            .flatten()
            .filter(|e| &e.source == node)
            .map(|e| e.edge_type.clone())
            .collect();
        Ok(types.into_iter().collect())
    }

    fn delete_node(&self, tenant: TenantId, node: &NodeId) -> TenantryResult<u64> {
        self.faults.check(FaultPoint::GraphDelete, Some(tenant))?;
        let mut edges = self.edges.write().map_err(|_| StorageError::LockPoisoned)?;
        let Some(tenant_edges) = edges.get_mut(&tenant) else {
            return Ok(0);
        };
        let before = tenant_edges.len();
        tenant_edges.retain(|e| &e.source != node && &e.target != node);
        Ok((before - tenant_edges.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn node(kind: &str) -> NodeId {
        NodeId::new(Uuid::now_v7(), kind)
    }

    fn edge_at(source: &NodeId, edge_type: &str, target: &NodeId, timestamp: i64) -> Edge {
        Edge {
            source: source.clone(),
            edge_type: edge_type.to_string(),
            target: target.clone(),
            timestamp,
        }
    }

    fn drain(stream: EdgeStream<'_>) -> Vec<Edge> {
        stream.collect::<TenantryResult<Vec<_>>>().expect("drain")
    }

    #[test]
    fn test_write_is_idempotent() {
        let store = InMemoryGraphStore::new();
        let tenant = TenantId::now_v7();
        let (a, b) = (node("application"), node("user"));
        let edge = edge_at(&a, "collection:users", &b, 1);

        store.write_edge(tenant, &edge).unwrap();
        store.write_edge(tenant, &edge).unwrap();
        assert_eq!(store.edge_count(tenant), 1);
    }

    #[test]
    fn test_load_orders_and_filters() {
        let store = InMemoryGraphStore::new();
        let tenant = TenantId::now_v7();
        let root = node("application");
        let (x, y, z) = (node("user"), node("user"), node("group"));

        store.write_edge(tenant, &edge_at(&root, "collection:users", &x, 10)).unwrap();
        store.write_edge(tenant, &edge_at(&root, "collection:users", &y, 20)).unwrap();
        store.write_edge(tenant, &edge_at(&root, "collection:groups", &z, 30)).unwrap();

        let desc = drain(
            store
                .load_edges_from_source(
                    tenant,
                    &SearchByEdgeType::all(root.clone(), "collection:users", EdgeOrder::Descending),
                )
                .unwrap(),
        );
        assert_eq!(
            desc.iter().map(|e| e.target.clone()).collect::<Vec<_>>(),
            vec![y.clone(), x.clone()]
        );

        let mut bounded = SearchByEdgeType::all(root, "collection:users", EdgeOrder::Ascending);
        bounded.max_timestamp = 15;
        let asc = drain(store.load_edges_from_source(tenant, &bounded).unwrap());
        assert_eq!(asc.len(), 1);
        assert_eq!(asc[0].target, x);
    }

    #[test]
    fn test_tenants_are_isolated() {
        let store = InMemoryGraphStore::new();
        let (t1, t2) = (TenantId::now_v7(), TenantId::now_v7());
        let root = node("application");
        store.write_edge(t1, &edge_at(&root, "owns", &node("user"), 1)).unwrap();

        let search = SearchByEdgeType::all(root, "owns", EdgeOrder::Ascending);
        assert!(drain(store.load_edges_from_source(t2, &search).unwrap()).is_empty());
    }

    #[test]
    fn test_edge_types_and_delete_node() {
        let store = InMemoryGraphStore::new();
        let tenant = TenantId::now_v7();
        let root = node("application");
        let user = node("user");
        store.write_edge(tenant, &edge_at(&root, "likes", &user, 1)).unwrap();
        store.write_edge(tenant, &edge_at(&root, "follows", &user, 2)).unwrap();

        assert_eq!(
            store.edge_types_from_source(tenant, &root).unwrap(),
            vec!["follows".to_string(), "likes".to_string()]
        );
        assert_eq!(store.delete_node(tenant, &user).unwrap(), 2);
        assert!(store.edge_types_from_source(tenant, &root).unwrap().is_empty());
    }

    #[test]
    fn test_delete_edge_reports_presence() {
        let store = InMemoryGraphStore::new();
        let tenant = TenantId::now_v7();
        let edge = edge_at(&node("application"), "owns", &node("user"), 1);
        store.write_edge(tenant, &edge).unwrap();

        assert!(store.delete_edge(tenant, &edge).unwrap());
        assert!(!store.delete_edge(tenant, &edge).unwrap());
    }

    #[test]
    fn test_injected_fault_surfaces() {
        let store = InMemoryGraphStore::new();
        store.faults().arm(FaultPoint::GraphLoad, None, 1);
        let search = SearchByEdgeType::all(node("application"), "owns", EdgeOrder::Ascending);
        assert!(store.load_edges_from_source(TenantId::now_v7(), &search).is_err());
    }
}
