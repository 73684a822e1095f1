//! Search index rebuilds, application listing and bookkeeping repair.

use std::collections::HashMap;

use tenantry_core::naming::management_root;
use tenantry_core::{
    ApplicationInfo, Edge, EdgeOrder, SearchByEdgeType, TenantId, TenantStatus, TenantryResult,
    MANAGEMENT_TENANT_ID,
};
use uuid::Uuid;

use crate::lifecycle::{infos_scope, ApplicationRegistry};
use crate::progress::ProgressObserver;

/// Outcome of a full rebuild sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildSummary {
    /// Tenants whose index was rebuilt, management tenant first.
    pub rebuilt: Vec<TenantId>,
    /// Tenants skipped after a failure.
    pub failed: Vec<TenantId>,
}

/// Edge changes made by [`ApplicationRegistry::reconcile_bookkeeping`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub records_checked: u64,
    pub edges_added: u64,
    pub edges_removed: u64,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.edges_added == 0 && self.edges_removed == 0
    }
}

impl ApplicationRegistry {
    /// Rebuild the management index, then every active tenant's.
    ///
    /// Tenants are enumerated straight from the graph, newest first. A
    /// failing tenant is logged and skipped.
    pub fn rebuild_all(&self, progress: &dyn ProgressObserver) -> TenantryResult<RebuildSummary> {
        let mut summary = RebuildSummary::default();
        self.rebuild_internal(progress)?;
        summary.rebuilt.push(MANAGEMENT_TENANT_ID);

        let search = SearchByEdgeType::all(
            management_root(),
            TenantStatus::Active.edge_type(),
            EdgeOrder::Descending,
        );
        let edges = self
            .stores
            .graph
            .load_edges_from_source(MANAGEMENT_TENANT_ID, &search)?;

        for edge in edges {
            let tenant_id = match edge {
                Ok(edge) => TenantId::from_uuid(edge.target.id),
                Err(err) => {
                    tracing::error!(error = %err, "Failed to read application edge, skipping");
                    continue;
                }
            };
            if tenant_id == MANAGEMENT_TENANT_ID {
                continue;
            }

            match self.rebuild_tenant(tenant_id, progress) {
                Ok(count) => {
                    tracing::info!(tenant_id = %tenant_id, count, "Rebuilt application index");
                    summary.rebuilt.push(tenant_id);
                }
                Err(err) => {
                    tracing::error!(
                        tenant_id = %tenant_id,
                        error = %err,
                        "Failed to rebuild application index, continuing"
                    );
                    summary.failed.push(tenant_id);
                }
            }
        }

        tracing::info!(
            rebuilt = summary.rebuilt.len(),
            failed = summary.failed.len(),
            "Finished rebuilding all indexes"
        );
        Ok(summary)
    }

    /// Rebuild the management tenant's index.
    pub fn rebuild_internal(&self, progress: &dyn ProgressObserver) -> TenantryResult<u64> {
        self.rebuild_tenant(MANAGEMENT_TENANT_ID, progress)
    }

    /// Recreate a tenant's index if missing and re-index all its data.
    /// Returns the number of entities indexed.
    pub fn rebuild_tenant(
        &self,
        tenant_id: TenantId,
        progress: &dyn ProgressObserver,
    ) -> TenantryResult<u64> {
        let manager = self.get_entity_manager(tenant_id)?;
        if tenant_id == MANAGEMENT_TENANT_ID {
            self.ensure_management_index()?;
        }
        // The index may have been dropped since it was first created.
        manager.create_index()?;
        manager.reindex(progress)
    }

    /// Re-index one collection of a tenant, optionally newest first.
    pub fn rebuild_collection(
        &self,
        tenant_id: TenantId,
        collection: &str,
        reverse: bool,
        progress: &dyn ProgressObserver,
    ) -> TenantryResult<u64> {
        let manager = self.get_entity_manager(tenant_id)?;
        manager.create_index()?;
        let count = manager.reindex_collection(progress, collection, reverse)?;

        let application = manager
            .application_name()?
            .unwrap_or_else(|| tenant_id.to_string());
        tracing::info!(
            tenant_id = %tenant_id,
            application = %application,
            collection,
            count,
            "Rebuilt collection index"
        );
        Ok(count)
    }

    /// Name to id of active tenants, or of deleted tenants when
    /// `include_deleted` is set.
    ///
    /// Edges whose record is missing or disagrees with the edge type are
    /// skipped with a warning. Only failing to open the traversal is an error.
    pub fn list_applications(
        &self,
        include_deleted: bool,
    ) -> TenantryResult<HashMap<String, TenantId>> {
        let status = if include_deleted {
            TenantStatus::Deleted
        } else {
            TenantStatus::Active
        };
        let edge_type = status.edge_type();
        tracing::debug!(edge_type = %edge_type, "Loading application edges");

        let search = SearchByEdgeType::all(management_root(), edge_type, EdgeOrder::Descending);
        let edges = self
            .stores
            .graph
            .load_edges_from_source(MANAGEMENT_TENANT_ID, &search)?;

        let mut applications = HashMap::new();
        for edge in edges {
            let edge = match edge {
                Ok(edge) => edge,
                Err(err) => {
                    tracing::warn!(error = %err, "Failed to read application edge, skipping");
                    continue;
                }
            };
            let tenant_id = TenantId::from_uuid(edge.target.id);
            match self.load_record(tenant_id) {
                Ok(Some((info, _))) if info.status == status => {
                    applications.insert(info.name.into_string(), tenant_id);
                }
                Ok(Some((info, _))) => tracing::warn!(
                    tenant_id = %tenant_id,
                    status = %info.status,
                    edge_type = %edge.edge_type,
                    "Application record status disagrees with its edge, skipping"
                ),
                Ok(None) => tracing::warn!(
                    tenant_id = %tenant_id,
                    edge_type = %edge.edge_type,
                    "Application edge points at a missing record, skipping"
                ),
                Err(err) => tracing::warn!(
                    tenant_id = %tenant_id,
                    error = %err,
                    "Failed to load application record, skipping"
                ),
            }
        }
        Ok(applications)
    }

    /// Make the listing edges agree with every record's status.
    ///
    /// Repairs what an interrupted delete or restore left behind. Running it
    /// on a consistent registry changes nothing.
    pub fn reconcile_bookkeeping(&self) -> TenantryResult<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let root = management_root();

        let mut linked: HashMap<TenantStatus, Vec<Uuid>> = HashMap::new();
        for status in [TenantStatus::Active, TenantStatus::Deleted] {
            let search = SearchByEdgeType::all(root.clone(), status.edge_type(), EdgeOrder::Ascending);
            let targets = self
                .stores
                .graph
                .load_edges_from_source(MANAGEMENT_TENANT_ID, &search)?
                .map(|edge| edge.map(|e| e.target.id))
                .collect::<TenantryResult<Vec<_>>>()?;
            linked.insert(status, targets);
        }
        let is_linked = |status: TenantStatus, id: Uuid| {
            linked.get(&status).is_some_and(|ids| ids.contains(&id))
        };

        let records = self
            .stores
            .entities
            .scan(&infos_scope(), false)?
            .collect::<TenantryResult<Vec<_>>>()?;

        for entity in records {
            report.records_checked += 1;
            let info = match ApplicationInfo::from_entity(&entity) {
                Ok(info) => info,
                Err(err) => {
                    tracing::warn!(id = %entity.id, error = %err, "Skipping malformed application record");
                    continue;
                }
            };
            let node = entity.node_id();
            let (want, stale) = (info.status, info.status.opposite());

            let mut repaired = false;

            if !is_linked(want, entity.id) {
                self.stores.graph.write_edge(
                    MANAGEMENT_TENANT_ID,
                    &Edge::new(root.clone(), want.edge_type(), node.clone()),
                )?;
                report.edges_added += 1;
                repaired = true;
            }
            if is_linked(stale, entity.id) {
                self.stores.graph.delete_edge(
                    MANAGEMENT_TENANT_ID,
                    &Edge::new(root.clone(), stale.edge_type(), node),
                )?;
                report.edges_removed += 1;
                repaired = true;
            }
            if repaired {
                tracing::warn!(
                    tenant_id = %info.tenant_id,
                    status = %info.status,
                    "Repaired application edges"
                );
            }
        }

        tracing::info!(
            records = report.records_checked,
            added = report.edges_added,
            removed = report.edges_removed,
            "Reconciled application bookkeeping"
        );
        Ok(report)
    }
}
