//! The set of backing stores a registry is built over.

use std::sync::Arc;

use tenantry_storage::{EntityStore, GraphStore, Provisioner, SearchIndex};

/// Shared handles to the three stores and the provisioning hook.
#[derive(Clone)]
pub struct Stores {
    pub graph: Arc<dyn GraphStore>,
    pub entities: Arc<dyn EntityStore>,
    pub index: Arc<dyn SearchIndex>,
    pub provisioner: Arc<dyn Provisioner>,
}

impl Stores {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        entities: Arc<dyn EntityStore>,
        index: Arc<dyn SearchIndex>,
        provisioner: Arc<dyn Provisioner>,
    ) -> Self {
        Self {
            graph,
            entities,
            index,
            provisioner,
        }
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}
