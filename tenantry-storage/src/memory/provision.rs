//! In-memory keyspace provisioner.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tenantry_core::{StorageError, TenantId, TenantName, TenantryResult};

use super::faults::{FaultInjector, FaultPoint};
use crate::traits::Provisioner;

/// Records which tenants have been provisioned.
#[derive(Debug, Default)]
pub struct InMemoryProvisioner {
    initialized: AtomicBool,
    keyspaces: RwLock<HashMap<TenantId, TenantName>>,
    faults: Arc<FaultInjector>,
}

impl InMemoryProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: Arc<FaultInjector>) -> Self {
        Self {
            faults,
            ..Self::default()
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Name a tenant's keyspace was provisioned under.
    pub fn keyspace(&self, tenant: TenantId) -> Option<TenantName> {
        self.keyspaces
            .read()
            .ok()
            .and_then(|keyspaces| keyspaces.get(&tenant).cloned())
    }
}

impl Provisioner for InMemoryProvisioner {
    fn init(&self) -> TenantryResult<()> {
        self.faults.check(FaultPoint::Provision, None)?;
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn setup_tenant_keyspace(&self, tenant: TenantId, name: &TenantName) -> TenantryResult<()> {
        self.faults.check(FaultPoint::Provision, Some(tenant))?;
        let mut keyspaces = self.keyspaces.write().map_err(|_| StorageError::LockPoisoned)?;
        keyspaces.insert(tenant, name.clone());
        Ok(())
    }
}
