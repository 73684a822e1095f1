//! Fault injection for the in-memory stores.
//!
//! Tests arm a fault point (optionally for one tenant) for a number of
//! calls; the store consults the injector before doing any work.

use std::collections::HashMap;
use std::sync::Mutex;

use tenantry_core::{StorageError, TenantId, TenantryResult};

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    GraphWrite,
    GraphDelete,
    GraphLoad,
    EntityInsert,
    EntityLoad,
    EntityUpdate,
    EntityDelete,
    EntityFind,
    EntityScan,
    EntityHealth,
    IndexInitialize,
    IndexRefresh,
    IndexDelete,
    IndexEntity,
    Provision,
}

/// Number of failures meaning "until disarmed".
pub const ALWAYS: u32 = u32::MAX;

/// Shared table of armed faults.
#[derive(Debug, Default)]
pub struct FaultInjector {
    armed: Mutex<HashMap<(FaultPoint, Option<TenantId>), u32>>,
}

impl FaultInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` calls at `point`. `tenant = None` matches any
    /// tenant; a tenant-specific fault is consumed before a wildcard one.
    pub fn arm(&self, point: FaultPoint, tenant: Option<TenantId>, times: u32) {
        let mut armed = self.armed.lock().unwrap_or_else(|e| e.into_inner());
        armed.insert((point, tenant), times);
    }

    /// Remove every armed fault.
    pub fn disarm_all(&self) {
        let mut armed = self.armed.lock().unwrap_or_else(|e| e.into_inner());
        armed.clear();
    }

    /// Fail if a fault is armed for this call, consuming one shot.
    pub fn check(&self, point: FaultPoint, tenant: Option<TenantId>) -> TenantryResult<()> {
        let mut armed = self.armed.lock().unwrap_or_else(|e| e.into_inner());

        let mut keys = Vec::with_capacity(2);
        if tenant.is_some() {
            keys.push((point, tenant));
        }
        keys.push((point, None));

        for key in keys {
            if let Some(remaining) = armed.get_mut(&key) {
                if *remaining != ALWAYS {
                    *remaining -= 1;
                }
                if *remaining == 0 {
                    armed.remove(&key);
                }
                return Err(StorageError::Unavailable {
                    reason: format!("injected fault at {point:?}"),
                }
                .into());
            }
        }
        Ok(())
    }
}
