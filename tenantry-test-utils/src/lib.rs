//! Tenantry Test Utilities
//!
//! Shared test infrastructure for the Tenantry workspace:
//! - A ready-made registry over in-memory stores with fault injection
//! - Proptest generators for names and properties
//! - Assertions for registry error variants
//! - Tracing setup for tests

use std::sync::{Arc, Once};

pub use tenantry_core::{
    ApplicationInfo, Entity, EntityRef, Properties, RegistryConfig, RegistryError, StorageError,
    TenantId, TenantName, TenantStatus, TenantryError, TenantryResult, MANAGEMENT_TENANT_ID,
};
pub use tenantry_registry::{ApplicationRegistry, NoProgress, ProgressCounter, Stores};
pub use tenantry_storage::memory::{
    FaultInjector, FaultPoint, InMemoryEntityStore, InMemoryGraphStore, InMemoryProvisioner,
    InMemorySearchIndex, ALWAYS,
};

// ============================================================================
// TRACING
// ============================================================================

static TRACING: Once = Once::new();

/// Install a fmt subscriber filtered by `RUST_LOG` (default `warn`).
/// Safe to call from every test.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for registry inputs.

    use super::*;
    use proptest::prelude::*;

    /// Organization segment, mixed case.
    pub fn arb_organization() -> impl Strategy<Value = String> {
        "[a-zA-Z][a-zA-Z0-9-]{0,11}"
    }

    /// Application segment, mixed case, never containing the separator.
    pub fn arb_application() -> impl Strategy<Value = String> {
        "[a-zA-Z][a-zA-Z0-9_]{0,11}"
    }

    pub fn arb_tenant_name() -> impl Strategy<Value = TenantName> {
        (arb_organization(), arb_application())
            .prop_map(|(org, app)| TenantName::canonical(&org, &app))
    }

    /// Small flat property maps with string values.
    pub fn arb_properties() -> impl Strategy<Value = Properties> {
        prop::collection::btree_map("[a-z]{1,8}", "[a-zA-Z0-9 ]{0,16}", 0..4).prop_map(|map| {
            map.into_iter()
                .map(|(k, v)| (k, serde_json::Value::String(v)))
                .collect()
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! A registry wired to in-memory stores.

    use super::*;

    /// In-memory stores sharing one fault injector, plus a registry over
    /// them that has already run `setup`.
    pub struct TestPlatform {
        pub faults: Arc<FaultInjector>,
        pub graph: Arc<InMemoryGraphStore>,
        pub entities: Arc<InMemoryEntityStore>,
        pub index: Arc<InMemorySearchIndex>,
        pub provisioner: Arc<InMemoryProvisioner>,
        pub registry: ApplicationRegistry,
    }

    impl TestPlatform {
        /// Platform with the default configuration.
        pub fn new() -> Self {
            Self::with_config(RegistryConfig::default())
        }

        pub fn with_config(config: RegistryConfig) -> Self {
            let platform = Self::unbooted(config);
            platform.registry.setup().expect("registry setup");
            platform
        }

        /// Platform whose registry has not run `setup` yet.
        pub fn unbooted(config: RegistryConfig) -> Self {
            init_tracing();
            let faults = Arc::new(FaultInjector::new());
            let graph = Arc::new(InMemoryGraphStore::with_faults(faults.clone()));
            let entities = Arc::new(InMemoryEntityStore::with_faults(faults.clone()));
            let index = Arc::new(InMemorySearchIndex::with_faults(faults.clone()));
            let provisioner = Arc::new(InMemoryProvisioner::with_faults(faults.clone()));

            let stores = Stores::new(
                graph.clone(),
                entities.clone(),
                index.clone(),
                provisioner.clone(),
            );
            let registry = ApplicationRegistry::new(config, stores).expect("valid config");

            Self {
                faults,
                graph,
                entities,
                index,
                provisioner,
                registry,
            }
        }

        /// Create `org/app` and return its id.
        pub fn create(&self, org: &str, app: &str) -> TenantId {
            self.registry
                .create_tenant(org, app, None)
                .expect("create tenant")
        }

        /// Create a tenant holding `count` users.
        pub fn create_with_users(&self, org: &str, app: &str, count: usize) -> TenantId {
            let tenant = self.create(org, app);
            let manager = self
                .registry
                .get_entity_manager(tenant)
                .expect("tenant manager");
            for i in 0..count {
                let mut props = Properties::new();
                props.insert("name".to_string(), format!("user{i}").into());
                manager.create("user", props).expect("create user");
            }
            tenant
        }
    }

    impl Default for TestPlatform {
        fn default() -> Self {
            Self::new()
        }
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for registry error variants.

    use super::*;

    #[track_caller]
    pub fn assert_already_exists<T: std::fmt::Debug>(result: &TenantryResult<T>) {
        match result {
            Err(TenantryError::Registry(RegistryError::AlreadyExists { .. })) => {}
            other => panic!("Expected AlreadyExists, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_registry_not_found<T: std::fmt::Debug>(result: &TenantryResult<T>) {
        match result {
            Err(TenantryError::Registry(RegistryError::NotFound { .. })) => {}
            other => panic!("Expected registry NotFound, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_unsupported<T: std::fmt::Debug>(result: &TenantryResult<T>) {
        match result {
            Err(TenantryError::Registry(RegistryError::Unsupported { .. })) => {}
            other => panic!("Expected Unsupported, got: {:?}", other),
        }
    }
}

pub use assertions::*;
pub use fixtures::TestPlatform;
pub use generators::*;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_platform_boots_management_tenant() {
        let platform = TestPlatform::new();
        let manager = platform
            .registry
            .get_entity_manager(MANAGEMENT_TENANT_ID)
            .unwrap();
        assert_eq!(
            manager.application_name().unwrap().as_deref(),
            Some("systemapp")
        );
        assert!(platform.provisioner.is_initialized());
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }

    proptest! {
        #[test]
        fn prop_generated_names_are_canonical(name in arb_tenant_name()) {
            prop_assert_eq!(name.as_str(), name.as_str().to_lowercase());
            prop_assert!(name.as_str().contains('/'));
        }
    }
}
