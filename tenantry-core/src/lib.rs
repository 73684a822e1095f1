//! Tenantry Core - Registry Data Types
//!
//! Identifiers, naming conventions, the bookkeeping record, configuration and
//! the error taxonomy shared by every other crate. No store access and no
//! caching lives here.

pub mod config;
pub mod error;
pub mod health;
pub mod identity;
pub mod model;
pub mod naming;
pub mod tenant;

pub use config::RegistryConfig;
pub use error::{ConfigError, RegistryError, StorageError, TenantryError, TenantryResult};
pub use health::{HealthCheck, HealthStatus};
pub use identity::{new_entity_id, EntityId, TenantId, Timestamp};
pub use model::{
    CollectionScope, Edge, EdgeOrder, Entity, EntityRef, NodeId, Properties, SearchByEdgeType,
};
pub use naming::MANAGEMENT_TENANT_ID;
pub use tenant::{ApplicationInfo, TenantName, TenantStatus, TenantStatusParseError};
