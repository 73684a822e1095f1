//! Error types for Tenantry operations

use crate::TenantId;
use thiserror::Error;
use uuid::Uuid;

/// Storage layer errors raised by the graph, entity and index stores.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: Uuid },

    #[error("Insert failed for {entity_type}: {reason}")]
    InsertFailed { entity_type: String, reason: String },

    #[error("Update failed for {entity_type} with id {id}: {reason}")]
    UpdateFailed {
        entity_type: String,
        id: Uuid,
        reason: String,
    },

    #[error("Duplicate value for unique property {property} in {collection}: {value}")]
    DuplicateUniqueProperty {
        collection: String,
        property: String,
        value: String,
    },

    #[error("Version conflict on {id}: expected {expected}, found {found}")]
    VersionConflict { id: Uuid, expected: u64, found: u64 },

    #[error("Malformed record {id}: {reason}")]
    MalformedRecord { id: Uuid, reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Index error on {index_name}: {reason}")]
    IndexError { index_name: String, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Registry-level errors, the domain translation of identity violations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Application already exists: {name}")]
    AlreadyExists { name: String },

    #[error("Application not found: {record} for {tenant_id}")]
    NotFound { tenant_id: TenantId, record: String },

    #[error("Operation not supported: {operation}")]
    Unsupported { operation: String },

    #[error("Bookkeeping conflict for {tenant_id}: {reason}")]
    Conflict { tenant_id: TenantId, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Tenantry errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TenantryError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl TenantryError {
    /// True if this is a registry `AlreadyExists`.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::Registry(RegistryError::AlreadyExists { .. }))
    }

    /// True for any flavour of "not found" (registry or storage).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Registry(RegistryError::NotFound { .. })
                | Self::Storage(StorageError::NotFound { .. })
        )
    }
}

/// Result type alias for Tenantry operations.
pub type TenantryResult<T> = Result<T, TenantryError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_conflict_names_both_versions() {
        let err = StorageError::VersionConflict {
            id: Uuid::nil(),
            expected: 2,
            found: 3,
        };
        assert_eq!(
            err.to_string(),
            "Version conflict on 00000000-0000-0000-0000-000000000000: expected 2, found 3"
        );
    }

    #[test]
    fn test_registry_error_display_already_exists() {
        let err = RegistryError::AlreadyExists {
            name: "orga/app1".to_string(),
        };
        assert_eq!(err.to_string(), "Application already exists: orga/app1");
    }

    #[test]
    fn test_wrapped_errors_keep_inner_message() {
        let err = TenantryError::from(ConfigError::InvalidValue {
            field: "handle_cache_capacity".to_string(),
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Config error: Invalid value for handle_cache_capacity: 0 - must be at least 1"
        );
    }

    #[test]
    fn test_tenantry_error_from_variants() {
        let storage = TenantryError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, TenantryError::Storage(_)));

        let registry = TenantryError::from(RegistryError::Unsupported {
            operation: "import".to_string(),
        });
        assert!(matches!(registry, TenantryError::Registry(_)));

        let config = TenantryError::from(ConfigError::MissingRequired {
            field: "name".to_string(),
        });
        assert!(matches!(config, TenantryError::Config(_)));
    }

    #[test]
    fn test_classification_helpers() {
        let exists = TenantryError::from(RegistryError::AlreadyExists {
            name: "a/b".to_string(),
        });
        assert!(exists.is_already_exists());
        assert!(!exists.is_not_found());

        let missing = TenantryError::from(StorageError::NotFound {
            entity_type: "user".to_string(),
            id: Uuid::nil(),
        });
        assert!(missing.is_not_found());
    }
}
