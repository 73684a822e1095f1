//! Registry configuration.
//!
//! Loaded from environment variables with defaults suitable for a single
//! process serving a few hundred tenants.

use crate::naming::MANAGEMENT_APP_NAME;
use crate::ConfigError;

/// Default number of tenant handles kept alive.
pub const DEFAULT_HANDLE_CACHE_CAPACITY: usize = 100;

/// Default number of name to id mappings kept.
pub const DEFAULT_NAME_CACHE_CAPACITY: usize = 10_000;

/// Default number of entities between reindex progress log lines.
pub const DEFAULT_REINDEX_LOG_EVERY: u64 = 1_000;

/// Configuration for the application registry and its caches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Maximum number of cached tenant handles (LRU beyond this).
    pub handle_cache_capacity: usize,

    /// Maximum number of cached name to id mappings (LRU beyond this).
    pub name_cache_capacity: usize,

    /// Name given to the management tenant's root entity on bootstrap.
    pub management_app_name: String,

    /// Emit a progress log line every this many reindexed entities.
    pub reindex_log_every: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            handle_cache_capacity: DEFAULT_HANDLE_CACHE_CAPACITY,
            name_cache_capacity: DEFAULT_NAME_CACHE_CAPACITY,
            management_app_name: MANAGEMENT_APP_NAME.to_string(),
            reindex_log_every: DEFAULT_REINDEX_LOG_EVERY,
        }
    }
}

impl RegistryConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create RegistryConfig from environment variables.
    ///
    /// Environment variables:
    /// - `TENANTRY_HANDLE_CACHE_CAPACITY`: cached tenant handles (default: 100)
    /// - `TENANTRY_NAME_CACHE_CAPACITY`: cached name mappings (default: 10000)
    /// - `TENANTRY_MANAGEMENT_APP_NAME`: management tenant name (default: systemapp)
    /// - `TENANTRY_REINDEX_LOG_EVERY`: reindex log interval (default: 1000)
    ///
    /// Unparseable numbers fall back to the default; use [`validate`](Self::validate)
    /// to reject values that parse but make no sense.
    pub fn from_env() -> Self {
        let handle_cache_capacity = std::env::var("TENANTRY_HANDLE_CACHE_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_HANDLE_CACHE_CAPACITY);

        let name_cache_capacity = std::env::var("TENANTRY_NAME_CACHE_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_NAME_CACHE_CAPACITY);

        let management_app_name = std::env::var("TENANTRY_MANAGEMENT_APP_NAME")
            .ok()
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| MANAGEMENT_APP_NAME.to_string());

        let reindex_log_every = std::env::var("TENANTRY_REINDEX_LOG_EVERY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_REINDEX_LOG_EVERY);

        Self {
            handle_cache_capacity,
            name_cache_capacity,
            management_app_name,
            reindex_log_every,
        }
    }

    /// Set the handle cache capacity.
    pub fn with_handle_cache_capacity(mut self, capacity: usize) -> Self {
        self.handle_cache_capacity = capacity;
        self
    }

    /// Set the name cache capacity.
    pub fn with_name_cache_capacity(mut self, capacity: usize) -> Self {
        self.name_cache_capacity = capacity;
        self
    }

    /// Set the management tenant name.
    pub fn with_management_app_name(mut self, name: impl Into<String>) -> Self {
        self.management_app_name = name.into();
        self
    }

    /// Set the reindex log interval.
    pub fn with_reindex_log_every(mut self, every: u64) -> Self {
        self.reindex_log_every = every;
        self
    }

    /// Reject configurations the caches cannot be built from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.handle_cache_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "handle_cache_capacity".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.name_cache_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "name_cache_capacity".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.management_app_name.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "management_app_name".to_string(),
            });
        }
        if self.reindex_log_every == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reindex_log_every".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
