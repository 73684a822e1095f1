//! Tenantry Registry - Application Registry & Cross-Store Consistency
//!
//! Tracks which tenants exist, maps their names to stable ids and moves them
//! between active and deleted across the graph, entity and search stores.
//!
//! # Architecture
//!
//! ```text
//! ApplicationRegistry
//!   ├─ NameIdCache         name ⇄ id, LRU, cache-aside over application_infos
//!   ├─ TenantHandleCache   id → Arc<TenantManager>, LRU, single-flight
//!   ├─ IndexInitGuard      management index created once, retried on failure
//!   └─ NameLocks           serializes create/restore per canonical name
//! ```
//!
//! All operations are synchronous and run on the calling thread.

pub mod handle_cache;
pub mod index_guard;
pub mod lifecycle;
pub mod manager;
pub mod name_cache;
pub mod name_lock;
pub mod progress;
pub mod properties;
pub mod rebuild;
pub mod stores;

pub use handle_cache::TenantHandleCache;
pub use index_guard::IndexInitGuard;
pub use lifecycle::ApplicationRegistry;
pub use manager::TenantManager;
pub use name_cache::{ApplicationInfoFetcher, NameCacheStats, NameFetcher, NameIdCache};
pub use name_lock::NameLocks;
pub use progress::{NoProgress, ProgressCounter, ProgressObserver};
pub use rebuild::{RebuildSummary, ReconcileReport};
pub use stores::Stores;
