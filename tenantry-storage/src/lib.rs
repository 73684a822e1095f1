//! Tenantry Storage - Backing Store Abstractions
//!
//! The registry talks to three independent stores (graph, entity and search
//! index) plus a provisioning hook. This crate defines those interfaces and
//! ships in-memory implementations.
//!
//! The stores are synchronous and share no transaction boundary; callers
//! sequence multi-store writes themselves.

pub mod memory;
pub mod traits;

pub use memory::{
    FaultInjector, FaultPoint, InMemoryEntityStore, InMemoryGraphStore, InMemoryProvisioner,
    InMemorySearchIndex,
};
pub use traits::{EdgeStream, EntityStore, EntityStream, GraphStore, Provisioner, SearchIndex};
