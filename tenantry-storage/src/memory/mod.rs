//! In-memory implementations of the store traits.
//!
//! Used by tests and by embedders that need a registry without external
//! infrastructure. Every store can share a [`FaultInjector`] so failures can
//! be scripted per operation and per tenant.

mod entity;
mod faults;
mod graph;
mod index;
mod provision;

pub use entity::InMemoryEntityStore;
pub use faults::{FaultInjector, FaultPoint, ALWAYS};
pub use graph::InMemoryGraphStore;
pub use index::InMemorySearchIndex;
pub use provision::InMemoryProvisioner;
