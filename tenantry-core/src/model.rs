//! Store-facing value types: entities, graph nodes, edges and scopes.
//!
//! These are the shapes exchanged with the three backing stores. They carry
//! no behavior beyond small accessors.

use crate::{EntityId, TenantId, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Free-form entity properties.
pub type Properties = serde_json::Map<String, Value>;

/// A typed reference to an entity inside one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: String,
    pub id: EntityId,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, id: EntityId) -> Self {
        Self {
            entity_type: entity_type.into(),
            id,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.id)
    }
}

/// A stored entity.
///
/// `version` starts at 1 on insert and is bumped by the store on every
/// successful update; conditional updates compare against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub entity_type: String,
    pub properties: Properties,
    pub version: u64,
    pub created_at: Timestamp,
    pub modified_at: Timestamp,
}

impl Entity {
    /// Build a new, not yet stored entity.
    pub fn new(id: EntityId, entity_type: impl Into<String>, properties: Properties) -> Self {
        let now = Utc::now();
        Self {
            id,
            entity_type: entity_type.into(),
            properties,
            version: 0,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.entity_type.clone(), self.id)
    }

    /// Graph node for this entity.
    pub fn node_id(&self) -> NodeId {
        NodeId::new(self.id, self.entity_type.clone())
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// A property as a string slice, if present and a JSON string.
    pub fn str_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn remove_property(&mut self, key: &str) -> Option<Value> {
        self.properties.remove(key)
    }
}

/// A node in the graph store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId {
    pub id: uuid::Uuid,
    pub node_type: String,
}

impl NodeId {
    pub fn new(id: uuid::Uuid, node_type: impl Into<String>) -> Self {
        Self {
            id,
            node_type: node_type.into(),
        }
    }
}

impl From<&EntityRef> for NodeId {
    fn from(entity: &EntityRef) -> Self {
        Self::new(entity.id, entity.entity_type.clone())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node_type, self.id)
    }
}

/// A directed, typed edge.
///
/// `timestamp` is microseconds since the Unix epoch and orders traversal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub edge_type: String,
    pub target: NodeId,
    pub timestamp: i64,
}

impl Edge {
    /// A new edge stamped with the current time.
    pub fn new(source: NodeId, edge_type: impl Into<String>, target: NodeId) -> Self {
        Self {
            source,
            edge_type: edge_type.into(),
            target,
            timestamp: Utc::now().timestamp_micros(),
        }
    }
}

/// Traversal order for edge searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeOrder {
    Ascending,
    Descending,
}

/// Search for edges of one type leaving a source node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchByEdgeType {
    pub node: NodeId,
    pub edge_type: String,
    /// Only edges with `timestamp <= max_timestamp` are returned.
    pub max_timestamp: i64,
    pub order: EdgeOrder,
}

impl SearchByEdgeType {
    /// Unbounded search in the given order.
    pub fn all(node: NodeId, edge_type: impl Into<String>, order: EdgeOrder) -> Self {
        Self {
            node,
            edge_type: edge_type.into(),
            max_timestamp: i64::MAX,
            order,
        }
    }
}

/// A named collection inside one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionScope {
    pub tenant: TenantId,
    pub collection: String,
}

impl CollectionScope {
    pub fn new(tenant: TenantId, collection: impl Into<String>) -> Self {
        Self {
            tenant,
            collection: collection.into(),
        }
    }
}

impl fmt::Display for CollectionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant, self.collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_property_accessors() {
        let mut entity = Entity::new(uuid::Uuid::now_v7(), "user", Properties::new());
        entity.set_property("name", "alice");
        entity.set_property("age", 42);

        assert_eq!(entity.str_property("name"), Some("alice"));
        assert_eq!(entity.property("age"), Some(&json!(42)));
        assert_eq!(entity.str_property("age"), None);
        assert_eq!(entity.remove_property("name"), Some(json!("alice")));
        assert!(entity.property("name").is_none());
        assert_eq!(entity.version, 0);
    }

    #[test]
    fn test_entity_ref_and_node_agree() {
        let entity = Entity::new(uuid::Uuid::now_v7(), "user", Properties::new());
        let node = NodeId::from(&entity.entity_ref());
        assert_eq!(node, entity.node_id());
        assert_eq!(node.to_string(), format!("user:{}", entity.id));
    }

    #[test]
    fn test_search_all_is_unbounded() {
        let search = SearchByEdgeType::all(
            NodeId::new(uuid::Uuid::nil(), "application"),
            "collection:users",
            EdgeOrder::Descending,
        );
        assert_eq!(search.max_timestamp, i64::MAX);
        assert_eq!(search.order, EdgeOrder::Descending);
    }
}
