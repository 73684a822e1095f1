//! In-memory entity store.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tenantry_core::naming::{APPLICATION_INFOS, PROPERTY_ACTIVE_NAME, PROPERTY_NAME, ROLES};
use tenantry_core::{
    CollectionScope, Entity, EntityId, HealthCheck, StorageError, TenantId, TenantryResult,
};

use super::faults::{FaultInjector, FaultPoint};
use crate::traits::{EntityStore, EntityStream};

#[derive(Debug, Default)]
struct Collection {
    /// Insertion sequence -> entity id.
    order: BTreeMap<u64, EntityId>,
    entities: HashMap<EntityId, (u64, Entity)>,
}

impl Collection {
    fn holder_of(&self, property: &str, value: &str) -> Option<&Entity> {
        self.entities
            .values()
            .map(|(_, entity)| entity)
            .find(|entity| entity.str_property(property) == Some(value))
    }
}

#[derive(Debug, Default)]
struct Inner {
    collections: HashMap<CollectionScope, Collection>,
    next_seq: u64,
}

/// Entity store keeping collections in insertion order.
///
/// Unique properties are enforced per (collection, property) rule; an
/// entity without the property never clashes.
#[derive(Debug)]
pub struct InMemoryEntityStore {
    inner: RwLock<Inner>,
    unique: Vec<(String, String)>,
    faults: Arc<FaultInjector>,
}

impl Default for InMemoryEntityStore {
    fn default() -> Self {
        Self::with_faults(Arc::default())
    }
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with the default unique rules, sharing a fault injector.
    pub fn with_faults(faults: Arc<FaultInjector>) -> Self {
        Self {
            inner: RwLock::default(),
            unique: vec![
                (APPLICATION_INFOS.to_string(), PROPERTY_ACTIVE_NAME.to_string()),
                (ROLES.to_string(), PROPERTY_NAME.to_string()),
            ],
            faults,
        }
    }

    /// Add a unique rule.
    pub fn with_unique(mut self, collection: impl Into<String>, property: impl Into<String>) -> Self {
        self.unique.push((collection.into(), property.into()));
        self
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    fn unique_properties<'a>(&'a self, collection: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.unique
            .iter()
            .filter(move |(c, _)| c == collection)
            .map(|(_, p)| p.as_str())
    }

    fn check_unique(
        &self,
        scope: &CollectionScope,
        existing: Option<&Collection>,
        entity: &Entity,
    ) -> Result<(), StorageError> {
        let Some(existing) = existing else {
            return Ok(());
        };
        for property in self.unique_properties(&scope.collection) {
            let Some(value) = entity.str_property(property) else {
                continue;
            };
            if let Some(holder) = existing.holder_of(property, value) {
                if holder.id != entity.id {
                    return Err(StorageError::DuplicateUniqueProperty {
                        collection: scope.collection.clone(),
                        property: property.to_string(),
                        value: value.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl EntityStore for InMemoryEntityStore {
    fn insert(&self, scope: &CollectionScope, entity: &Entity) -> TenantryResult<Entity> {
        self.faults.check(FaultPoint::EntityInsert, Some(scope.tenant))?;
        let mut inner = self.inner.write().map_err(|_| StorageError::LockPoisoned)?;

        if let Some(collection) = inner.collections.get(scope) {
            if collection.entities.contains_key(&entity.id) {
                return Err(StorageError::InsertFailed {
                    entity_type: entity.entity_type.clone(),
                    reason: format!("{} already exists in {}", entity.id, scope),
                }
                .into());
            }
        }
        self.check_unique(scope, inner.collections.get(scope), entity)?;

        let mut stored = entity.clone();
        stored.version = 1;
        let now = Utc::now();
        stored.created_at = now;
        stored.modified_at = now;

        let seq = inner.next_seq;
        inner.next_seq += 1;
        let collection = inner.collections.entry(scope.clone()).or_default();
        collection.order.insert(seq, stored.id);
        collection.entities.insert(stored.id, (seq, stored.clone()));
        Ok(stored)
    }

    fn load(&self, scope: &CollectionScope, id: EntityId) -> TenantryResult<Option<Entity>> {
        self.faults.check(FaultPoint::EntityLoad, Some(scope.tenant))?;
        let inner = self.inner.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(inner
            .collections
            .get(scope)
            .and_then(|c| c.entities.get(&id))
            .map(|(_, entity)| entity.clone()))
    }

    fn update(&self, scope: &CollectionScope, entity: &Entity) -> TenantryResult<Entity> {
        self.faults.check(FaultPoint::EntityUpdate, Some(scope.tenant))?;
        let mut inner = self.inner.write().map_err(|_| StorageError::LockPoisoned)?;

        let (seq, current) = inner
            .collections
            .get(scope)
            .and_then(|c| c.entities.get(&entity.id))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                entity_type: entity.entity_type.clone(),
                id: entity.id,
            })?;

        if current.version != entity.version {
            return Err(StorageError::VersionConflict {
                id: entity.id,
                expected: entity.version,
                found: current.version,
            }
            .into());
        }
        self.check_unique(scope, inner.collections.get(scope), entity)?;

        let mut stored = entity.clone();
        stored.version = current.version + 1;
        stored.created_at = current.created_at;
        stored.modified_at = Utc::now();

        if let Some(collection) = inner.collections.get_mut(scope) {
            collection.entities.insert(stored.id, (seq, stored.clone()));
        }
        Ok(stored)
    }

    fn delete(&self, scope: &CollectionScope, id: EntityId) -> TenantryResult<bool> {
        self.faults.check(FaultPoint::EntityDelete, Some(scope.tenant))?;
        let mut inner = self.inner.write().map_err(|_| StorageError::LockPoisoned)?;
        let Some(collection) = inner.collections.get_mut(scope) else {
            return Ok(false);
        };
        let Some((seq, _)) = collection.entities.remove(&id) else {
            return Ok(false);
        };
        collection.order.remove(&seq);
        if collection.entities.is_empty() {
            inner.collections.remove(scope);
        }
        Ok(true)
    }

    fn find_by_unique(
        &self,
        scope: &CollectionScope,
        property: &str,
        value: &str,
    ) -> TenantryResult<Option<Entity>> {
        self.faults.check(FaultPoint::EntityFind, Some(scope.tenant))?;
        let inner = self.inner.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(inner
            .collections
            .get(scope)
            .and_then(|c| c.holder_of(property, value))
            .cloned())
    }

    fn scan(&self, scope: &CollectionScope, reverse: bool) -> TenantryResult<EntityStream<'_>> {
        self.faults.check(FaultPoint::EntityScan, Some(scope.tenant))?;
        let inner = self.inner.read().map_err(|_| StorageError::LockPoisoned)?;

        let mut snapshot: Vec<Entity> = inner
            .collections
            .get(scope)
            .map(|c| {
                c.order
                    .values()
                    .filter_map(|id| c.entities.get(id).map(|(_, e)| e.clone()))
                    .collect()
            })
            .unwrap_or_default();
        if reverse {
            snapshot.reverse();
        }
        Ok(Box::new(snapshot.into_iter().map(Ok)))
    }

    fn collections(&self, tenant: TenantId) -> TenantryResult<Vec<String>> {
        self.faults.check(FaultPoint::EntityScan, Some(tenant))?;
        let inner = self.inner.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut names: Vec<String> = inner
            .collections
            .iter()
            .filter(|(scope, c)| scope.tenant == tenant && !c.entities.is_empty())
            .map(|(scope, _)| scope.collection.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    fn count(&self) -> TenantryResult<u64> {
        let inner = self.inner.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(inner
            .collections
            .values()
            .map(|c| c.entities.len() as u64)
            .sum())
    }

    fn health(&self) -> TenantryResult<HealthCheck> {
        self.faults.check(FaultPoint::EntityHealth, None)?;
        let start = std::time::Instant::now();
        let inner = self.inner.read().map_err(|_| StorageError::LockPoisoned)?;
        let collections = inner.collections.len();
        drop(inner);

        Ok(HealthCheck::healthy("entity-store")
            .measured(start.elapsed())
            .detail("collections", collections))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tenantry_core::{new_entity_id, Properties, TenantryError};

    fn scope(tenant: TenantId, collection: &str) -> CollectionScope {
        CollectionScope::new(tenant, collection)
    }

    fn named(entity_type: &str, name: &str) -> Entity {
        let mut entity = Entity::new(new_entity_id(), entity_type, Properties::new());
        entity.set_property(PROPERTY_NAME, name);
        entity
    }

    fn drain(stream: EntityStream<'_>) -> Vec<Entity> {
        stream.collect::<TenantryResult<Vec<_>>>().expect("drain")
    }

    #[test]
    fn test_insert_assigns_version_one() {
        let store = InMemoryEntityStore::new();
        let users = scope(TenantId::now_v7(), "users");
        let stored = store.insert(&users, &named("user", "alice")).unwrap();

        assert_eq!(stored.version, 1);
        assert_eq!(store.load(&users, stored.id).unwrap(), Some(stored));
    }

    #[test]
    fn test_insert_rejects_existing_id() {
        let store = InMemoryEntityStore::new();
        let users = scope(TenantId::now_v7(), "users");
        let entity = named("user", "alice");
        store.insert(&users, &entity).unwrap();

        let err = store.insert(&users, &entity).unwrap_err();
        assert!(matches!(
            err,
            TenantryError::Storage(StorageError::InsertFailed { .. })
        ));
    }

    #[test]
    fn test_unique_rule_rejects_second_holder() {
        let store = InMemoryEntityStore::new();
        let roles = scope(TenantId::now_v7(), ROLES);
        store.insert(&roles, &named("role", "admin")).unwrap();

        let err = store.insert(&roles, &named("role", "admin")).unwrap_err();
        assert!(matches!(
            err,
            TenantryError::Storage(StorageError::DuplicateUniqueProperty { .. })
        ));

        // Same value in a collection without the rule is fine.
        let users = scope(roles.tenant, "users");
        store.insert(&users, &named("user", "admin")).unwrap();
        store.insert(&users, &named("user", "admin")).unwrap();
    }

    #[test]
    fn test_custom_unique_rule() {
        let store = InMemoryEntityStore::new().with_unique("users", "email");
        let users = scope(TenantId::now_v7(), "users");
        let mut a = named("user", "a");
        a.set_property("email", "x@y");
        let mut b = named("user", "b");
        b.set_property("email", "x@y");

        store.insert(&users, &a).unwrap();
        assert!(store.insert(&users, &b).is_err());
        assert_eq!(
            store.find_by_unique(&users, "email", "x@y").unwrap().map(|e| e.id),
            Some(a.id)
        );
    }

    #[test]
    fn test_update_is_conditional_on_version() {
        let store = InMemoryEntityStore::new();
        let users = scope(TenantId::now_v7(), "users");
        let stored = store.insert(&users, &named("user", "alice")).unwrap();

        let mut first = stored.clone();
        first.set_property("age", 30);
        let updated = store.update(&users, &first).unwrap();
        assert_eq!(updated.version, 2);

        let mut stale = stored;
        stale.set_property("age", 31);
        let err = store.update(&users, &stale).unwrap_err();
        assert_eq!(
            err,
            TenantryError::Storage(StorageError::VersionConflict {
                id: stale.id,
                expected: 1,
                found: 2,
            })
        );
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let store = InMemoryEntityStore::new();
        let users = scope(TenantId::now_v7(), "users");
        let err = store.update(&users, &named("user", "ghost")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_removing_unique_property_frees_value() {
        let store = InMemoryEntityStore::new();
        let infos = scope(TenantId::now_v7(), APPLICATION_INFOS);
        let mut first = Entity::new(new_entity_id(), "application_info", Properties::new());
        first.set_property(PROPERTY_ACTIVE_NAME, "org/app");
        let mut first = store.insert(&infos, &first).unwrap();

        first.remove_property(PROPERTY_ACTIVE_NAME);
        store.update(&infos, &first).unwrap();

        let mut second = Entity::new(new_entity_id(), "application_info", Properties::new());
        second.set_property(PROPERTY_ACTIVE_NAME, "org/app");
        assert!(store.insert(&infos, &second).is_ok());
    }

    #[test]
    fn test_delete_and_collections() {
        let store = InMemoryEntityStore::new();
        let tenant = TenantId::now_v7();
        let users = scope(tenant, "users");
        let groups = scope(tenant, "groups");
        let alice = store.insert(&users, &named("user", "alice")).unwrap();
        store.insert(&groups, &named("group", "ops")).unwrap();

        assert_eq!(
            store.collections(tenant).unwrap(),
            vec!["groups".to_string(), "users".to_string()]
        );
        assert!(store.delete(&users, alice.id).unwrap());
        assert!(!store.delete(&users, alice.id).unwrap());
        assert_eq!(store.collections(tenant).unwrap(), vec!["groups".to_string()]);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_health_reports_and_faults() {
        let store = InMemoryEntityStore::new();
        assert!(store.health().unwrap().is_healthy());

        store.faults().arm(FaultPoint::EntityHealth, None, 1);
        assert!(store.health().is_err());
    }

    proptest! {
        #[test]
        fn prop_reverse_scan_is_reversed_forward(count in 0usize..20) {
            let store = InMemoryEntityStore::new();
            let users = scope(TenantId::now_v7(), "users");
            for i in 0..count {
                store.insert(&users, &named("user", &format!("u{i}"))).unwrap();
            }

            let forward = drain(store.scan(&users, false).unwrap());
            let mut backward = drain(store.scan(&users, true).unwrap());
            backward.reverse();

            prop_assert_eq!(forward.len(), count);
            prop_assert_eq!(forward, backward);
        }
    }
}
