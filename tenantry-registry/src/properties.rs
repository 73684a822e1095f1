//! Service-wide key/value settings kept in the management tenant.

use std::collections::HashMap;

use serde_json::Value;
use tenantry_core::naming::{PROPERTY_MAPS, TYPE_PROPERTY_MAP};
use tenantry_core::{CollectionScope, Entity, Properties, TenantryResult, MANAGEMENT_TENANT_ID};
use uuid::Uuid;

use crate::lifecycle::ApplicationRegistry;

// Fixed id of the single property map entity.
const PROPERTY_MAP_ID: Uuid = Uuid::from_u128(0x6d2c_4f6e_9a1b_4c3d_8e5f_7a6b_5c4d_3e2f);

fn property_map_scope() -> CollectionScope {
    CollectionScope::new(MANAGEMENT_TENANT_ID, PROPERTY_MAPS)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl ApplicationRegistry {
    fn load_property_map(&self) -> TenantryResult<Option<Entity>> {
        self.stores.entities.load(&property_map_scope(), PROPERTY_MAP_ID)
    }

    /// Apply `edit` to the stored property map, creating it if absent, and
    /// index the result with the rest of the management tenant.
    fn edit_property_map(&self, edit: impl FnOnce(&mut Properties)) -> TenantryResult<()> {
        let scope = property_map_scope();
        let stored = match self.load_property_map()? {
            Some(mut entity) => {
                edit(&mut entity.properties);
                self.stores.entities.update(&scope, &entity)?
            }
            None => {
                let mut properties = Properties::new();
                edit(&mut properties);
                let entity = Entity::new(PROPERTY_MAP_ID, TYPE_PROPERTY_MAP, properties);
                self.stores.entities.insert(&scope, &entity)?
            }
        };
        self.ensure_management_index()?;
        self.stores.index.index_entity(&scope, &stored)
    }

    /// All service properties. Empty if none were ever set.
    pub fn service_properties(&self) -> TenantryResult<HashMap<String, String>> {
        Ok(self
            .load_property_map()?
            .map(|entity| {
                entity
                    .properties
                    .iter()
                    .map(|(k, v)| (k.clone(), value_to_string(v)))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Merge `properties` into the stored map.
    pub fn update_service_properties(
        &self,
        properties: HashMap<String, String>,
    ) -> TenantryResult<()> {
        self.edit_property_map(|map| {
            for (key, value) in properties {
                map.insert(key, Value::String(value));
            }
        })
    }

    pub fn set_service_property(&self, key: &str, value: &str) -> TenantryResult<()> {
        self.edit_property_map(|map| {
            map.insert(key.to_string(), Value::from(value));
        })
    }

    /// Remove a property. Removing an unknown key is not an error.
    pub fn delete_service_property(&self, key: &str) -> TenantryResult<()> {
        if self.load_property_map()?.is_none() {
            return Ok(());
        }
        self.edit_property_map(|map| {
            map.remove(key);
        })
    }
}
