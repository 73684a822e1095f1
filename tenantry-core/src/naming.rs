//! Naming conventions shared by the registry and the stores.
//!
//! Collection names, edge types and well-known identifiers live here so the
//! registry, the rebuild sweep and any external tooling agree on them.

use crate::{NodeId, TenantId};
use uuid::Uuid;

/// Well-known id of the management ("system") tenant.
pub const MANAGEMENT_TENANT_ID: TenantId =
    TenantId::from_uuid(Uuid::from_u128(0xb6768a08_b5d5_11e3_a495_10ddb1de66c3));

/// Default name of the management tenant's root entity.
pub const MANAGEMENT_APP_NAME: &str = "systemapp";

/// Entity type of every tenant root entity.
pub const TYPE_APPLICATION: &str = "application";

/// Entity type of the bookkeeping records kept in the management tenant.
pub const APPLICATION_INFO: &str = "application_info";

/// Collection holding every bookkeeping record, active or deleted.
pub const APPLICATION_INFOS: &str = "application_infos";

/// Collection name whose edge type marks deleted tenants.
pub const DELETED_APPLICATION_INFOS: &str = "deleted_application_infos";

/// Entity type and collection for service properties.
pub const TYPE_PROPERTY_MAP: &str = "propertymap";
pub const PROPERTY_MAPS: &str = "propertymaps";

/// Entity type and collection for access roles.
pub const TYPE_ROLE: &str = "role";
pub const ROLES: &str = "roles";

/// Roles every new tenant starts with after `reset_roles`.
pub const DEFAULT_ROLES: [&str; 3] = ["admin", "default", "guest"];

pub const PROPERTY_NAME: &str = "name";
pub const PROPERTY_UUID: &str = "uuid";
pub const PROPERTY_STATUS: &str = "status";

/// Unique property of `application_infos`; only present while active.
pub const PROPERTY_ACTIVE_NAME: &str = "active_name";

/// Separator between organization and application in a canonical name.
pub const NAME_SEPARATOR: char = '/';

const COLLECTION_EDGE_PREFIX: &str = "collection:";

/// Edge type connecting an owner to the members of one of its collections.
pub fn edge_type_for_collection(collection: &str) -> String {
    format!("{COLLECTION_EDGE_PREFIX}{collection}")
}

/// Inverse of [`edge_type_for_collection`].
pub fn collection_for_edge_type(edge_type: &str) -> Option<&str> {
    edge_type.strip_prefix(COLLECTION_EDGE_PREFIX)
}

/// Default collection name for an entity type ("user" -> "users").
pub fn collection_for_type(entity_type: &str) -> String {
    let lower = entity_type.to_lowercase();
    if lower.ends_with('s') || lower.ends_with('x') || lower.ends_with("ch") || lower.ends_with("sh")
    {
        return format!("{lower}es");
    }
    if let Some(stem) = lower.strip_suffix('y') {
        if !stem.ends_with(&['a', 'e', 'i', 'o', 'u'][..]) {
            return format!("{stem}ies");
        }
    }
    format!("{lower}s")
}

/// Root graph node of a tenant.
pub fn application_node(tenant: TenantId) -> NodeId {
    NodeId::new(tenant.as_uuid(), TYPE_APPLICATION)
}

/// Root graph node of the management tenant.
pub fn management_root() -> NodeId {
    application_node(MANAGEMENT_TENANT_ID)
}

/// Name of a tenant's search index.
pub fn index_name(tenant: TenantId) -> String {
    format!("tenant_{}", tenant.as_uuid().simple())
}
