//! Tenant and entity ids.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Id of an entity inside one tenant. New ids are v7, so they sort by
/// creation time.
pub type EntityId = Uuid;

pub type Timestamp = DateTime<Utc>;

pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}

/// Identifier of a tenant (an "application").
///
/// Issued once by the registry and never reassigned to another name. The
/// wrapped UUID doubles as the id of the tenant's root entity and of its
/// application info record in the management tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(Uuid);

impl TenantId {
    /// Generate a fresh time-ordered tenant id.
    pub fn now_v7() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID (restore and initialize paths reuse ids).
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for TenantId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<TenantId> for Uuid {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for TenantId {
    type Err = uuid::Error;

    fn from_str(text: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(text).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_ids_are_time_ordered() {
        let first = TenantId::now_v7();
        let second = TenantId::now_v7();
        assert!(first < second);
        assert_eq!(first.as_uuid().get_version_num(), 7);
    }

    #[test]
    fn test_tenant_id_parse_and_display() {
        let id = TenantId::now_v7();
        let parsed: TenantId = id.to_string().parse().expect("parse tenant id");
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<TenantId>().is_err());
    }

    #[test]
    fn test_tenant_id_serializes_as_plain_uuid() {
        let id = TenantId::from_uuid(Uuid::nil());
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000000\"");
    }
}
