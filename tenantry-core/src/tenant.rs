//! Tenant names, bookkeeping status and the application info record.

use crate::naming::{
    edge_type_for_collection, APPLICATION_INFO, APPLICATION_INFOS, DELETED_APPLICATION_INFOS,
    NAME_SEPARATOR, PROPERTY_ACTIVE_NAME, PROPERTY_NAME, PROPERTY_STATUS, PROPERTY_UUID,
};
use crate::{Entity, Properties, StorageError, TenantId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Canonical `organization/application` name, always lowercase.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantName(String);

impl TenantName {
    /// Canonicalise an application name within an organization.
    ///
    /// A name that already contains the separator is taken as fully
    /// qualified and the organization is ignored.
    pub fn canonical(organization: &str, name: &str) -> Self {
        if name.contains(NAME_SEPARATOR) {
            Self(name.to_lowercase())
        } else {
            Self(format!("{organization}{NAME_SEPARATOR}{name}").to_lowercase())
        }
    }

    /// Canonicalise an already qualified name (lookups take these).
    pub fn from_qualified(name: &str) -> Self {
        Self(name.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before the first separator.
    pub fn organization(&self) -> &str {
        self.0
            .split_once(NAME_SEPARATOR)
            .map(|(org, _)| org)
            .unwrap_or("")
    }

    /// The part after the first separator.
    pub fn application(&self) -> &str {
        self.0
            .split_once(NAME_SEPARATOR)
            .map(|(_, app)| app)
            .unwrap_or(&self.0)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for TenantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Bookkeeping state of a tenant.
///
/// ```text
/// NONEXISTENT ── create ──→ Active ── delete ──→ Deleted
///                             ↑                     │
///                             └────── restore ──────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Deleted,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Active => "active",
            TenantStatus::Deleted => "deleted",
        }
    }

    /// Edge type from the management root that lists tenants in this state.
    pub fn edge_type(&self) -> String {
        match self {
            TenantStatus::Active => edge_type_for_collection(APPLICATION_INFOS),
            TenantStatus::Deleted => edge_type_for_collection(DELETED_APPLICATION_INFOS),
        }
    }

    /// The status whose listing edge is the other one.
    pub fn opposite(&self) -> Self {
        match self {
            TenantStatus::Active => TenantStatus::Deleted,
            TenantStatus::Deleted => TenantStatus::Active,
        }
    }
}

impl fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing an invalid tenant status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantStatusParseError(pub String);

impl fmt::Display for TenantStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid tenant status: {}", self.0)
    }
}

impl std::error::Error for TenantStatusParseError {}

impl FromStr for TenantStatus {
    type Err = TenantStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(TenantStatus::Active),
            "deleted" => Ok(TenantStatus::Deleted),
            _ => Err(TenantStatusParseError(s.to_string())),
        }
    }
}

/// Typed view of one bookkeeping record in the management tenant.
///
/// A single record per tenant carries its status; deleting and restoring
/// flip the status with a versioned update instead of moving the record
/// between collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationInfo {
    pub tenant_id: TenantId,
    pub name: TenantName,
    pub status: TenantStatus,
    /// Store version of the backing entity (0 if never stored).
    pub version: u64,
}

impl ApplicationInfo {
    /// A fresh active record.
    pub fn active(tenant_id: TenantId, name: TenantName) -> Self {
        Self {
            tenant_id,
            name,
            status: TenantStatus::Active,
            version: 0,
        }
    }

    /// Properties as stored. `active_name` is only written while active.
    pub fn to_properties(&self) -> Properties {
        let mut props = Properties::new();
        props.insert(PROPERTY_NAME.into(), Value::from(self.name.as_str()));
        props.insert(
            PROPERTY_UUID.into(),
            Value::from(self.tenant_id.to_string()),
        );
        props.insert(PROPERTY_STATUS.into(), Value::from(self.status.as_str()));
        if self.status == TenantStatus::Active {
            props.insert(
                PROPERTY_ACTIVE_NAME.into(),
                Value::from(self.name.as_str()),
            );
        }
        props
    }

    /// Write this record's fields over a stored entity, keeping every
    /// other property and the entity's version.
    pub fn apply_to(&self, entity: &mut Entity) {
        for (key, value) in self.to_properties() {
            entity.set_property(key, value);
        }
        if self.status != TenantStatus::Active {
            entity.remove_property(PROPERTY_ACTIVE_NAME);
        }
    }

    /// Build the entity to insert or update.
    pub fn to_entity(&self) -> Entity {
        let mut entity = Entity::new(
            self.tenant_id.as_uuid(),
            APPLICATION_INFO,
            self.to_properties(),
        );
        entity.version = self.version;
        entity
    }

    /// Parse a stored entity.
    ///
    /// Records written before the status field existed have no `status` and
    /// are read as active.
    pub fn from_entity(entity: &Entity) -> Result<Self, StorageError> {
        let malformed = |reason: &str| StorageError::MalformedRecord {
            id: entity.id,
            reason: reason.to_string(),
        };

        let name = entity
            .str_property(PROPERTY_NAME)
            .ok_or_else(|| malformed("missing name"))?;
        let status = match entity.str_property(PROPERTY_STATUS) {
            Some(raw) => raw
                .parse::<TenantStatus>()
                .map_err(|e| malformed(&e.to_string()))?,
            None => TenantStatus::Active,
        };

        Ok(Self {
            tenant_id: TenantId::from_uuid(entity.id),
            name: TenantName::from_qualified(name),
            status,
            version: entity.version,
        })
    }
}
