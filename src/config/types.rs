//! Raw config types for database connections: driver-ready configs, legacy
//! read/write/admin slot maps, and catalog-indexed tenant references.

use crate::error::{json_type_name, DispatchError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Which config/credential slot an operation needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessType {
    Read,
    Write,
    Admin,
}

impl AccessType {
    /// Slot name in settings, tenant records and secret bundles.
    pub fn slot_name(self) -> &'static str {
        match self {
            AccessType::Read => "read",
            AccessType::Write => "write",
            AccessType::Admin => "admin",
        }
    }

    pub fn from_read_flag(use_read_db: bool) -> Self {
        if use_read_db {
            AccessType::Read
        } else {
            AccessType::Write
        }
    }
}

impl std::fmt::Display for AccessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slot_name())
    }
}

/// Fully-resolved, driver-ready connection configuration.
///
/// `driver_type` is optional at this layer; the registry fails fast with
/// `MissingType` before any driver lookup when it is absent. Driver-specific
/// fields land in `extra` (BTreeMap so the canonical serialization used as a
/// cache key is order-stable).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub driver_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(
        default,
        alias = "connectionString",
        skip_serializing_if = "Option::is_none"
    )]
    pub connection_string: Option<String>,
    #[serde(default, alias = "skipFetchCredentials", skip_serializing_if = "is_false")]
    pub skip_fetch_credentials: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl DatabaseConfig {
    /// Parse a config slot. The slot must be a plain object; arrays and other
    /// JSON types are rejected the same way.
    pub fn from_slot(key: &str, value: &Value) -> Result<Self, DispatchError> {
        if !value.is_object() {
            return Err(DispatchError::InvalidDbConfig {
                key: key.to_string(),
                message: format!("expected an object, got {}", json_type_name(value)),
            });
        }
        serde_json::from_value(value.clone()).map_err(|e| DispatchError::InvalidDbConfig {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    /// Canonical serialization for use as a cache-key component. Field order
    /// is fixed by the struct; `extra` is sorted by key.
    pub fn canonical(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Legacy per-key config shape: `{ write, read?, admin? }`. Slots stay raw
/// until selected so shape validation can name the offending slot.
#[derive(Clone, Debug, Default)]
pub struct ConfigSlots {
    pub write: Option<Value>,
    pub read: Option<Value>,
    pub admin: Option<Value>,
}

impl ConfigSlots {
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(ConfigSlots {
            write: obj.get("write").cloned(),
            read: obj.get("read").cloned(),
            admin: obj.get("admin").cloned(),
        })
    }

    /// Slot for an access type. Read falls back to write when no read slot
    /// exists; admin falls back to write the same way.
    pub fn select(&self, access: AccessType) -> Option<&Value> {
        match access {
            AccessType::Write => self.write.as_ref(),
            AccessType::Read => self.read.as_ref().or(self.write.as_ref()),
            AccessType::Admin => self.admin.as_ref().or(self.write.as_ref()),
        }
    }

    pub fn has_read(&self) -> bool {
        self.read.is_some()
    }
}

/// Per-tenant database reference: catalog-indexed (current) or inline slots
/// (legacy). Discriminated by the presence of an `id` field.
#[derive(Clone, Debug)]
pub enum TenantDatabaseRef {
    /// `{ id, ...overrides }` — resolved against the remote catalog.
    CatalogRef { id: String, overrides: Value },
    /// `{ write, read?, admin? }` — inline credentials.
    Inline(ConfigSlots),
}

impl TenantDatabaseRef {
    pub fn classify(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        if let Some(id) = obj.get("id").and_then(Value::as_str) {
            let mut overrides = obj.clone();
            overrides.remove("id");
            return Some(TenantDatabaseRef::CatalogRef {
                id: id.to_string(),
                overrides: Value::Object(overrides),
            });
        }
        ConfigSlots::from_value(value).map(TenantDatabaseRef::Inline)
    }
}

/// Merge `overrides` over `base` (both JSON objects); override keys win.
/// Non-object inputs pass `base` through untouched.
pub(crate) fn merge_objects(base: &Value, overrides: &Value) -> Value {
    match (base.as_object(), overrides.as_object()) {
        (Some(b), Some(o)) => {
            let mut merged = b.clone();
            for (k, v) in o {
                merged.insert(k.clone(), v.clone());
            }
            Value::Object(merged)
        }
        _ => base.clone(),
    }
}
