//! Multi-source database config resolution.
//!
//! Sources are tried strictly in order until one yields a usable config:
//! core catalog ref, legacy local settings, tenant catalog ref, legacy
//! tenant inline slots. Catalog-indexed sources always win over inline ones
//! for the same key, so catalogs can migrate without touching tenant
//! records. Catalog entries are self-sufficient: no read/write branching and
//! no credential fetch is applied to them.

use crate::catalog::CatalogClient;
use crate::config::settings::SettingsSource;
use crate::config::types::{AccessType, ConfigSlots, DatabaseConfig, TenantDatabaseRef};
use crate::error::{json_type_name, DispatchError};
use crate::secrets::CredentialFetcher;
use crate::session::{ClientRecord, ClientSource, Session};
use serde_json::Value;
use std::sync::Arc;

/// Where a key was found, before slot selection.
enum SourceHit {
    /// Catalog-resolved config object (core or tenant ref). Complete as-is.
    Catalog(Value),
    /// Legacy `{ write, read?, admin? }` slots (local settings or tenant
    /// inline). Selected slot gets credential gating applied.
    Slots(ConfigSlots),
}

pub struct ConfigResolver {
    catalog: Arc<CatalogClient>,
    credentials: Arc<CredentialFetcher>,
    settings: Arc<dyn SettingsSource>,
    clients: Arc<dyn ClientSource>,
}

impl ConfigResolver {
    pub fn new(
        catalog: Arc<CatalogClient>,
        credentials: Arc<CredentialFetcher>,
        settings: Arc<dyn SettingsSource>,
        clients: Arc<dyn ClientSource>,
    ) -> Self {
        ConfigResolver {
            catalog,
            credentials,
            settings,
            clients,
        }
    }

    /// Produce a driver-ready config for `(key, access)`.
    pub async fn resolve(
        &self,
        key: &str,
        access: AccessType,
        session: Option<&Session>,
    ) -> Result<DatabaseConfig, DispatchError> {
        match self.locate(key, session).await? {
            Some(SourceHit::Catalog(config)) => DatabaseConfig::from_slot(key, &config),
            Some(SourceHit::Slots(slots)) => {
                let slot = slots.select(access).ok_or_else(|| {
                    DispatchError::InvalidDbConfig {
                        key: key.to_string(),
                        message: format!("no '{}' config slot", access),
                    }
                })?;
                let config = DatabaseConfig::from_slot(key, slot)?;
                Ok(self.credentials.fetch(key, config, access).await)
            }
            None => Err(DispatchError::DbConfigNotFound {
                key: key.to_string(),
                with_session: has_tenant_context(session),
            }),
        }
    }

    /// Whether the source that would resolve `key` defines a dedicated read
    /// slot. Catalog-indexed configs never do. An unresolvable key reports
    /// `false` rather than failing; hard shape errors still propagate.
    pub async fn has_read_slot(
        &self,
        key: &str,
        session: Option<&Session>,
    ) -> Result<bool, DispatchError> {
        match self.locate(key, session).await {
            Ok(Some(SourceHit::Slots(slots))) => Ok(slots.has_read()),
            Ok(Some(SourceHit::Catalog(_))) | Ok(None) => Ok(false),
            Err(DispatchError::DbConfigNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Walk the resolution sources in order. `Ok(None)` means no source
    /// defines the key.
    async fn locate(
        &self,
        key: &str,
        session: Option<&Session>,
    ) -> Result<Option<SourceHit>, DispatchError> {
        // 1. Core catalog ref. An unresolvable ref (unknown id) is a soft
        // miss and resolution falls through.
        if let Some(reference) = self.catalog.core_database(key).await {
            if let Some(config) = self.catalog.database_config(&reference).await {
                return Ok(Some(SourceHit::Catalog(config)));
            }
        }

        // 2. Legacy local settings.
        if let Some(settings) = self.settings.database_settings() {
            if !settings.is_object() {
                return Err(DispatchError::InvalidSettings {
                    found: json_type_name(&settings),
                });
            }
            if let Some(entry) = settings.get(key) {
                return Ok(Some(SourceHit::Slots(settings_entry_slots(key, entry)?)));
            }
        }

        // 3 + 4. Tenant record, catalog-indexed then inline.
        let Some(client_code) = session.and_then(|s| s.client_code.as_deref()) else {
            return Ok(None);
        };
        let record = self.fetch_client(client_code).await?;
        let Some(databases) = record.databases() else {
            return Ok(None);
        };
        let Some(entry) = databases.get(key) else {
            return Ok(None);
        };

        match TenantDatabaseRef::classify(entry) {
            Some(TenantDatabaseRef::CatalogRef { id, overrides }) => {
                let mut reference = overrides;
                if let Some(obj) = reference.as_object_mut() {
                    obj.insert("id".into(), Value::String(id.clone()));
                }
                if let Some(config) = self.catalog.database_config(&reference).await {
                    return Ok(Some(SourceHit::Catalog(config)));
                }
                // Catalog miss; inline slots on the same entry are the
                // legacy fallback when the record carries any.
                let slots = ConfigSlots::from_value(entry).unwrap_or_default();
                if slots.write.is_none() && slots.read.is_none() && slots.admin.is_none() {
                    tracing::warn!(key, id = %id, client = client_code, "tenant catalog ref unresolvable and no inline fallback");
                    return Ok(None);
                }
                Ok(Some(SourceHit::Slots(slots)))
            }
            Some(TenantDatabaseRef::Inline(slots)) => Ok(Some(SourceHit::Slots(slots))),
            None => Err(DispatchError::InvalidDbConfig {
                key: key.to_string(),
                message: format!("expected an object, got {}", json_type_name(entry)),
            }),
        }
    }

    async fn fetch_client(&self, code: &str) -> Result<ClientRecord, DispatchError> {
        match self.clients.client(code).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(DispatchError::InvalidClient(format!(
                "no client record for code '{}'",
                code
            ))),
            Err(e) => Err(DispatchError::InvalidClient(format!(
                "client record fetch for '{}' failed: {}",
                code, e
            ))),
        }
    }
}

fn has_tenant_context(session: Option<&Session>) -> bool {
    session.map(|s| s.client_code.is_some()).unwrap_or(false)
}

fn settings_entry_slots(key: &str, entry: &Value) -> Result<ConfigSlots, DispatchError> {
    ConfigSlots::from_value(entry).ok_or_else(|| DispatchError::InvalidDbConfig {
        key: key.to_string(),
        message: format!("expected an object, got {}", json_type_name(entry)),
    })
}
