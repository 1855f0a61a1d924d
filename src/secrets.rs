//! Secret fetcher: lazily fetches and memoizes the service's credential
//! bundle and merges the matching slot into resolved configs. A failed fetch
//! yields an empty bundle so one bad secret lookup never blocks database
//! access; the connection is attempted without extra credentials and may
//! fail at the driver layer instead.

use crate::config::{merge_objects, AccessType, DatabaseConfig};
use crate::env::RuntimeEnv;
use crate::error::FetchError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Remote secret store: returns the JSON secret stored under a well-known
/// name (`<service-name>-databases`).
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<Value, FetchError>;
}

/// Secret payload: per database key, credential objects per access type.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SecretBundle {
    pub databases: HashMap<String, Value>,
}

impl SecretBundle {
    fn credentials(&self, key: &str, access: AccessType) -> Option<&Value> {
        let slot = self.databases.get(key)?.get(access.slot_name())?;
        slot.is_object().then_some(slot)
    }
}

/// Memoizing credential fetcher over a [`SecretStore`]. The bundle is
/// fetched at most once per process (or per [`CredentialFetcher::reset`]).
pub struct CredentialFetcher {
    store: Arc<dyn SecretStore>,
    store_name: Option<String>,
    local: bool,
    bundle: Mutex<Option<Arc<SecretBundle>>>,
}

impl CredentialFetcher {
    pub fn new(store: Arc<dyn SecretStore>, env: &RuntimeEnv) -> Self {
        CredentialFetcher {
            store,
            store_name: env.databases_store_name(),
            local: env.is_local(),
            bundle: Mutex::new(None),
        }
    }

    /// Merge fetched credentials for `(key, access)` over `base`. Skipped
    /// outright in local environments and for configs that opt out with
    /// `skip_fetch_credentials`; in both cases `base` is returned unchanged
    /// and no secret-store call happens.
    pub async fn fetch(
        &self,
        key: &str,
        base: DatabaseConfig,
        access: AccessType,
    ) -> DatabaseConfig {
        if self.local || base.skip_fetch_credentials {
            return base;
        }

        let bundle = self.ensure_loaded().await;
        let Some(credentials) = bundle.credentials(key, access) else {
            return base;
        };

        let base_value = match serde_json::to_value(&base) {
            Ok(v) => v,
            Err(_) => return base,
        };
        match serde_json::from_value(merge_objects(&base_value, credentials)) {
            Ok(merged) => merged,
            Err(e) => {
                tracing::warn!(key, access = %access, error = %e, "fetched credentials do not fit the config shape; using base config");
                base
            }
        }
    }

    async fn ensure_loaded(&self) -> Arc<SecretBundle> {
        let mut slot = self.bundle.lock().await;
        if let Some(bundle) = slot.as_ref() {
            return Arc::clone(bundle);
        }
        let bundle = Arc::new(self.fetch_bundle().await);
        *slot = Some(Arc::clone(&bundle));
        bundle
    }

    async fn fetch_bundle(&self) -> SecretBundle {
        let Some(name) = self.store_name.as_deref() else {
            tracing::warn!("no service name configured; credential bundle left empty");
            return SecretBundle::default();
        };
        match self.store.fetch(name).await {
            Ok(raw) => match serde_json::from_value::<SecretBundle>(raw) {
                Ok(bundle) => bundle,
                Err(e) => {
                    tracing::warn!(store = name, error = %e, "credential bundle unparseable; left empty");
                    SecretBundle::default()
                }
            },
            Err(e) => {
                tracing::warn!(store = name, error = %e, "credential bundle fetch failed; left empty");
                SecretBundle::default()
            }
        }
    }

    /// Drop the memoized bundle; the next fetch loads again.
    pub async fn reset(&self) {
        *self.bundle.lock().await = None;
    }
}

/// Fixed secret store contents, for tests and offline development.
#[derive(Clone, Debug, Default)]
pub struct StaticSecretStore {
    by_name: HashMap<String, Value>,
}

impl StaticSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, name: &str, value: Value) -> Self {
        self.by_name.insert(name.to_string(), value);
        self
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn fetch(&self, name: &str) -> Result<Value, FetchError> {
        self.by_name
            .get(name)
            .cloned()
            .ok_or_else(|| FetchError(format!("secret '{}' not found", name)))
    }
}
