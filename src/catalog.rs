//! Remote parameter store client: lazily fetches and memoizes the service's
//! database catalog. Fetch failures are soft misses; callers see an empty
//! catalog and fall through to the next resolution source.

use crate::config::merge_objects;
use crate::env::RuntimeEnv;
use crate::error::FetchError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Remote parameter store: returns the raw JSON value stored under a
/// well-known name (`<service-name>-databases`).
#[async_trait]
pub trait ParameterStore: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<Value, FetchError>;
}

/// Catalog payload: logical core keys mapped to catalog refs, and catalog
/// entry ids mapped to connection templates.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Catalog {
    pub core_databases: HashMap<String, Value>,
    pub databases: HashMap<String, Value>,
}

/// Memoizing client over a [`ParameterStore`]. The catalog is fetched at
/// most once per process (or per [`CatalogClient::reset`]); the mutex is
/// held across the fetch so concurrent callers share one in-flight request.
pub struct CatalogClient {
    store: Arc<dyn ParameterStore>,
    store_name: Option<String>,
    catalog: Mutex<Option<Arc<Catalog>>>,
}

impl CatalogClient {
    pub fn new(store: Arc<dyn ParameterStore>, env: &RuntimeEnv) -> Self {
        CatalogClient {
            store,
            store_name: env.databases_store_name(),
            catalog: Mutex::new(None),
        }
    }

    /// Load the catalog if not yet loaded. Idempotent; never fails. A fetch
    /// or parse failure leaves an empty catalog in place so it is not
    /// retried per call.
    pub async fn ensure_loaded(&self) -> Arc<Catalog> {
        let mut slot = self.catalog.lock().await;
        if let Some(catalog) = slot.as_ref() {
            return Arc::clone(catalog);
        }
        let catalog = Arc::new(self.fetch_catalog().await);
        *slot = Some(Arc::clone(&catalog));
        catalog
    }

    async fn fetch_catalog(&self) -> Catalog {
        let Some(name) = self.store_name.as_deref() else {
            tracing::warn!("no service name configured; database catalog left empty");
            return Catalog::default();
        };
        match self.store.fetch(name).await {
            Ok(raw) => match serde_json::from_value::<Catalog>(raw) {
                Ok(catalog) => {
                    tracing::debug!(
                        store = name,
                        core = catalog.core_databases.len(),
                        entries = catalog.databases.len(),
                        "database catalog loaded"
                    );
                    catalog
                }
                Err(e) => {
                    tracing::warn!(store = name, error = %e, "database catalog unparseable; left empty");
                    Catalog::default()
                }
            },
            Err(e) => {
                tracing::warn!(store = name, error = %e, "database catalog fetch failed; left empty");
                Catalog::default()
            }
        }
    }

    /// Catalog ref (`{ id, ...overrides }`) for a core database key.
    pub async fn core_database(&self, key: &str) -> Option<Value> {
        self.ensure_loaded().await.core_databases.get(key).cloned()
    }

    /// Resolve a catalog ref to a merged connection config object: the
    /// template stored under the ref's `id`, with the ref's remaining fields
    /// merged over it. An unknown id is a logged soft miss.
    pub async fn database_config(&self, reference: &Value) -> Option<Value> {
        let id = reference.get("id").and_then(Value::as_str)?;
        let catalog = self.ensure_loaded().await;
        let Some(template) = catalog.databases.get(id) else {
            tracing::warn!(id, "catalog entry not found for database reference");
            return None;
        };
        let mut overrides = reference.as_object().cloned().unwrap_or_default();
        overrides.remove("id");
        Some(merge_objects(template, &Value::Object(overrides)))
    }

    /// Drop the memoized catalog; the next call fetches again.
    pub async fn reset(&self) {
        *self.catalog.lock().await = None;
    }
}

/// Fixed parameter store contents, for tests and offline development.
#[derive(Clone, Debug, Default)]
pub struct StaticParameterStore {
    by_name: HashMap<String, Value>,
}

impl StaticParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameter(mut self, name: &str, value: Value) -> Self {
        self.by_name.insert(name.to_string(), value);
        self
    }
}

#[async_trait]
impl ParameterStore for StaticParameterStore {
    async fn fetch(&self, name: &str) -> Result<Value, FetchError> {
        self.by_name
            .get(name)
            .cloned()
            .ok_or_else(|| FetchError(format!("parameter '{}' not found", name)))
    }
}
