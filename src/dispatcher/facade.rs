//! Dispatcher: the entity layer's single entry point for obtaining a ready
//! driver instance. Owns the driver cache and the memoized remote-source
//! clients; all state is held by the instance, not in module statics, so
//! tests and multi-tenant hosts can run isolated dispatchers.

use crate::catalog::{CatalogClient, ParameterStore};
use crate::config::resolver::ConfigResolver;
use crate::config::settings::SettingsSource;
use crate::config::types::AccessType;
use crate::dispatcher::cache::DriverCache;
use crate::dispatcher::registry::DriverRegistry;
use crate::driver::Driver;
use crate::env::RuntimeEnv;
use crate::error::DispatchError;
use crate::secrets::{CredentialFetcher, SecretStore};
use crate::session::{ClientSource, Session};
use std::sync::Arc;

pub struct Dispatcher {
    env: RuntimeEnv,
    catalog: Arc<CatalogClient>,
    credentials: Arc<CredentialFetcher>,
    resolver: ConfigResolver,
    registry: DriverRegistry,
    cache: DriverCache,
}

impl Dispatcher {
    pub fn new(
        env: RuntimeEnv,
        parameter_store: Arc<dyn ParameterStore>,
        secret_store: Arc<dyn SecretStore>,
        settings: Arc<dyn SettingsSource>,
        clients: Arc<dyn ClientSource>,
        registry: DriverRegistry,
    ) -> Self {
        let catalog = Arc::new(CatalogClient::new(parameter_store, &env));
        let credentials = Arc::new(CredentialFetcher::new(secret_store, &env));
        let resolver = ConfigResolver::new(
            Arc::clone(&catalog),
            Arc::clone(&credentials),
            settings,
            clients,
        );
        Dispatcher {
            env,
            catalog,
            credentials,
            resolver,
            registry,
            cache: DriverCache::new(),
        }
    }

    pub fn env(&self) -> &RuntimeEnv {
        &self.env
    }

    /// Resolve and return the driver for `(key, use_read_db)`, reusing the
    /// cached instance when the resolved config has been seen before.
    pub async fn get_driver(
        &self,
        key: &str,
        use_read_db: bool,
        session: Option<&Session>,
    ) -> Result<Arc<dyn Driver>, DispatchError> {
        self.get_driver_for(key, AccessType::from_read_flag(use_read_db), session)
            .await
    }

    /// Access-typed variant; admin operations resolve with
    /// [`AccessType::Admin`].
    pub async fn get_driver_for(
        &self,
        key: &str,
        access: AccessType,
        session: Option<&Session>,
    ) -> Result<Arc<dyn Driver>, DispatchError> {
        self.catalog.ensure_loaded().await;
        let config = self.resolver.resolve(key, access, session).await?;
        self.cache
            .get_or_create(&config, key, access, || self.registry.instantiate(&config))
            .await
    }

    /// Whether the source that would resolve `key` defines a dedicated read
    /// replica slot. Never instantiates a driver.
    pub async fn has_read_db(
        &self,
        key: &str,
        session: Option<&Session>,
    ) -> Result<bool, DispatchError> {
        self.resolver.has_read_slot(key, session).await
    }

    /// Drop every cached driver and the memoized catalog and credential
    /// bundle. Used between test cases and on tenant-config reloads.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
        self.catalog.reset().await;
        self.credentials.reset().await;
    }
}
