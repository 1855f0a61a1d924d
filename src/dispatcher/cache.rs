//! Driver-instance cache keyed by canonical config plus disambiguators.
//! One live driver per distinct resolved configuration so driver-level state
//! (connection pools) is reused; never evicted, only explicitly cleared.

use crate::config::{AccessType, DatabaseConfig};
use crate::driver::Driver;
use crate::error::DispatchError;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Default)]
pub struct DriverCache {
    entries: Mutex<HashMap<String, Arc<dyn Driver>>>,
}

impl DriverCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached driver for this config, creating and storing it on
    /// first use. The lock is held across check-then-create so concurrent
    /// callers cannot instantiate the same config twice.
    pub async fn get_or_create<F, Fut>(
        &self,
        config: &DatabaseConfig,
        database_key: &str,
        access: AccessType,
        create: F,
    ) -> Result<Arc<dyn Driver>, DispatchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn Driver>, DispatchError>>,
    {
        let cache_key = cache_key(config, database_key, access);
        let mut entries = self.entries.lock().await;
        if let Some(driver) = entries.get(&cache_key) {
            return Ok(Arc::clone(driver));
        }
        let driver = create().await?;
        tracing::debug!(key = database_key, access = %access, "driver instantiated and cached");
        entries.insert(cache_key, Arc::clone(&driver));
        Ok(driver)
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

/// Cache key: database key and access type disambiguate configs that
/// serialize identically but target different logical databases or intents.
fn cache_key(config: &DatabaseConfig, database_key: &str, access: AccessType) -> String {
    format!("{}|{}|{}", database_key, access, config.canonical())
}
