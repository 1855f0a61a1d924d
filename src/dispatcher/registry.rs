//! Driver registry: maps a config `type` to a registered factory. The Rust
//! analog of convention-based driver module loading; a type with no factory
//! is "not installed".

use crate::config::DatabaseConfig;
use crate::driver::{Driver, DriverFactory};
use crate::error::DispatchError;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct DriverRegistry {
    factories: HashMap<String, Arc<dyn DriverFactory>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, driver_type: &str, factory: Arc<dyn DriverFactory>) -> Self {
        self.factories.insert(driver_type.to_string(), factory);
        self
    }

    /// Build a driver for a resolved config. Fails fast on a missing `type`,
    /// then on an unregistered type, then on a factory failure, each with
    /// its own error kind.
    pub async fn instantiate(
        &self,
        config: &DatabaseConfig,
    ) -> Result<Arc<dyn Driver>, DispatchError> {
        let driver_type = config
            .driver_type
            .as_deref()
            .ok_or(DispatchError::MissingType)?;

        let factory =
            self.factories
                .get(driver_type)
                .ok_or_else(|| DispatchError::DbDriverNotInstalled {
                    driver: driver_type.to_string(),
                    source_message: format!(
                        "no factory registered for driver type '{}'",
                        driver_type
                    ),
                })?;

        factory
            .create(config)
            .await
            .map_err(|e| DispatchError::InvalidDbDriver {
                driver: driver_type.to_string(),
                source_message: e.to_string(),
            })
    }
}
