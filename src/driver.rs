//! Driver capability interface. Concrete drivers live outside this crate and
//! implement whatever subset of operations their backend supports; every
//! method defaults to `DriverError::Unsupported` so missing capabilities are
//! detected at the call site and surfaced by the entity layer.

use crate::config::DatabaseConfig;
use crate::error::DriverError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Identifier validator exposed by drivers that constrain id formats (e.g.
/// object-id strings). The Model consults it before building id filters.
pub trait IdValidator: Send + Sync {
    fn validate(&self, id: &Value) -> bool;
}

/// Capability-checked database driver.
///
/// `table` is the entity's collection/table name. Items, filters and params
/// stay JSON objects at this boundary; shaping them is the entity layer's
/// job, interpreting them is the driver's.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn get(&self, _table: &str, _params: Value) -> Result<Vec<Value>, DriverError> {
        Err(DriverError::Unsupported("get"))
    }

    async fn get_totals(&self, _table: &str, _params: Value) -> Result<Value, DriverError> {
        Err(DriverError::Unsupported("getTotals"))
    }

    /// Insert one item; returns the stored item's id.
    async fn insert(&self, _table: &str, _item: Value) -> Result<Value, DriverError> {
        Err(DriverError::Unsupported("insert"))
    }

    /// Upsert one item; returns the stored item's id.
    async fn save(&self, _table: &str, _item: Value) -> Result<Value, DriverError> {
        Err(DriverError::Unsupported("save"))
    }

    /// Update matching items; returns the modified count.
    async fn update(&self, _table: &str, _values: Value, _filter: Value) -> Result<u64, DriverError> {
        Err(DriverError::Unsupported("update"))
    }

    /// Remove one item; returns the removed count.
    async fn remove(&self, _table: &str, _item: Value) -> Result<u64, DriverError> {
        Err(DriverError::Unsupported("remove"))
    }

    async fn multi_insert(&self, _table: &str, _items: Vec<Value>) -> Result<bool, DriverError> {
        Err(DriverError::Unsupported("multiInsert"))
    }

    async fn multi_save(&self, _table: &str, _items: Vec<Value>) -> Result<bool, DriverError> {
        Err(DriverError::Unsupported("multiSave"))
    }

    /// Remove matching items; returns the removed count.
    async fn multi_remove(&self, _table: &str, _filter: Value) -> Result<u64, DriverError> {
        Err(DriverError::Unsupported("multiRemove"))
    }

    /// Apply `{ filter, values }` operations; returns the modified count.
    async fn multi_update(&self, _table: &str, _operations: Vec<Value>) -> Result<u64, DriverError> {
        Err(DriverError::Unsupported("multiUpdate"))
    }

    /// Atomically add the quantities to one matching item; returns the
    /// updated item.
    async fn increment(
        &self,
        _table: &str,
        _filters: Value,
        _quantities: Value,
    ) -> Result<Value, DriverError> {
        Err(DriverError::Unsupported("increment"))
    }

    async fn distinct(&self, _table: &str, _field: &str, _params: Value) -> Result<Vec<Value>, DriverError> {
        Err(DriverError::Unsupported("distinct"))
    }

    async fn get_indexes(&self, _table: &str) -> Result<Vec<Value>, DriverError> {
        Err(DriverError::Unsupported("getIndexes"))
    }

    async fn create_indexes(&self, _table: &str, _indexes: Vec<Value>) -> Result<bool, DriverError> {
        Err(DriverError::Unsupported("createIndexes"))
    }

    async fn drop_indexes(&self, _table: &str, _names: Vec<String>) -> Result<bool, DriverError> {
        Err(DriverError::Unsupported("dropIndexes"))
    }

    async fn drop_database(&self) -> Result<bool, DriverError> {
        Err(DriverError::Unsupported("dropDatabase"))
    }

    async fn aggregate(&self, _table: &str, _stages: Vec<Value>) -> Result<Vec<Value>, DriverError> {
        Err(DriverError::Unsupported("aggregate"))
    }

    /// Identifier validator, when the backend constrains id formats.
    fn id_struct(&self) -> Option<Arc<dyn IdValidator>> {
        None
    }
}

impl std::fmt::Debug for dyn Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Driver")
    }
}

/// Constructs driver instances from resolved configs. Registered in the
/// [`DriverRegistry`](crate::dispatcher::DriverRegistry) under the config
/// `type` name.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn create(&self, config: &DatabaseConfig) -> Result<Arc<dyn Driver>, DriverError>;
}
