//! Model entity layer: delegates CRUD/aggregate operations to the driver
//! resolved by the dispatcher, adding audit fields, key remapping,
//! pagination defaults and write-audit logging around it.

use crate::config::AccessType;
use crate::dispatcher::Dispatcher;
use crate::driver::Driver;
use crate::error::ModelError;
use crate::fields::{remap_value_keys, strip_fields};
use crate::logs::{EventLogger, LogEvent, NullLogger};
use crate::session::Session;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Default page size applied to reads that specify none.
pub const DEFAULT_PAGE_SIZE: u64 = 500;

pub struct Model {
    dispatcher: Arc<Dispatcher>,
    logger: Arc<dyn EventLogger>,
    session: Option<Session>,
    database_key: String,
    table: String,
    /// Prefer the read replica for read operations. Writes always resolve
    /// with write intent regardless.
    use_read_db: bool,
    exclude_fields_in_log: Vec<String>,
    fields_remap: HashMap<String, String>,
}

impl Model {
    /// Model over `table`, resolving through the `default` database key.
    pub fn new(dispatcher: Arc<Dispatcher>, table: &str) -> Self {
        Model {
            dispatcher,
            logger: Arc::new(NullLogger),
            session: None,
            database_key: "default".to_string(),
            table: table.to_string(),
            use_read_db: false,
            exclude_fields_in_log: Vec::new(),
            fields_remap: HashMap::new(),
        }
    }

    pub fn with_database_key(mut self, key: &str) -> Self {
        self.database_key = key.to_string();
        self
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn EventLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn prefer_read_db(mut self) -> Self {
        self.use_read_db = true;
        self
    }

    pub fn exclude_fields_in_log(mut self, fields: &[&str]) -> Self {
        self.exclude_fields_in_log = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Map a logical field name to the storage name the driver expects.
    pub fn remap_field(mut self, logical: &str, storage: &str) -> Self {
        self.fields_remap
            .insert(logical.to_string(), storage.to_string());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Whether a dedicated read replica is configured for this model's key.
    pub async fn has_read_db(&self) -> Result<bool, ModelError> {
        Ok(self
            .dispatcher
            .has_read_db(&self.database_key, self.session.as_ref())
            .await?)
    }

    // ---- reads ----

    pub async fn get(&self, params: Value) -> Result<Vec<Value>, ModelError> {
        let driver = self.read_driver().await?;
        let params = self.prepare_read_params(&driver, params)?;
        Ok(driver.get(&self.table, params).await?)
    }

    pub async fn get_totals(&self, params: Value) -> Result<Value, ModelError> {
        let driver = self.read_driver().await?;
        let params = self.prepare_read_params(&driver, params)?;
        Ok(driver.get_totals(&self.table, params).await?)
    }

    /// Fetch all matching items page by page, invoking `each` per batch.
    /// Returns the total number of items seen.
    pub async fn get_paged<F>(&self, params: Value, mut each: F) -> Result<u64, ModelError>
    where
        F: FnMut(Vec<Value>),
    {
        let mut page: u64 = 1;
        let mut total: u64 = 0;
        loop {
            let mut page_params = params.clone();
            if !page_params.is_object() {
                page_params = json!({});
            }
            if let Some(obj) = page_params.as_object_mut() {
                obj.insert("page".into(), json!(page));
                obj.insert("limit".into(), json!(DEFAULT_PAGE_SIZE));
            }
            let batch = self.get(page_params).await?;
            let batch_len = batch.len() as u64;
            total += batch_len;
            if batch_len > 0 {
                each(batch);
            }
            if batch_len < DEFAULT_PAGE_SIZE {
                return Ok(total);
            }
            page += 1;
        }
    }

    pub async fn distinct(&self, field: &str, params: Value) -> Result<Vec<Value>, ModelError> {
        let driver = self.read_driver().await?;
        let params = self.prepare_read_params(&driver, params)?;
        Ok(driver.distinct(&self.table, field, params).await?)
    }

    pub async fn aggregate(&self, stages: Vec<Value>) -> Result<Vec<Value>, ModelError> {
        let driver = self.read_driver().await?;
        Ok(driver.aggregate(&self.table, stages).await?)
    }

    // ---- writes (always resolved with write intent) ----

    pub async fn insert(&self, mut item: Value) -> Result<Value, ModelError> {
        let driver = self.write_driver().await?;
        self.stamp_created(&mut item);
        remap_value_keys(&mut item, &self.fields_remap);
        let id = driver.insert(&self.table, item.clone()).await?;
        self.log("inserted", Some(id.clone()), item);
        Ok(id)
    }

    pub async fn save(&self, mut item: Value) -> Result<Value, ModelError> {
        let driver = self.write_driver().await?;
        if item.get("id").is_none() {
            self.stamp_created(&mut item);
        }
        self.stamp_modified(&mut item);
        remap_value_keys(&mut item, &self.fields_remap);
        let id = driver.save(&self.table, item.clone()).await?;
        self.log("saved", Some(id.clone()), item);
        Ok(id)
    }

    pub async fn update(&self, mut values: Value, mut filter: Value) -> Result<u64, ModelError> {
        let driver = self.write_driver().await?;
        self.validate_id_filter(&driver, &filter)?;
        self.stamp_modified(&mut values);
        remap_value_keys(&mut values, &self.fields_remap);
        remap_value_keys(&mut filter, &self.fields_remap);
        let modified = driver
            .update(&self.table, values.clone(), filter.clone())
            .await?;
        self.log("updated", None, json!({"values": values, "filter": filter}));
        Ok(modified)
    }

    pub async fn remove(&self, mut item: Value) -> Result<u64, ModelError> {
        let driver = self.write_driver().await?;
        self.validate_id_filter(&driver, &item)?;
        remap_value_keys(&mut item, &self.fields_remap);
        let removed = driver.remove(&self.table, item.clone()).await?;
        let id_key = self
            .fields_remap
            .get("id")
            .map(String::as_str)
            .unwrap_or("id");
        let entity_id = item.get(id_key).cloned();
        self.log("removed", entity_id, item);
        Ok(removed)
    }

    pub async fn multi_insert(&self, mut items: Vec<Value>) -> Result<bool, ModelError> {
        let driver = self.write_driver().await?;
        for item in items.iter_mut() {
            self.stamp_created(item);
            remap_value_keys(item, &self.fields_remap);
        }
        let ok = driver.multi_insert(&self.table, items.clone()).await?;
        self.log("inserted", None, Value::Array(items));
        Ok(ok)
    }

    pub async fn multi_save(&self, mut items: Vec<Value>) -> Result<bool, ModelError> {
        let driver = self.write_driver().await?;
        for item in items.iter_mut() {
            if item.get("id").is_none() {
                self.stamp_created(item);
            }
            self.stamp_modified(item);
            remap_value_keys(item, &self.fields_remap);
        }
        let ok = driver.multi_save(&self.table, items.clone()).await?;
        self.log("saved", None, Value::Array(items));
        Ok(ok)
    }

    pub async fn multi_remove(&self, mut filter: Value) -> Result<u64, ModelError> {
        let driver = self.write_driver().await?;
        self.validate_id_filter(&driver, &filter)?;
        remap_value_keys(&mut filter, &self.fields_remap);
        let removed = driver.multi_remove(&self.table, filter.clone()).await?;
        self.log("removed", None, filter);
        Ok(removed)
    }

    /// Apply a batch of `{ filter, values }` operations.
    pub async fn multi_update(&self, mut operations: Vec<Value>) -> Result<u64, ModelError> {
        let driver = self.write_driver().await?;
        for op in operations.iter_mut() {
            if let Some(values) = op.get_mut("values") {
                self.stamp_modified(values);
                remap_value_keys(values, &self.fields_remap);
            }
            if let Some(filter) = op.get_mut("filter") {
                remap_value_keys(filter, &self.fields_remap);
            }
        }
        let modified = driver.multi_update(&self.table, operations.clone()).await?;
        self.log("updated", None, Value::Array(operations));
        Ok(modified)
    }

    pub async fn increment(
        &self,
        mut filters: Value,
        quantities: Value,
    ) -> Result<Value, ModelError> {
        let driver = self.write_driver().await?;
        self.validate_id_filter(&driver, &filters)?;
        remap_value_keys(&mut filters, &self.fields_remap);
        let updated = driver
            .increment(&self.table, filters.clone(), quantities.clone())
            .await?;
        self.log(
            "incremented",
            None,
            json!({"filters": filters, "quantities": quantities}),
        );
        Ok(updated)
    }

    // ---- index management ----

    pub async fn get_indexes(&self) -> Result<Vec<Value>, ModelError> {
        let driver = self.write_driver().await?;
        Ok(driver.get_indexes(&self.table).await?)
    }

    pub async fn create_indexes(&self, indexes: Vec<Value>) -> Result<bool, ModelError> {
        let driver = self.write_driver().await?;
        Ok(driver.create_indexes(&self.table, indexes).await?)
    }

    pub async fn drop_indexes(&self, names: Vec<String>) -> Result<bool, ModelError> {
        let driver = self.write_driver().await?;
        Ok(driver.drop_indexes(&self.table, names).await?)
    }

    /// Drop the whole database this model resolves to. Resolves with admin
    /// intent so a dedicated admin slot is used when one is configured.
    pub async fn drop_database(&self) -> Result<bool, ModelError> {
        let driver = self
            .dispatcher
            .get_driver_for(&self.database_key, AccessType::Admin, self.session.as_ref())
            .await?;
        Ok(driver.drop_database().await?)
    }

    // ---- internals ----

    async fn read_driver(&self) -> Result<Arc<dyn Driver>, ModelError> {
        Ok(self
            .dispatcher
            .get_driver(&self.database_key, self.use_read_db, self.session.as_ref())
            .await?)
    }

    async fn write_driver(&self) -> Result<Arc<dyn Driver>, ModelError> {
        Ok(self
            .dispatcher
            .get_driver(&self.database_key, false, self.session.as_ref())
            .await?)
    }

    /// Apply pagination defaults, remap filter keys and validate id filters.
    fn prepare_read_params(
        &self,
        driver: &Arc<dyn Driver>,
        mut params: Value,
    ) -> Result<Value, ModelError> {
        if !params.is_object() {
            params = json!({});
        }
        if let Some(obj) = params.as_object_mut() {
            obj.entry("limit").or_insert(json!(DEFAULT_PAGE_SIZE));
            obj.entry("page").or_insert(json!(1));
            if let Some(filters) = obj.get_mut("filters") {
                self.validate_id_filter(driver, filters)?;
                remap_value_keys(filters, &self.fields_remap);
            }
        }
        Ok(params)
    }

    /// Check id-shaped filter values against the driver's id struct. Skipped
    /// in test environments and when no environment indicator is set.
    fn validate_id_filter(&self, driver: &Arc<dyn Driver>, filters: &Value) -> Result<(), ModelError> {
        if self.dispatcher.env().skip_id_validation() {
            return Ok(());
        }
        let Some(validator) = driver.id_struct() else {
            return Ok(());
        };
        let Some(id) = filters.get("id") else {
            return Ok(());
        };
        let ids: Vec<&Value> = match id {
            Value::Array(items) => items.iter().collect(),
            single => vec![single],
        };
        for id in ids {
            if !validator.validate(id) {
                return Err(ModelError::InvalidIdentifier(id.to_string()));
            }
        }
        Ok(())
    }

    fn stamp_created(&self, item: &mut Value) {
        if let Some(obj) = item.as_object_mut() {
            obj.insert("date_created".into(), json!(Utc::now().to_rfc3339()));
            if let Some(user) = self.user_id() {
                obj.insert("user_created".into(), json!(user));
            }
        }
    }

    fn stamp_modified(&self, item: &mut Value) {
        if let Some(obj) = item.as_object_mut() {
            obj.insert("date_modified".into(), json!(Utc::now().to_rfc3339()));
            if let Some(user) = self.user_id() {
                obj.insert("user_modified".into(), json!(user));
            }
        }
    }

    fn user_id(&self) -> Option<&str> {
        self.session.as_ref().and_then(|s| s.user_id.as_deref())
    }

    fn log(&self, event: &'static str, entity_id: Option<Value>, mut payload: Value) {
        strip_fields(&mut payload, &self.exclude_fields_in_log);
        if let Value::Array(items) = &mut payload {
            for item in items.iter_mut() {
                strip_fields(item, &self.exclude_fields_in_log);
            }
        }
        let mut entry = LogEvent::new(&self.table, event, payload).with_user(self.user_id());
        if let Some(id) = entity_id {
            entry = entry.with_entity_id(id);
        }
        self.logger.notify(entry);
    }
}
