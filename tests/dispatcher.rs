//! End-to-end resolution, caching and entity-layer behavior over fake
//! drivers and static remote stores.

use async_trait::async_trait;
use datalayer_sdk::{
    DatabaseConfig, Dispatcher, DispatchError, Driver, DriverError, DriverFactory, DriverRegistry,
    FetchError, IdValidator, MemoryLogger, Model, ParameterStore, RuntimeEnv, SecretStore, Session,
    StaticClients, StaticParameterStore, StaticSettings,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct FakeDriver {
    host: Option<String>,
    inserted: Arc<Mutex<Vec<Value>>>,
}

#[async_trait]
impl Driver for FakeDriver {
    async fn get(&self, _table: &str, _params: Value) -> Result<Vec<Value>, DriverError> {
        Ok(vec![json!({"served_by": self.host})])
    }

    async fn insert(&self, _table: &str, item: Value) -> Result<Value, DriverError> {
        self.inserted.lock().unwrap().push(item);
        Ok(json!("id-1"))
    }

    async fn update(&self, _table: &str, _values: Value, _filter: Value) -> Result<u64, DriverError> {
        Ok(1)
    }

    async fn drop_database(&self) -> Result<bool, DriverError> {
        Ok(true)
    }

    fn id_struct(&self) -> Option<Arc<dyn IdValidator>> {
        Some(Arc::new(StringIds))
    }
}

/// Backend that only accepts string identifiers.
struct StringIds;

impl IdValidator for StringIds {
    fn validate(&self, id: &Value) -> bool {
        id.is_string()
    }
}

#[derive(Default)]
struct RecordingFactory {
    created: Mutex<Vec<DatabaseConfig>>,
    inserted: Arc<Mutex<Vec<Value>>>,
}

impl RecordingFactory {
    fn created(&self) -> Vec<DatabaseConfig> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl DriverFactory for RecordingFactory {
    async fn create(&self, config: &DatabaseConfig) -> Result<Arc<dyn Driver>, DriverError> {
        self.created.lock().unwrap().push(config.clone());
        Ok(Arc::new(FakeDriver {
            host: config.host.clone(),
            inserted: Arc::clone(&self.inserted),
        }))
    }
}

struct FailingParameterStore;

#[async_trait]
impl ParameterStore for FailingParameterStore {
    async fn fetch(&self, _name: &str) -> Result<Value, FetchError> {
        Err(FetchError("parameter store unreachable".into()))
    }
}

struct CountingSecretStore {
    calls: AtomicUsize,
    bundle: Value,
}

#[async_trait]
impl SecretStore for CountingSecretStore {
    async fn fetch(&self, _name: &str) -> Result<Value, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.bundle.clone())
    }
}

struct Harness {
    dispatcher: Arc<Dispatcher>,
    factory: Arc<RecordingFactory>,
    secrets: Arc<CountingSecretStore>,
}

fn harness(
    env: RuntimeEnv,
    parameter_store: Arc<dyn ParameterStore>,
    settings: StaticSettings,
    clients: StaticClients,
    secret_bundle: Value,
) -> Harness {
    let factory = Arc::new(RecordingFactory::default());
    let secrets = Arc::new(CountingSecretStore {
        calls: AtomicUsize::new(0),
        bundle: secret_bundle,
    });
    let registry = DriverRegistry::new()
        .register("x", factory.clone() as Arc<dyn DriverFactory>)
        .register("m", factory.clone() as Arc<dyn DriverFactory>)
        .register("catalog-driver", factory.clone() as Arc<dyn DriverFactory>);
    let dispatcher = Arc::new(Dispatcher::new(
        env,
        parameter_store,
        secrets.clone(),
        Arc::new(settings),
        Arc::new(clients),
        registry,
    ));
    Harness {
        dispatcher,
        factory,
        secrets,
    }
}

fn test_env() -> RuntimeEnv {
    RuntimeEnv::new(Some("orders"), Some("test"))
}

fn empty_catalog() -> Arc<dyn ParameterStore> {
    Arc::new(StaticParameterStore::new())
}

// --- Scenario A: local settings resolve and instantiate once ---

#[tokio::test]
async fn settings_resolve_and_instantiate_once() {
    let h = harness(
        test_env(),
        empty_catalog(),
        StaticSettings::new(json!({"core": {"write": {"type": "x", "host": "h"}}})),
        StaticClients::new(),
        json!({}),
    );

    let driver = h.dispatcher.get_driver("core", false, None).await.unwrap();
    assert_eq!(driver.get("t", json!({})).await.unwrap().len(), 1);

    let created = h.factory.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].driver_type.as_deref(), Some("x"));
    assert_eq!(created[0].host.as_deref(), Some("h"));
}

// --- P1: core catalog wins over legacy settings ---

#[tokio::test]
async fn catalog_config_wins_over_legacy_settings() {
    let store = Arc::new(StaticParameterStore::new().with_parameter(
        "orders-databases",
        json!({
            "coreDatabases": {"core": {"id": "abc"}},
            "databases": {"abc": {"type": "catalog-driver", "connectionString": "c"}}
        }),
    ));
    let h = harness(
        test_env(),
        store,
        StaticSettings::new(json!({"core": {"write": {"type": "x", "host": "legacy"}}})),
        StaticClients::new(),
        json!({}),
    );

    h.dispatcher.get_driver("core", false, None).await.unwrap();
    let created = h.factory.created();
    assert_eq!(created[0].driver_type.as_deref(), Some("catalog-driver"));
    assert_eq!(created[0].connection_string.as_deref(), Some("c"));
}

// --- Scenario C: catalog template merged with core ref overrides ---

#[tokio::test]
async fn catalog_template_merges_ref_overrides() {
    let store = Arc::new(StaticParameterStore::new().with_parameter(
        "orders-databases",
        json!({
            "coreDatabases": {"core": {"id": "abc", "database": "svc-core"}},
            "databases": {"abc": {"type": "m", "connectionString": "c"}}
        }),
    ));
    let h = harness(
        test_env(),
        store,
        StaticSettings::empty(),
        StaticClients::new(),
        json!({}),
    );

    h.dispatcher.get_driver("core", false, None).await.unwrap();
    let created = h.factory.created();
    assert_eq!(created[0].driver_type.as_deref(), Some("m"));
    assert_eq!(created[0].connection_string.as_deref(), Some("c"));
    assert_eq!(created[0].database.as_deref(), Some("svc-core"));
}

// --- P2: read selection falls back to write when no read slot exists ---

#[tokio::test]
async fn read_request_falls_back_to_write_config() {
    let h = harness(
        test_env(),
        empty_catalog(),
        StaticSettings::new(json!({"core": {"write": {"type": "x", "host": "h"}}})),
        StaticClients::new(),
        json!({}),
    );

    h.dispatcher.get_driver("core", true, None).await.unwrap();
    h.dispatcher.get_driver("core", false, None).await.unwrap();
    let created = h.factory.created();
    assert_eq!(created.len(), 2);
    assert_eq!(created[0], created[1]);
}

// --- P3: cache identity ---

#[tokio::test]
async fn identical_resolution_returns_same_instance() {
    let h = harness(
        test_env(),
        empty_catalog(),
        StaticSettings::new(json!({"core": {"write": {"type": "x", "host": "h"}}})),
        StaticClients::new(),
        json!({}),
    );

    let a = h.dispatcher.get_driver("core", false, None).await.unwrap();
    let b = h.dispatcher.get_driver("core", false, None).await.unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(h.factory.created().len(), 1);
}

// --- P4: differing read/write configs yield distinct instances ---

#[tokio::test]
async fn read_and_write_configs_get_distinct_instances() {
    let h = harness(
        test_env(),
        empty_catalog(),
        StaticSettings::new(json!({"core": {
            "write": {"type": "x", "host": "w"},
            "read": {"type": "x", "host": "r"}
        }})),
        StaticClients::new(),
        json!({}),
    );

    let read = h.dispatcher.get_driver("core", true, None).await.unwrap();
    let write = h.dispatcher.get_driver("core", false, None).await.unwrap();
    assert!(!Arc::ptr_eq(&read, &write));
    assert_eq!(h.factory.created().len(), 2);
}

// --- P5 / Scenario D: parameter store failure is a soft miss ---

#[tokio::test]
async fn parameter_store_failure_still_resolves_settings() {
    let h = harness(
        test_env(),
        Arc::new(FailingParameterStore),
        StaticSettings::new(json!({"core": {"write": {"type": "x", "host": "h"}}})),
        StaticClients::new(),
        json!({}),
    );

    let driver = h.dispatcher.get_driver("core", false, None).await;
    assert!(driver.is_ok());
}

// --- P6: credential gating ---

#[tokio::test]
async fn local_environment_skips_credential_fetch() {
    let h = harness(
        RuntimeEnv::new(Some("orders"), Some("local")),
        empty_catalog(),
        StaticSettings::new(json!({"core": {"write": {"type": "x", "host": "h"}}})),
        StaticClients::new(),
        json!({"databases": {"core": {"write": {"password": "pw"}}}}),
    );

    h.dispatcher.get_driver("core", false, None).await.unwrap();
    assert_eq!(h.secrets.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.factory.created()[0].password, None);
}

#[tokio::test]
async fn skip_fetch_credentials_config_skips_fetch() {
    let h = harness(
        RuntimeEnv::new(Some("orders"), Some("prod")),
        empty_catalog(),
        StaticSettings::new(json!({"core": {"write": {
            "type": "x", "host": "h", "skip_fetch_credentials": true
        }}})),
        StaticClients::new(),
        json!({"databases": {"core": {"write": {"password": "pw"}}}}),
    );

    h.dispatcher.get_driver("core", false, None).await.unwrap();
    assert_eq!(h.secrets.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.factory.created()[0].password, None);
}

#[tokio::test]
async fn credentials_merge_in_remote_environments() {
    let h = harness(
        RuntimeEnv::new(Some("orders"), Some("prod")),
        empty_catalog(),
        StaticSettings::new(json!({"core": {"write": {"type": "x", "host": "h"}}})),
        StaticClients::new(),
        json!({"databases": {"core": {"write": {"user": "writer", "password": "pw"}}}}),
    );

    h.dispatcher.get_driver("core", false, None).await.unwrap();
    assert_eq!(h.secrets.calls.load(Ordering::SeqCst), 1);
    let created = h.factory.created();
    assert_eq!(created[0].user.as_deref(), Some("writer"));
    assert_eq!(created[0].password.as_deref(), Some("pw"));
}

// --- P7: malformed settings ---

#[tokio::test]
async fn malformed_settings_fail_and_missing_key_is_not_found() {
    let h = harness(
        test_env(),
        empty_catalog(),
        StaticSettings::new(json!(["not", "an", "object"])),
        StaticClients::new(),
        json!({}),
    );
    let err = h.dispatcher.get_driver("core", false, None).await.unwrap_err();
    assert!(matches!(err, DispatchError::InvalidSettings { .. }));
    assert_eq!(err.code(), 1);

    let h = harness(
        test_env(),
        empty_catalog(),
        StaticSettings::empty(),
        StaticClients::new(),
        json!({}),
    );
    let err = h.dispatcher.get_driver("core", false, None).await.unwrap_err();
    assert!(matches!(err, DispatchError::DbConfigNotFound { .. }));
    assert_eq!(err.code(), 2);
}

// --- Scenario E: unknown driver type ---

#[tokio::test]
async fn unknown_driver_type_is_not_installed() {
    let h = harness(
        test_env(),
        empty_catalog(),
        StaticSettings::new(json!({"core": {"write": {"type": "unknown-driver"}}})),
        StaticClients::new(),
        json!({}),
    );

    let err = h.dispatcher.get_driver("core", false, None).await.unwrap_err();
    match err {
        DispatchError::DbDriverNotInstalled { driver, .. } => assert_eq!(driver, "unknown-driver"),
        other => panic!("unexpected error: {other}"),
    }
}

// --- Scenario B: model reads prefer the replica, writes re-resolve ---

#[tokio::test]
async fn model_write_bypasses_read_preference() {
    let h = harness(
        test_env(),
        empty_catalog(),
        StaticSettings::empty(),
        StaticClients::new().with_client(
            "acme",
            json!({"databases": {"default": {
                "write": {"type": "x", "host": "w"},
                "read": {"type": "x", "host": "r"}
            }}}),
        ),
        json!({}),
    );

    let model = Model::new(h.dispatcher.clone(), "orders")
        .with_session(Session::for_client("acme"))
        .prefer_read_db();

    let rows = model.get(json!({})).await.unwrap();
    assert_eq!(rows[0]["served_by"], json!("r"));

    model.insert(json!({"status": "new"})).await.unwrap();

    let created = h.factory.created();
    assert_eq!(created.len(), 2);
    assert_eq!(created[0].host.as_deref(), Some("r"));
    assert_eq!(created[1].host.as_deref(), Some("w"));
}

// --- admin access resolves the admin slot for drop_database ---

#[tokio::test]
async fn drop_database_uses_admin_slot() {
    let h = harness(
        test_env(),
        empty_catalog(),
        StaticSettings::new(json!({"default": {
            "write": {"type": "x", "host": "w"},
            "admin": {"type": "x", "host": "w", "user": "root"}
        }})),
        StaticClients::new(),
        json!({}),
    );

    let model = Model::new(h.dispatcher.clone(), "orders");
    assert!(model.drop_database().await.unwrap());
    assert_eq!(h.factory.created()[0].user.as_deref(), Some("root"));
}

// --- has_read_db never instantiates ---

#[tokio::test]
async fn has_read_db_reports_without_instantiation() {
    let h = harness(
        test_env(),
        empty_catalog(),
        StaticSettings::new(json!({
            "with_read": {"write": {"type": "x"}, "read": {"type": "x"}},
            "write_only": {"write": {"type": "x"}}
        })),
        StaticClients::new(),
        json!({}),
    );

    assert!(h.dispatcher.has_read_db("with_read", None).await.unwrap());
    assert!(!h.dispatcher.has_read_db("write_only", None).await.unwrap());
    assert!(h.factory.created().is_empty());
}

// --- clear_cache forces re-resolution and re-instantiation ---

#[tokio::test]
async fn clear_cache_drops_driver_instances() {
    let h = harness(
        test_env(),
        empty_catalog(),
        StaticSettings::new(json!({"core": {"write": {"type": "x", "host": "h"}}})),
        StaticClients::new(),
        json!({}),
    );

    let before = h.dispatcher.get_driver("core", false, None).await.unwrap();
    h.dispatcher.clear_cache().await;
    let after = h.dispatcher.get_driver("core", false, None).await.unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(h.factory.created().len(), 2);
}

// --- entity layer: audit stamps and log field exclusion ---

#[tokio::test]
async fn insert_stamps_audit_fields_and_strips_logged_secrets() {
    let h = harness(
        test_env(),
        empty_catalog(),
        StaticSettings::new(json!({"default": {"write": {"type": "x", "host": "h"}}})),
        StaticClients::new(),
        json!({}),
    );

    let logger = Arc::new(MemoryLogger::new());
    let model = Model::new(h.dispatcher.clone(), "users")
        .with_session(Session::default().with_user("u-1"))
        .with_logger(logger.clone())
        .exclude_fields_in_log(&["password"]);

    model
        .insert(json!({"name": "ana", "password": "secret"}))
        .await
        .unwrap();

    let stored = h.factory.inserted.lock().unwrap().clone();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].get("date_created").is_some());
    assert_eq!(stored[0]["user_created"], json!("u-1"));

    let events = logger.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, "inserted");
    assert_eq!(events[0].entity, "users");
    assert_eq!(events[0].user_created.as_deref(), Some("u-1"));
    assert!(events[0].log.get("password").is_none());
    assert_eq!(events[0].log["name"], json!("ana"));
}

// --- id-struct validation is env-gated ---

#[tokio::test]
async fn id_validation_runs_outside_test_environments() {
    let settings = StaticSettings::new(json!({"default": {"write": {"type": "x", "host": "h"}}}));

    let strict = harness(
        RuntimeEnv::new(Some("orders"), Some("prod")),
        empty_catalog(),
        settings.clone(),
        StaticClients::new(),
        json!({}),
    );
    let model = Model::new(strict.dispatcher.clone(), "orders");
    let err = model
        .get(json!({"filters": {"id": 123}}))
        .await
        .unwrap_err();
    assert!(matches!(err, datalayer_sdk::ModelError::InvalidIdentifier(_)));

    let relaxed = harness(
        test_env(),
        empty_catalog(),
        settings,
        StaticClients::new(),
        json!({}),
    );
    let model = Model::new(relaxed.dispatcher.clone(), "orders");
    assert!(model.get(json!({"filters": {"id": 123}})).await.is_ok());
}

// --- key remapping applies to writes and filters ---

#[tokio::test]
async fn field_remap_renames_keys_for_the_driver() {
    let h = harness(
        test_env(),
        empty_catalog(),
        StaticSettings::new(json!({"default": {"write": {"type": "x", "host": "h"}}})),
        StaticClients::new(),
        json!({}),
    );

    let model = Model::new(h.dispatcher.clone(), "orders").remap_field("id", "_id");
    model.insert(json!({"id": "o-1", "status": "new"})).await.unwrap();

    let stored = h.factory.inserted.lock().unwrap().clone();
    assert!(stored[0].get("_id").is_some());
    assert!(stored[0].get("id").is_none());
}

// --- unimplemented driver capability surfaces as not-implemented ---

#[tokio::test]
async fn missing_capability_is_reported_by_name() {
    let h = harness(
        test_env(),
        empty_catalog(),
        StaticSettings::new(json!({"default": {"write": {"type": "x", "host": "h"}}})),
        StaticClients::new(),
        json!({}),
    );

    let model = Model::new(h.dispatcher.clone(), "orders");
    let err = model.aggregate(vec![json!({"$match": {}})]).await.unwrap_err();
    assert!(matches!(
        err,
        datalayer_sdk::ModelError::DriverMethodNotImplemented("aggregate")
    ));
}
