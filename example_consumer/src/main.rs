//! Example consumer: a separate Rust project that uses datalayer-sdk as a
//! dependency, registering a minimal Postgres driver that stores items as
//! JSONB payloads.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Or from this directory: `cargo run`

use async_trait::async_trait;
use datalayer_sdk::{
    DatabaseConfig, Dispatcher, Driver, DriverError, DriverFactory, DriverRegistry, Model,
    RuntimeEnv, Session, StaticClients, StaticParameterStore, StaticSecretStore, StaticSettings,
};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

struct PostgresJsonDriver {
    pool: PgPool,
}

impl PostgresJsonDriver {
    async fn connect(config: &DatabaseConfig) -> Result<Self, DriverError> {
        let url = config
            .connection_string
            .clone()
            .ok_or_else(|| DriverError::Operation("postgres driver requires connection_string".into()))?;
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(|e| DriverError::Operation(e.to_string()))?;
        Ok(PostgresJsonDriver { pool })
    }

    async fn ensure_table(&self, table: &str) -> Result<(), DriverError> {
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                payload JSONB NOT NULL
            )
            "#,
            table
        );
        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .map_err(|e| DriverError::Operation(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl Driver for PostgresJsonDriver {
    async fn get(&self, table: &str, params: Value) -> Result<Vec<Value>, DriverError> {
        self.ensure_table(table).await?;
        let limit = params.get("limit").and_then(Value::as_u64).unwrap_or(500);
        let sql = format!("SELECT payload FROM {} LIMIT {}", table, limit);
        sqlx::query_scalar::<_, Value>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DriverError::Operation(e.to_string()))
    }

    async fn insert(&self, table: &str, item: Value) -> Result<Value, DriverError> {
        self.ensure_table(table).await?;
        let sql = format!("INSERT INTO {} (payload) VALUES ($1) RETURNING id::text", table);
        let id: String = sqlx::query_scalar(&sql)
            .bind(item)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DriverError::Operation(e.to_string()))?;
        Ok(Value::String(id))
    }

    async fn multi_remove(&self, table: &str, _filter: Value) -> Result<u64, DriverError> {
        self.ensure_table(table).await?;
        let sql = format!("DELETE FROM {}", table);
        let result = sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| DriverError::Operation(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

struct PostgresJsonFactory;

#[async_trait]
impl DriverFactory for PostgresJsonFactory {
    async fn create(&self, config: &DatabaseConfig) -> Result<Arc<dyn Driver>, DriverError> {
        Ok(Arc::new(PostgresJsonDriver::connect(config).await?))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("datalayer_sdk=debug,example_consumer=info")),
        )
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/datalayer".into());

    let settings = StaticSettings::new(json!({
        "default": {
            "write": {"type": "postgres", "connectionString": database_url}
        }
    }));
    let registry = DriverRegistry::new().register("postgres", Arc::new(PostgresJsonFactory));
    let dispatcher = Arc::new(Dispatcher::new(
        RuntimeEnv::new(Some("example"), Some("local")),
        Arc::new(StaticParameterStore::new()),
        Arc::new(StaticSecretStore::new()),
        Arc::new(settings),
        Arc::new(StaticClients::new()),
        registry,
    ));

    let notes = Model::new(dispatcher, "notes").with_session(Session::default().with_user("demo"));

    let id = notes.insert(json!({"title": "hello", "body": "first note"})).await?;
    tracing::info!(%id, "note inserted");

    let rows = notes.get(json!({})).await?;
    tracing::info!(count = rows.len(), "notes fetched");
    for row in &rows {
        tracing::info!(note = %row, "note");
    }

    let removed = notes.multi_remove(json!({})).await?;
    tracing::info!(removed, "notes cleaned up");
    Ok(())
}
