//! Tenant session context: which client an operation runs for, and where
//! client records come from.

use crate::error::FetchError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Per-operation tenant context injected by the host service. Absence of a
/// session means core-only resolution; tenant sources are never consulted.
#[derive(Clone, Debug, Default)]
pub struct Session {
    /// Tenant identifier used to fetch the client record.
    pub client_code: Option<String>,
    /// Acting user, stamped into audit fields on writes.
    pub user_id: Option<String>,
}

impl Session {
    pub fn for_client(client_code: &str) -> Self {
        Session {
            client_code: Some(client_code.to_string()),
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }
}

/// A tenant/client record. Kept raw: the resolver validates the pieces it
/// needs and names what is malformed.
#[derive(Clone, Debug)]
pub struct ClientRecord(pub Value);

impl ClientRecord {
    /// The record's database map. Current records use `databases`; legacy
    /// records use `db`. Returns `None` when neither is an object.
    pub fn databases(&self) -> Option<&Value> {
        for field in ["databases", "db"] {
            if let Some(v) = self.0.get(field) {
                if v.is_object() {
                    return Some(v);
                }
            }
        }
        None
    }

    pub fn database_entry(&self, key: &str) -> Option<&Value> {
        self.databases().and_then(|dbs| dbs.get(key))
    }
}

/// Resolves client records by code. Backed by a service's client store; the
/// in-memory implementation below covers tests and single-tenant setups.
#[async_trait]
pub trait ClientSource: Send + Sync {
    async fn client(&self, code: &str) -> Result<Option<ClientRecord>, FetchError>;
}

/// Fixed client map, keyed by client code.
#[derive(Clone, Debug, Default)]
pub struct StaticClients {
    by_code: HashMap<String, Value>,
}

impl StaticClients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, code: &str, record: Value) -> Self {
        self.by_code.insert(code.to_string(), record);
        self
    }
}

#[async_trait]
impl ClientSource for StaticClients {
    async fn client(&self, code: &str) -> Result<Option<ClientRecord>, FetchError> {
        Ok(self.by_code.get(code).cloned().map(ClientRecord))
    }
}
