//! Runtime environment: service name and environment gating for credential
//! fetch and identifier validation. Injectable so tests never touch process env.

/// Env var naming the running service. Stems the parameter/secret store id.
pub const SERVICE_NAME_VAR: &str = "SERVICE_NAME";

/// Env var naming the environment (`local`, `test`, `dev`, `beta`, `prod`).
pub const SERVICE_ENV_VAR: &str = "SERVICE_ENV";

/// Resolved runtime environment. Build from process env with [`RuntimeEnv::from_env`]
/// or explicitly with [`RuntimeEnv::new`] (tests, multi-tenant hosts).
#[derive(Clone, Debug, Default)]
pub struct RuntimeEnv {
    service_name: Option<String>,
    environment: Option<String>,
}

impl RuntimeEnv {
    pub fn new(service_name: Option<&str>, environment: Option<&str>) -> Self {
        RuntimeEnv {
            service_name: service_name.map(str::to_string),
            environment: environment.map(str::to_string),
        }
    }

    /// Read `SERVICE_NAME` / `SERVICE_ENV` from the process environment.
    pub fn from_env() -> Self {
        RuntimeEnv {
            service_name: std::env::var(SERVICE_NAME_VAR).ok().filter(|s| !s.is_empty()),
            environment: std::env::var(SERVICE_ENV_VAR).ok().filter(|s| !s.is_empty()),
        }
    }

    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    /// Well-known name of the database catalog / secret bundle for this
    /// service (pattern: `<service-name>-databases`).
    pub fn databases_store_name(&self) -> Option<String> {
        self.service_name.as_ref().map(|s| format!("{}-databases", s))
    }

    /// Local environments never call the remote secret store.
    pub fn is_local(&self) -> bool {
        matches!(self.environment.as_deref(), Some("local"))
    }

    /// Identifier-struct validation is skipped in test environments and when
    /// no environment indicator is set at all.
    pub fn skip_id_validation(&self) -> bool {
        match self.environment.as_deref() {
            None | Some("test") => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_gates_credentials() {
        assert!(RuntimeEnv::new(Some("orders"), Some("local")).is_local());
        assert!(!RuntimeEnv::new(Some("orders"), Some("prod")).is_local());
    }

    #[test]
    fn test_or_unset_gates_id_validation() {
        assert!(RuntimeEnv::new(None, None).skip_id_validation());
        assert!(RuntimeEnv::new(None, Some("test")).skip_id_validation());
        assert!(!RuntimeEnv::new(None, Some("beta")).skip_id_validation());
    }

    #[test]
    fn store_name_follows_service() {
        let env = RuntimeEnv::new(Some("orders"), Some("prod"));
        assert_eq!(env.databases_store_name().as_deref(), Some("orders-databases"));
        assert_eq!(RuntimeEnv::new(None, None).databases_store_name(), None);
    }
}
