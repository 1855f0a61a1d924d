//! Settings source: already-parsed key-value configuration. The dispatcher
//! only reads the `database` section; loading and parsing belong to the host
//! service.

use serde_json::Value;

/// Provides the local (legacy) database settings object: a map of database
/// key to `{ write, read?, admin? }` slots. `None` means the service defines
/// no local settings and resolution falls through to the next source.
pub trait SettingsSource: Send + Sync {
    fn database_settings(&self) -> Option<Value>;
}

/// In-memory settings, for tests and for services that assemble settings
/// themselves.
#[derive(Clone, Debug, Default)]
pub struct StaticSettings {
    databases: Option<Value>,
}

impl StaticSettings {
    pub fn new(databases: Value) -> Self {
        StaticSettings {
            databases: Some(databases),
        }
    }

    pub fn empty() -> Self {
        StaticSettings { databases: None }
    }
}

impl SettingsSource for StaticSettings {
    fn database_settings(&self) -> Option<Value> {
        self.databases.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn static_settings_round_trip() {
        let settings = StaticSettings::new(json!({"core": {"write": {"type": "x"}}}));
        assert!(settings.database_settings().unwrap().is_object());
        assert_eq!(StaticSettings::empty().database_settings(), None);
    }
}
