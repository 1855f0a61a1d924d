//! Structured write-audit events. The Model builds entries; delivery is the
//! sink's problem (fire-and-forget, never blocks or fails an operation).

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Mutex;
use uuid::Uuid;

/// One audit entry for a write operation.
#[derive(Clone, Debug, Serialize)]
pub struct LogEvent {
    pub id: Uuid,
    /// Entity/table the operation ran against.
    pub entity: String,
    /// Affected item id, when the operation targets one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<Value>,
    /// Operation name: `inserted`, `updated`, `saved`, `removed`, ...
    pub event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_created: Option<String>,
    pub date_created: DateTime<Utc>,
    /// Operation payload, with excluded fields already stripped.
    pub log: Value,
}

impl LogEvent {
    pub fn new(entity: &str, event: &'static str, log: Value) -> Self {
        LogEvent {
            id: Uuid::new_v4(),
            entity: entity.to_string(),
            entity_id: None,
            event,
            user_created: None,
            date_created: Utc::now(),
            log,
        }
    }

    pub fn with_entity_id(mut self, entity_id: Value) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    pub fn with_user(mut self, user_id: Option<&str>) -> Self {
        self.user_created = user_id.map(str::to_string);
        self
    }
}

/// Receives pre-built audit entries.
pub trait EventLogger: Send + Sync {
    fn notify(&self, event: LogEvent);
}

/// Discards every event. The default sink.
#[derive(Clone, Debug, Default)]
pub struct NullLogger;

impl EventLogger for NullLogger {
    fn notify(&self, _event: LogEvent) {}
}

/// Collects events in memory; for tests and local inspection.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    events: Mutex<Vec<LogEvent>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl EventLogger for MemoryLogger {
    fn notify(&self, event: LogEvent) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_logger_collects_events() {
        let logger = MemoryLogger::new();
        logger.notify(
            LogEvent::new("orders", "inserted", json!({"status": "new"}))
                .with_entity_id(json!("o-1"))
                .with_user(Some("u-1")),
        );
        let events = logger.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "inserted");
        assert_eq!(events[0].user_created.as_deref(), Some("u-1"));
    }
}
