pub mod resolver;
pub mod settings;
pub mod types;

pub use resolver::ConfigResolver;
pub use settings::{SettingsSource, StaticSettings};
pub use types::{AccessType, ConfigSlots, DatabaseConfig, TenantDatabaseRef};

pub(crate) use types::merge_objects;
