//! Datalayer SDK: configuration-driven data-access library with pluggable
//! database drivers.

pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod driver;
pub mod env;
pub mod error;
pub mod fields;
pub mod logs;
pub mod model;
pub mod secrets;
pub mod session;

pub use catalog::{CatalogClient, ParameterStore, StaticParameterStore};
pub use config::{AccessType, ConfigResolver, DatabaseConfig, SettingsSource, StaticSettings};
pub use dispatcher::{Dispatcher, DriverRegistry};
pub use driver::{Driver, DriverFactory, IdValidator};
pub use env::RuntimeEnv;
pub use error::{DispatchError, DriverError, FetchError, ModelError};
pub use logs::{EventLogger, LogEvent, MemoryLogger, NullLogger};
pub use model::{Model, DEFAULT_PAGE_SIZE};
pub use secrets::{CredentialFetcher, SecretStore, StaticSecretStore};
pub use session::{ClientRecord, ClientSource, Session, StaticClients};
