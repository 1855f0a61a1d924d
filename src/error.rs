//! Typed errors with stable numeric codes so callers can branch on kind.

use thiserror::Error;

/// Errors raised while resolving a database config or instantiating a driver.
///
/// Soft misses (parameter store fetch failure, secret fetch failure, unknown
/// catalog id) are never surfaced here; they are logged and resolution falls
/// through to the next source.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("invalid database settings: expected an object, got {found}")]
    InvalidSettings { found: &'static str },
    #[error("database config not found for key '{key}' (client session: {with_session})")]
    DbConfigNotFound { key: String, with_session: bool },
    #[error("invalid database config for key '{key}': {message}")]
    InvalidDbConfig { key: String, message: String },
    #[error("invalid client: {0}")]
    InvalidClient(String),
    #[error("database config has no driver type")]
    MissingType,
    #[error("database driver '{driver}' is not installed: {source_message}")]
    DbDriverNotInstalled {
        driver: String,
        source_message: String,
    },
    #[error("database driver '{driver}' could not be constructed: {source_message}")]
    InvalidDbDriver {
        driver: String,
        source_message: String,
    },
}

impl DispatchError {
    /// Stable numeric code for service-side branching.
    pub fn code(&self) -> u16 {
        match self {
            DispatchError::InvalidSettings { .. } => 1,
            DispatchError::DbConfigNotFound { .. } => 2,
            DispatchError::InvalidDbConfig { .. } => 3,
            DispatchError::InvalidClient(_) => 4,
            DispatchError::MissingType => 5,
            DispatchError::DbDriverNotInstalled { .. } => 6,
            DispatchError::InvalidDbDriver { .. } => 7,
        }
    }
}

/// Failure reported by a remote source (parameter store, secret store,
/// client store). Always a soft miss at the dispatcher level: logged, then
/// treated as an empty result.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct FetchError(pub String);

/// Errors raised by concrete drivers. `Unsupported` marks a capability the
/// driver does not implement; the entity layer maps it to
/// [`ModelError::DriverMethodNotImplemented`].
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("driver does not implement '{0}'")]
    Unsupported(&'static str),
    #[error("driver operation failed: {0}")]
    Operation(String),
}

/// Entity-layer errors: everything a Model operation can reject with.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("driver method not implemented: {0}")]
    DriverMethodNotImplemented(&'static str),
    #[error("driver: {0}")]
    Driver(String),
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
}

impl From<DriverError> for ModelError {
    fn from(e: DriverError) -> Self {
        match e {
            DriverError::Unsupported(method) => ModelError::DriverMethodNotImplemented(method),
            DriverError::Operation(msg) => ModelError::Driver(msg),
        }
    }
}

/// Names a JSON value's type for error messages.
pub(crate) fn json_type_name(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
