//! Typed errors for configuration, connection and persistence operations.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("database connection is not set")]
    NoConnection,
    #[error("connection host is not set")]
    NoHost,
    #[error("connection port is not set")]
    NoPort,
    #[error("connection database is not set")]
    NoDatabase,
    #[error("discovery wasn't found to resolve connection key '{0}'")]
    CannotResolve(String),
    #[error("credential store wasn't found to look up key '{0}'")]
    NoCredentialStore(String),
    #[error("config load: {0}")]
    Load(String),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::NoConnection => "NO_CONNECTION",
            ConfigError::NoHost => "NO_HOST",
            ConfigError::NoPort => "NO_PORT",
            ConfigError::NoDatabase => "NO_DATABASE",
            ConfigError::CannotResolve(_) => "CANNOT_RESOLVE",
            ConfigError::NoCredentialStore(_) => "NO_CREDENTIAL_STORE",
            ConfigError::Load(_) => "LOAD_FAILED",
        }
    }
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("connection: {message}")]
    Connection {
        code: &'static str,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
    #[error("invalid state: {message}")]
    InvalidState { code: &'static str, message: String },
    #[error("lookup: {message}")]
    Lookup { message: String },
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("conversion: {0}")]
    Conversion(#[from] serde_json::Error),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

impl PersistenceError {
    /// `CONNECT_FAILED` with an optional underlying cause.
    pub fn connect_failed(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        PersistenceError::Connection {
            code: "CONNECT_FAILED",
            message: message.into(),
            source,
        }
    }

    pub fn invalid_state(code: &'static str, message: impl Into<String>) -> Self {
        PersistenceError::InvalidState {
            code,
            message: message.into(),
        }
    }

    pub fn lookup(message: impl Into<String>) -> Self {
        PersistenceError::Lookup {
            message: message.into(),
        }
    }

    pub fn code(&self) -> Option<&'static str> {
        match self {
            PersistenceError::Config(e) => Some(e.code()),
            PersistenceError::Connection { code, .. } => Some(*code),
            PersistenceError::InvalidState { code, .. } => Some(*code),
            _ => None,
        }
    }
}
