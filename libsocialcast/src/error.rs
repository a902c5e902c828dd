//! Error types for Socialcast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CastError>;

#[derive(Error, Debug)]
pub enum CastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CastError::InvalidInput(_) => 3,
            CastError::Platform(PlatformError::Authentication(_)) => 2,
            CastError::Platform(_) => 1,
            CastError::Http(_) => 1,
            CastError::Config(_) => 2,
            CastError::Store(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),
}

/// Outbound HTTP failures. A request that never produced a response is a
/// `Transport` error; a response outside 2xx is `Status` with the body kept
/// for diagnostics.
#[derive(Error, Debug, Clone)]
pub enum HttpError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Network error: {0}")]
    Network(String),
}
