//! Error types for Cadence
//!
//! Manual operations (approve, publish-now, toggle, schedule creation)
//! surface these errors to their caller. The scheduled path never does:
//! platform and generation failures are caught at the smallest scope and
//! recorded on the Post instead.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CadenceError>;

#[derive(Error, Debug)]
pub enum CadenceError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),
}

impl CadenceError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CadenceError::Validation(_) => 3,
            CadenceError::NotFound(_) => 4,
            CadenceError::InvalidState(_) => 5,
            CadenceError::Config(_) => 2,
            CadenceError::Database(_) => 1,
            CadenceError::Platform(_) | CadenceError::Generation(_) => 1,
        }
    }

    /// Whether this error came from an external collaborator
    /// (a platform client or a content/image generator).
    pub fn is_external(&self) -> bool {
        matches!(self, CadenceError::Platform(_) | CadenceError::Generation(_))
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

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to encode or decode column: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// Failure reported by a platform client.
///
/// `Media` is reserved for the image step (upload, registration or
/// attachment). The publisher treats it as recoverable by posting the text
/// alone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Image step failed: {0}")]
    Media(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),
}

impl PlatformError {
    /// Whether another attempt could succeed.
    ///
    /// Authentication and validation failures are permanent: retrying the
    /// same request with the same credentials and content cannot change the
    /// answer.
    pub fn is_transient(&self) -> bool {
        match self {
            PlatformError::Network(_)
            | PlatformError::RateLimit(_)
            | PlatformError::Posting(_)
            | PlatformError::Media(_) => true,
            PlatformError::Authentication(_) | PlatformError::Validation(_) => false,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Generator is not configured: {0}")]
    NotConfigured(String),

    #[error("Generation request failed: {0}")]
    Request(String),

    #[error("Unexpected generator response: {0}")]
    Response(String),
}
