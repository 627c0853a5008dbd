//! Error types for ransim

use thiserror::Error;

/// Error types for the ransim library.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An argument outside the valid domain of a radio-model function.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A referenced entity (UE, cell, base station) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A registration or admission request was rejected.
    #[error("Registration rejected: {0}")]
    RegistrationRejected(String),

    /// AI-service subscription lifecycle errors.
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// File I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}

/// Convenience result alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;
