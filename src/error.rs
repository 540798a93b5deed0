//! Error types for the onboarding service.
//!
//! The flow machine itself is infallible by contract — an unmatched command
//! is a no-op, not an error. These types cover the ambient layers around it.

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors from the chain-reading collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("RPC request failed: {0}")]
    Request(String),

    #[error("RPC returned an error: code {code}, {message}")]
    Rpc { code: i64, message: String },

    #[error("Malformed RPC response: {0}")]
    InvalidResponse(String),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
