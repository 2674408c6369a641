//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid socket address")]
    InvalidSocketAddr,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("A database is required outside development")]
    DatabaseRequired,

    #[error("JWT secret must be at least 32 bytes")]
    WeakJwtSecret,

    #[error("Assistant timeout must be between 1 and 300 seconds")]
    InvalidAssistantTimeout,

    #[error("Assistant temperature must be between 0.0 and 2.0")]
    InvalidTemperature,

    #[error("Invalid assistant user id")]
    InvalidAssistantUserId,

    #[error("History limits must satisfy 1 <= default <= max")]
    InvalidHistoryLimits,

    #[error("Outbound buffer must be at least 1")]
    InvalidOutboundBuffer,
}
