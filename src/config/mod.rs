//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `PARLEY_` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use parley::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod assistant;
mod auth;
mod chat;
mod database;
mod error;
mod server;

pub use assistant::AssistantConfig;
pub use auth::AuthConfig;
pub use chat::ChatConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use server::{Environment, LogFormat, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Every section has defaults, so an empty environment yields a runnable
/// development setup on in-memory adapters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, logging)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection)
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Access token verification
    #[serde(default)]
    pub auth: AuthConfig,

    /// Assistant participant and completion provider
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// History paging and delivery buffers
    #[serde(default)]
    pub chat: ChatConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `PARLEY` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `PARLEY__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `PARLEY__DATABASE__URL=...` -> `database.url = ...`
    /// - `PARLEY__ASSISTANT__QUESTION_DELIVERY=eager`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("PARLEY")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// Outside development a database, a JWT secret and an OpenAI key are
    /// all required.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let environment = &self.server.environment;

        self.server.validate()?;
        self.database.validate()?;
        if !self.database.is_configured() && *environment != Environment::Development {
            return Err(ValidationError::DatabaseRequired);
        }
        self.auth.validate(environment)?;
        self.assistant.validate(environment)?;
        self.chat.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "PARLEY__DATABASE__URL",
        "PARLEY__AUTH__JWT_SECRET",
        "PARLEY__ASSISTANT__OPENAI_API_KEY",
        "PARLEY__ASSISTANT__QUESTION_DELIVERY",
        "PARLEY__SERVER__PORT",
        "PARLEY__SERVER__ENVIRONMENT",
        "PARLEY__CHAT__HISTORY_MAX_LIMIT",
    ];

    fn set_production_env() {
        env::set_var("PARLEY__DATABASE__URL", "postgresql://test@localhost/test");
        env::set_var(
            "PARLEY__AUTH__JWT_SECRET",
            "0123456789abcdef0123456789abcdef",
        );
        env::set_var("PARLEY__ASSISTANT__OPENAI_API_KEY", "sk-test");
        env::set_var("PARLEY__SERVER__ENVIRONMENT", "production");
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_empty_environment_is_valid_development() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let config = AppConfig::load().unwrap();

        assert_eq!(config.server.environment, Environment::Development);
        assert!(!config.database.is_configured());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_production_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_production_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.is_production());
        assert_eq!(
            config.database.url.as_deref(),
            Some("postgresql://test@localhost/test")
        );
        assert_eq!(
            config.auth.jwt_secret.as_ref().map(|s| s.expose_secret().clone()),
            Some("0123456789abcdef0123456789abcdef".to_string())
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_requires_database() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_production_env();
        env::remove_var("PARLEY__DATABASE__URL");
        let result = AppConfig::load();
        clear_env();

        assert_eq!(
            result.unwrap().validate(),
            Err(ValidationError::DatabaseRequired)
        );
    }

    #[test]
    fn test_nested_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("PARLEY__SERVER__PORT", "3000");
        env::set_var("PARLEY__ASSISTANT__QUESTION_DELIVERY", "eager");
        env::set_var("PARLEY__CHAT__HISTORY_MAX_LIMIT", "50");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(
            config.assistant.question_delivery,
            crate::domain::assistant::QuestionDelivery::Eager
        );
        assert_eq!(config.chat.history_max_limit, 50);
    }
}
