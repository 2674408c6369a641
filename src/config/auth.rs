//! Authentication configuration (HS256 access tokens)

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

/// Signing secret used in development when none is configured.
const DEVELOPMENT_SECRET: &str = "parley-development-secret-do-not-deploy";

/// Authentication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Shared HS256 signing secret
    pub jwt_secret: Option<Secret<String>>,

    /// Expected `iss` claim
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Expected `aud` claim
    #[serde(default = "default_audience")]
    pub audience: String,
}

impl AuthConfig {
    /// Returns the configured secret, or the development secret when none is
    /// set. `validate` rejects the latter outside development.
    pub fn signing_secret(&self) -> Secret<String> {
        self.jwt_secret
            .clone()
            .unwrap_or_else(|| Secret::new(DEVELOPMENT_SECRET.to_string()))
    }

    /// Returns true when no secret is configured.
    pub fn uses_development_secret(&self) -> bool {
        self.jwt_secret.is_none()
    }

    /// Validate authentication configuration
    ///
    /// Outside development a secret of at least 32 bytes is required.
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.issuer.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH__ISSUER"));
        }
        if self.audience.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH__AUDIENCE"));
        }

        match &self.jwt_secret {
            None if *environment != Environment::Development => {
                Err(ValidationError::MissingRequired("AUTH__JWT_SECRET"))
            }
            Some(secret) if secret.expose_secret().len() < 32 => Err(ValidationError::WeakJwtSecret),
            _ => Ok(()),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            issuer: default_issuer(),
            audience: default_audience(),
        }
    }
}

fn default_issuer() -> String {
    "parley".to_string()
}

fn default_audience() -> String {
    "parley-api".to_string()
}
