//! Assistant participant configuration

use secrecy::Secret;
use serde::Deserialize;
use std::time::Duration;

use crate::domain::assistant::{
    AssistantIdentity, QuestionDelivery, DEFAULT_ASSISTANT_DISPLAY_NAME, DEFAULT_ASSISTANT_EMAIL,
    DEFAULT_ASSISTANT_USER_ID, DEFAULT_FALLBACK_TEXT, DEFAULT_SYSTEM_PROMPT,
};
use crate::domain::foundation::UserId;

use super::error::ValidationError;
use super::server::Environment;

/// Assistant configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AssistantConfig {
    /// OpenAI API key; without one, development runs a canned mock
    pub openai_api_key: Option<Secret<String>>,

    #[serde(default = "default_model")]
    pub model: String,

    /// Override for OpenAI-compatible endpoints
    pub base_url: Option<String>,

    /// Upper bound on one assistant call, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Retries on transient provider errors
    #[serde(default)]
    pub max_retries: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Directory email of the assistant user
    #[serde(default = "default_user_email")]
    pub user_email: String,

    /// Assistant id used when the directory has no such user
    #[serde(default = "default_user_id")]
    pub user_id: String,

    #[serde(default = "default_display_name")]
    pub display_name: String,

    /// Answer text used when the assistant fails
    #[serde(default = "default_fallback_text")]
    pub fallback_text: String,

    #[serde(default)]
    pub question_delivery: QuestionDelivery,
}

impl AssistantConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check if OpenAI is configured
    pub fn has_openai(&self) -> bool {
        self.openai_api_key.is_some()
    }

    /// Identity used when the assistant user is not in the directory.
    pub fn fallback_identity(&self) -> Result<AssistantIdentity, ValidationError> {
        let user_id =
            UserId::parse(&self.user_id).map_err(|_| ValidationError::InvalidAssistantUserId)?;
        Ok(AssistantIdentity::new(user_id, self.display_name.clone()))
    }

    /// Validate assistant configuration
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.timeout_secs == 0 || self.timeout_secs > 300 {
            return Err(ValidationError::InvalidAssistantTimeout);
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ValidationError::InvalidTemperature);
        }
        if self.fallback_text.trim().is_empty() {
            return Err(ValidationError::MissingRequired("ASSISTANT__FALLBACK_TEXT"));
        }
        self.fallback_identity()?;

        if !self.has_openai() && *environment != Environment::Development {
            return Err(ValidationError::MissingRequired("ASSISTANT__OPENAI_API_KEY"));
        }
        Ok(())
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            model: default_model(),
            base_url: None,
            timeout_secs: default_timeout(),
            max_retries: 0,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_prompt: default_system_prompt(),
            user_email: default_user_email(),
            user_id: default_user_id(),
            display_name: default_display_name(),
            fallback_text: default_fallback_text(),
            question_delivery: QuestionDelivery::default(),
        }
    }
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    200
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_user_email() -> String {
    DEFAULT_ASSISTANT_EMAIL.to_string()
}

fn default_user_id() -> String {
    DEFAULT_ASSISTANT_USER_ID.to_string()
}

fn default_display_name() -> String {
    DEFAULT_ASSISTANT_DISPLAY_NAME.to_string()
}

fn default_fallback_text() -> String {
    DEFAULT_FALLBACK_TEXT.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assistant_config_defaults() {
        let config = AssistantConfig::default();
        assert_eq!(config.model, "gpt-3.5-turbo");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.max_tokens, 200);
        assert_eq!(config.question_delivery, QuestionDelivery::AfterCommit);
        assert_eq!(config.user_email, "ai@chatapp.system");
    }

    #[test]
    fn test_fallback_identity_uses_fixed_id() {
        let identity = AssistantConfig::default().fallback_identity().unwrap();
        assert_eq!(identity.user_id.to_string(), DEFAULT_ASSISTANT_USER_ID);
        assert_eq!(identity.display_name, "AI Assistant");
    }

    #[test]
    fn test_validation_timeout_range() {
        for secs in [0, 301] {
            let config = AssistantConfig {
                timeout_secs: secs,
                ..Default::default()
            };
            assert_eq!(
                config.validate(&Environment::Development),
                Err(ValidationError::InvalidAssistantTimeout)
            );
        }
    }

    #[test]
    fn test_validation_bad_user_id() {
        let config = AssistantConfig {
            user_id: "ai".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::InvalidAssistantUserId)
        );
    }

    #[test]
    fn test_production_requires_api_key() {
        let config = AssistantConfig::default();
        assert!(config.validate(&Environment::Development).is_ok());
        assert!(config.validate(&Environment::Production).is_err());

        let config = AssistantConfig {
            openai_api_key: Some(Secret::new("sk-test".to_string())),
            ..Default::default()
        };
        assert!(config.validate(&Environment::Production).is_ok());
    }
}
