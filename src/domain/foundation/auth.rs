//! Authentication types for the domain layer.
//!
//! These types represent a caller whose token was already validated by the
//! identity subsystem. They carry **no provider dependencies**: the JWT adapter
//! and the test mock both populate them through the `SessionValidator` port.

use super::UserId;
use thiserror::Error;

/// Authenticated user extracted from a validated token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// The stable user identifier (token subject).
    pub id: UserId,

    /// Email claim, when the token carries one.
    pub email: Option<String>,

    /// Display name claim, when the token carries one.
    pub display_name: Option<String>,
}

impl AuthenticatedUser {
    /// Creates a new authenticated user.
    pub fn new(id: UserId, email: Option<String>, display_name: Option<String>) -> Self {
        Self {
            id,
            email,
            display_name,
        }
    }
}

/// Authentication errors that can occur during token validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The token is missing, malformed, or has an invalid signature.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The token has expired (separate from InvalidToken for specific handling).
    #[error("Token expired")]
    TokenExpired,

    /// The authentication service is unavailable (network, config, etc.).
    #[error("Auth service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AuthError {
    /// Returns true if this error indicates the user should re-authenticate.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, AuthError::InvalidToken | AuthError::TokenExpired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticated_user_new_creates_user() {
        let id = UserId::new();
        let user = AuthenticatedUser::new(id, Some("a@example.com".into()), None);

        assert_eq!(user.id, id);
        assert_eq!(user.email.as_deref(), Some("a@example.com"));
        assert!(user.display_name.is_none());
    }

    #[test]
    fn auth_error_displays_correctly() {
        assert_eq!(AuthError::InvalidToken.to_string(), "Invalid or expired token");
        assert_eq!(
            AuthError::ServiceUnavailable("down".into()).to_string(),
            "Auth service unavailable: down"
        );
    }

    #[test]
    fn only_token_errors_require_reauthentication() {
        assert!(AuthError::TokenExpired.requires_reauthentication());
        assert!(!AuthError::ServiceUnavailable("x".into()).requires_reauthentication());
    }
}
