//! Presence notifications and user profile snapshots.

use crate::domain::foundation::{Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// Ephemeral online/offline notification. Never persisted.
///
/// Consumers treat it as level state ("user X is now online"), so a repeated
/// event is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEvent {
    pub user_id: UserId,
    pub is_online: bool,
}

impl PresenceEvent {
    pub fn online(user_id: UserId) -> Self {
        Self {
            user_id,
            is_online: true,
        }
    }

    pub fn offline(user_id: UserId) -> Self {
        Self {
            user_id,
            is_online: false,
        }
    }
}

/// Read-only view of a user owned by the identity subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub last_seen: Option<Timestamp>,
    pub is_active: bool,
}

impl UserProfile {
    /// Creates an active profile with no avatar and no last-seen time.
    pub fn new(id: UserId, email: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            display_name: display_name.into(),
            avatar_url: None,
            last_seen: None,
            is_active: true,
        }
    }

    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_event_serializes_camel_case() {
        let id = UserId::new();
        let json = serde_json::to_value(PresenceEvent::offline(id)).unwrap();
        assert_eq!(json["userId"], id.to_string());
        assert_eq!(json["isOnline"], false);
    }

    #[test]
    fn profile_builder_sets_fields() {
        let p = UserProfile::new(UserId::new(), "bob@example.com", "Bob")
            .with_avatar("/a/bob.png")
            .inactive();
        assert_eq!(p.avatar_url.as_deref(), Some("/a/bob.png"));
        assert!(!p.is_active);
    }
}
