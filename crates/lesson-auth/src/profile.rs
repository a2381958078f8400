//! Cached profile of the signed-in user

use serde::{Deserialize, Serialize};

/// User as returned by the `me` endpoint and cached under `USER_KEY`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// ISO-8601 timestamp as sent by the API
    #[serde(default)]
    pub created_at: Option<String>,
}

fn default_active() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_me_response() {
        let json = r#"{
            "id": 12,
            "email": "ivanov.ii@students.dvfu.ru",
            "username": "ivanov",
            "is_active": true,
            "created_at": "2025-09-01T08:30:00"
        }"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.id, 12);
        assert_eq!(profile.username, "ivanov");
        assert_eq!(profile.created_at.as_deref(), Some("2025-09-01T08:30:00"));
    }

    #[test]
    fn missing_optional_fields_use_defaults() {
        let json = r#"{"id": 1, "email": "a@dvfu.ru", "username": "abc"}"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert!(profile.is_active);
        assert!(profile.created_at.is_none());
    }

    #[test]
    fn missing_username_is_rejected() {
        let json = r#"{"id": 1, "email": "a@dvfu.ru"}"#;
        assert!(serde_json::from_str::<UserProfile>(json).is_err());
    }
}
