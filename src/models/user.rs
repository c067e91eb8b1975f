//! Account profile and auth-surface payloads.

use serde::{Deserialize, Serialize};

/// Cached snapshot of the signed-in account, mirroring server state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// Avatar filename as stored server-side
    #[serde(default)]
    pub avatar: Option<String>,
    /// Display URL derived client-side from the avatar filename
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Partial profile update. `None` fields are left untouched both on the wire
/// and when merged into the cached [`UserProfile`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone.is_none()
            && self.avatar.is_none()
            && self.avatar_url.is_none()
    }

    /// Apply this patch on top of a profile, field by field.
    pub fn apply_to(&self, user: &mut UserProfile) {
        if let Some(ref email) = self.email {
            user.email = email.clone();
        }
        if let Some(ref first_name) = self.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(ref last_name) = self.last_name {
            user.last_name = last_name.clone();
        }
        if let Some(ref phone) = self.phone {
            user.phone = Some(phone.clone());
        }
        if let Some(ref avatar) = self.avatar {
            user.avatar = Some(avatar.clone());
        }
        if let Some(ref avatar_url) = self.avatar_url {
            user.avatar_url = Some(avatar_url.clone());
        }
    }
}

/// Response of the credential-issuing endpoints (login, and registration on
/// servers that log the new account in).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserProfile,
}

/// Response of the refresh endpoint. The refresh token is only present when
/// the server rotated it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshPayload {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Response of the avatar upload endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarUpload {
    pub filename: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> UserProfile {
        UserProfile {
            id: 7,
            email: "ada@example.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            phone: None,
            avatar: None,
            avatar_url: None,
        }
    }

    #[test]
    fn test_patch_apply_leaves_unset_fields_untouched() {
        let mut user = sample_user();
        let patch = UserPatch {
            first_name: Some("Augusta".to_string()),
            ..Default::default()
        };
        patch.apply_to(&mut user);
        assert_eq!(user.first_name, "Augusta");
        assert_eq!(user.last_name, "Lovelace");
        assert_eq!(user.email, "ada@example.com");
    }

    #[test]
    fn test_patch_serializes_only_set_fields() {
        let patch = UserPatch {
            phone: Some("555-0100".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).expect("patch should serialize");
        assert_eq!(json, serde_json::json!({"phone": "555-0100"}));
    }

    #[test]
    fn test_refresh_payload_without_rotation() {
        let payload: RefreshPayload =
            serde_json::from_str(r#"{"accessToken": "a-2"}"#).expect("payload should parse");
        assert_eq!(payload.access_token, "a-2");
        assert!(payload.refresh_token.is_none());
    }

    #[test]
    fn test_auth_payload_parses_camel_case() {
        let json = r#"{
            "accessToken": "a-1",
            "refreshToken": "r-1",
            "user": {"id": 7, "email": "ada@example.com", "firstName": "Ada", "lastName": "Lovelace"}
        }"#;
        let payload: AuthPayload = serde_json::from_str(json).expect("payload should parse");
        assert_eq!(payload.access_token, "a-1");
        assert_eq!(payload.user.full_name(), "Ada Lovelace");
    }
}
