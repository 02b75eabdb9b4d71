//! User domain models and data structures.
//!
//! Defines the stored user account shape and the request/response DTOs
//! for the account lifecycle operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::UserId;

/// Stored representation of a user account.
///
/// The password hash is intentionally not part of this struct; the
/// repository returns it separately where authentication needs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub phone: Option<String>,
    /// Whether the email address has been verified via a confirmation link
    pub email_confirmed: bool,
    /// Rotating value bound into purpose tokens; rotating it invalidates
    /// every outstanding confirmation/reset token for this user
    pub security_stamp: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Normalize email to lowercase for consistent storage and comparison.
    pub fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    /// Generate a fresh security stamp.
    pub fn new_security_stamp() -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// New user creation payload. The email must already be normalized; the
/// password travels separately and is hashed by the credential store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub phone: Option<String>,
    pub email_confirmed: bool,
    pub security_stamp: String,
}

/// Registration input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// When set, the account is created already verified (operator-driven
    /// provisioning) and no confirmation email is sent
    #[serde(default)]
    pub pre_verified: bool,
}

/// User authentication credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember: bool,
}

/// Forgot-password input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Reset-password input: the token arrives from the emailed link.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub token: String,
    pub new_password: String,
}

/// Authenticated password change input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Profile update input. `None` or blank values mean "no change".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub phone: Option<String>,
}

/// Public view of a user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub phone: Option<String>,
    pub email_confirmed: bool,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileResponse {
    pub fn from_user(user: User, roles: Vec<String>) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            phone: user.phone,
            email_confirmed: user.email_confirmed,
            roles,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_normalization() {
        assert_eq!(User::normalize_email("Test@Example.COM"), "test@example.com");
        assert_eq!(User::normalize_email("  user@HOST.com  "), "user@host.com");
    }

    #[test]
    fn security_stamps_are_unique() {
        assert_ne!(User::new_security_stamp(), User::new_security_stamp());
    }

    #[test]
    fn register_request_defaults() {
        let json = r#"{
            "email": "alice@example.com",
            "username": "alice",
            "password": "Pass1234!",
            "confirmPassword": "Pass1234!"
        }"#;

        let request: RegisterRequest = serde_json::from_str(json).unwrap();
        assert!(!request.pre_verified);
        assert!(request.phone.is_none());
    }

    #[test]
    fn login_request_remember_defaults_false() {
        let json = r#"{"email": "a@b.com", "password": "x"}"#;
        let request: LoginRequest = serde_json::from_str(json).unwrap();
        assert!(!request.remember);
    }

    #[test]
    fn profile_response_carries_roles() {
        let user = User {
            id: UserId::new(),
            email: "alice@example.com".to_string(),
            username: "alice".to_string(),
            phone: None,
            email_confirmed: true,
            security_stamp: User::new_security_stamp(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let response = ProfileResponse::from_user(user.clone(), vec!["Member".to_string()]);
        assert_eq!(response.email, user.email);
        assert_eq!(response.roles, vec!["Member"]);
    }
}
