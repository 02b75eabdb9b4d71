//! Signed session tokens for authenticated requests.
//!
//! A session token is a self-contained HS256 JWT carrying the subject
//! email, the user id, a unique `jti`, and the role set captured at login
//! time. Validity is determined entirely by signature, expiry and
//! issuer/audience at presentation time; nothing is persisted and there is
//! no refresh mechanism.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::auth::user::User;
use crate::config::AuthConfig;
use crate::errors::{Error, Result, TokenErrorKind};

/// Session lifetime without remember-me
const SESSION_HOURS: i64 = 2;

/// Session lifetime with remember-me
const REMEMBER_ME_DAYS: i64 = 30;

/// Claims embedded in a session token at issuance time.
///
/// Roles are a snapshot taken at login; later role changes are not
/// reflected until the user logs in again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: the user's email
    pub sub: String,
    /// The user's id
    pub uid: String,
    /// Unique token identifier for replay detection and traceability
    pub jti: String,
    /// Role names granted at issuance
    pub roles: Vec<String>,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
}

impl SessionClaims {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0).single().unwrap_or_else(Utc::now)
    }
}

/// A freshly issued session token with its absolute expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedSessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and validates signed session tokens.
#[derive(Clone)]
pub struct SessionTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
}

impl SessionTokenService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
        }
    }

    /// Issue a session token for an authenticated user.
    ///
    /// Expiry is absolute from issuance: 30 days with `remember`, 2 hours
    /// without.
    #[instrument(skip(self, user, roles), fields(user_id = %user.id, remember))]
    pub fn issue(&self, user: &User, roles: Vec<String>, remember: bool) -> Result<IssuedSessionToken> {
        let now = Utc::now();
        let expires_at = if remember {
            now + Duration::days(REMEMBER_ME_DAYS)
        } else {
            now + Duration::hours(SESSION_HOURS)
        };

        let claims = SessionClaims {
            sub: user.email.clone(),
            uid: user.id.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
            roles,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| Error::internal(format!("Failed to sign session token: {}", err)))?;

        Ok(IssuedSessionToken { token, expires_at })
    }

    /// Validate a presented session token: signature, expiry, issuer and
    /// audience. Returns the embedded claims on success.
    #[instrument(skip(self, token))]
    pub fn validate(&self, token: &str) -> Result<SessionClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        let data = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    Error::token("session token has expired", TokenErrorKind::Expired)
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature
                | jsonwebtoken::errors::ErrorKind::InvalidIssuer
                | jsonwebtoken::errors::ErrorKind::InvalidAudience => Error::token(
                    format!("session token rejected: {}", err),
                    TokenErrorKind::InvalidSignature,
                ),
                _ => Error::token(
                    format!("malformed session token: {}", err),
                    TokenErrorKind::DecodeFailed,
                ),
            })?;

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;

    fn auth_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "0123456789abcdef0123456789abcdef".to_string(),
            issuer: "gatehouse".to_string(),
            audience: "gatehouse-clients".to_string(),
            token_key: "fedcba9876543210fedcba9876543210".to_string(),
        }
    }

    fn user() -> User {
        User {
            id: UserId::new(),
            email: "alice@example.com".to_string(),
            username: "alice".to_string(),
            phone: None,
            email_confirmed: true,
            security_stamp: User::new_security_stamp(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn issue_and_validate_round_trip() {
        let service = SessionTokenService::new(&auth_config());
        let user = user();
        let issued = service.issue(&user, vec!["Member".to_string()], false).unwrap();

        let claims = service.validate(&issued.token).unwrap();
        assert_eq!(claims.sub, user.email);
        assert_eq!(claims.uid, user.id.to_string());
        assert!(claims.has_role("Member"));
        assert!(!claims.has_role("Admin"));
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn expiry_two_hours_without_remember() {
        let service = SessionTokenService::new(&auth_config());
        let issued = service.issue(&user(), vec![], false).unwrap();
        let delta = issued.expires_at - Utc::now();
        assert!((delta - Duration::hours(2)).num_seconds().abs() < 5);
    }

    #[test]
    fn expiry_thirty_days_with_remember() {
        let service = SessionTokenService::new(&auth_config());
        let issued = service.issue(&user(), vec![], true).unwrap();
        let delta = issued.expires_at - Utc::now();
        assert!((delta - Duration::days(30)).num_seconds().abs() < 5);
    }

    #[test]
    fn wrong_key_rejected() {
        let service = SessionTokenService::new(&auth_config());
        let issued = service.issue(&user(), vec![], false).unwrap();

        let mut other_config = auth_config();
        other_config.jwt_secret = "ffffffffffffffffffffffffffffffff".to_string();
        let other = SessionTokenService::new(&other_config);

        let err = other.validate(&issued.token).unwrap_err();
        assert!(matches!(err, Error::Token { kind: TokenErrorKind::InvalidSignature, .. }));
    }

    #[test]
    fn wrong_audience_rejected() {
        let service = SessionTokenService::new(&auth_config());
        let issued = service.issue(&user(), vec![], false).unwrap();

        let mut other_config = auth_config();
        other_config.audience = "someone-else".to_string();
        let other = SessionTokenService::new(&other_config);

        assert!(other.validate(&issued.token).is_err());
    }

    #[test]
    fn garbage_token_is_decode_failure() {
        let service = SessionTokenService::new(&auth_config());
        let err = service.validate("not.a.jwt").unwrap_err();
        assert!(matches!(err, Error::Token { kind: TokenErrorKind::DecodeFailed, .. }));
    }

    #[test]
    fn claims_are_a_snapshot() {
        let service = SessionTokenService::new(&auth_config());
        let issued = service.issue(&user(), vec!["Member".to_string()], false).unwrap();
        // Role changes after issuance do not affect an outstanding token.
        let claims = service.validate(&issued.token).unwrap();
        assert_eq!(claims.roles, vec!["Member"]);
    }
}
