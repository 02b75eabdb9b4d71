//! Account orchestrator: registration, verification, login, password and
//! profile flows composed over the credential store, the token services and
//! the notifier.

use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::auth::hashing;
use crate::auth::purpose_token::{PurposeTokenService, TokenPurpose};
use crate::auth::session::{IssuedSessionToken, SessionClaims, SessionTokenService};
use crate::auth::user::{
    ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, NewUser, ProfileResponse,
    RegisterRequest, ResetPasswordRequest, UpdateProfileRequest, User,
};
use crate::config::{AppConfig, LinkConfig};
use crate::domain::UserId;
use crate::errors::{Error, Result};
use crate::notify::{build_link, EmailKind, Notifier};
use crate::observability::metrics;
use crate::storage::repositories::{
    RoleRepository, SqlxRoleRepository, SqlxUserRepository, UserRepository,
};

/// Role assigned to every new account, created on demand.
pub const DEFAULT_ROLE: &str = "Member";

/// Pre-computed dummy hash for timing-safe user enumeration prevention.
/// When a non-existent email is used, we still run Argon2 verification
/// against this hash so the response time matches real verification.
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
    hashing::hash_password("dummy_startup_value")
        .unwrap_or_else(|_| "$argon2id$v=19$m=768,t=1,p=1$dW5rbm93bg$dW5rbm93bg".to_string())
});

/// Outcome of a successful registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOutcome {
    pub user_id: UserId,
    pub email_confirmed: bool,
    pub message: String,
}

/// Outcome of an email verification call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOutcome {
    /// True when the email was already verified and the token was not
    /// re-checked (the operation is idempotent)
    pub already_confirmed: bool,
    pub message: String,
}

/// The account orchestrator.
#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserRepository>,
    roles: Arc<dyn RoleRepository>,
    notifier: Arc<dyn Notifier>,
    purpose_tokens: PurposeTokenService,
    session_tokens: SessionTokenService,
    links: LinkConfig,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        roles: Arc<dyn RoleRepository>,
        notifier: Arc<dyn Notifier>,
        purpose_tokens: PurposeTokenService,
        session_tokens: SessionTokenService,
        links: LinkConfig,
    ) -> Self {
        Self { users, roles, notifier, purpose_tokens, session_tokens, links }
    }

    pub fn with_sqlx(
        pool: crate::storage::DbPool,
        notifier: Arc<dyn Notifier>,
        config: &AppConfig,
    ) -> Self {
        Self::new(
            Arc::new(SqlxUserRepository::new(pool.clone())),
            Arc::new(SqlxRoleRepository::new(pool)),
            notifier,
            PurposeTokenService::new(config.auth.token_key.as_bytes().to_vec()),
            SessionTokenService::new(&config.auth),
            config.links.clone(),
        )
    }

    /// Register a new account.
    ///
    /// Failure points, in order: field validation (all violations reported
    /// at once), password/confirmation mismatch, email uniqueness, store
    /// rejection. When the account is not pre-verified a confirmation email
    /// is sent best-effort; delivery trouble never fails the registration.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: RegisterRequest) -> Result<RegistrationOutcome> {
        if let Err(errors) = request.validate() {
            metrics::record_registration("validation_failed");
            return Err(Error::from(errors));
        }

        if request.password != request.confirm_password {
            metrics::record_registration("validation_failed");
            return Err(Error::validation_field(
                "Password confirmation does not match",
                "confirmPassword",
            ));
        }

        let email = User::normalize_email(&request.email);
        if self.users.find_by_email(&email).await?.is_some() {
            metrics::record_registration("conflict");
            return Err(Error::conflict(
                format!("Email '{}' is already registered", email),
                "user",
            ));
        }

        let new_user = NewUser {
            id: UserId::new(),
            email,
            username: request.username.trim().to_string(),
            phone: normalize_optional(request.phone.as_deref()),
            email_confirmed: request.pre_verified,
            security_stamp: User::new_security_stamp(),
        };

        let user = match self.users.create_user(new_user, &request.password).await {
            Ok(user) => user,
            Err(err) => {
                metrics::record_registration("store_rejected");
                return Err(err);
            }
        };

        self.roles.ensure_role(DEFAULT_ROLE).await?;
        self.roles.assign_role(&user.id, DEFAULT_ROLE).await?;

        if !user.email_confirmed {
            let token = self.purpose_tokens.mint(&user, TokenPurpose::ConfirmEmail);
            let link = build_link(&self.links.verify_base_url, user.id.as_str(), &token);
            // Best effort: a delivery failure must not roll back the account.
            if let Err(err) = self.notifier.send(&user.email, &link, EmailKind::Confirm).await {
                warn!(user_id = %user.id, error = %err, "confirmation email delivery failed");
            }
        }

        metrics::record_registration("success");
        info!(user_id = %user.id, email = %user.email, "user registered");

        Ok(RegistrationOutcome {
            user_id: user.id,
            email_confirmed: user.email_confirmed,
            message: "Registration successful".to_string(),
        })
    }

    /// Verify an email address from a confirmation link.
    ///
    /// Idempotent: when the email is already confirmed the presented token
    /// is not re-validated and the call succeeds, so following the same
    /// link twice is safe.
    #[instrument(skip(self, token), fields(user_id = %user_id))]
    pub async fn verify_email(&self, user_id: &str, token: &str) -> Result<VerificationOutcome> {
        let id = UserId::from_str_unchecked(user_id);
        let mut user = self
            .users
            .find_by_id(&id)
            .await?
            .ok_or_else(|| Error::not_found("user", user_id))?;

        if user.email_confirmed {
            metrics::record_email_verification("already_confirmed");
            return Ok(VerificationOutcome {
                already_confirmed: true,
                message: "Email was already verified".to_string(),
            });
        }

        if let Err(err) = self.purpose_tokens.validate(&user, TokenPurpose::ConfirmEmail, token) {
            metrics::record_email_verification("token_rejected");
            warn!(user_id = %user.id, error = %err, "email verification token rejected");
            return Err(err);
        }

        user.email_confirmed = true;
        self.users.update_user(&user).await?;

        metrics::record_email_verification("confirmed");
        info!(user_id = %user.id, "email verified");

        Ok(VerificationOutcome {
            already_confirmed: false,
            message: "Email verified successfully".to_string(),
        })
    }

    /// Authenticate with email and password and issue a session token.
    ///
    /// Every failure (unknown email, wrong password, unverified account)
    /// produces the same credential error so callers cannot tell whether an
    /// email is registered.
    #[instrument(skip(self, request), fields(email = %request.email, remember = request.remember))]
    pub async fn login(&self, request: LoginRequest) -> Result<IssuedSessionToken> {
        let email = User::normalize_email(&request.email);

        let user = match self.users.find_by_email(&email).await? {
            Some(user) => user,
            None => {
                // Keep response time aligned with the real verification path.
                if let Err(err) = hashing::verify_password(&request.password, &DUMMY_HASH) {
                    warn!(error = %err, "dummy hash verification failed unexpectedly");
                }
                warn!(email = %email, "login attempt for non-existent user");
                metrics::record_authentication("invalid_credentials");
                return Err(Error::credential("Invalid email or password"));
            }
        };

        if !self.users.verify_password(&user.id, &request.password).await? {
            warn!(user_id = %user.id, "login attempt with incorrect password");
            metrics::record_authentication("invalid_credentials");
            return Err(Error::credential("Invalid email or password"));
        }

        if !user.email_confirmed {
            warn!(user_id = %user.id, "login attempt for unverified account");
            metrics::record_authentication("invalid_credentials");
            return Err(Error::credential("Invalid email or password"));
        }

        let roles = self.roles.list_user_roles(&user.id).await?;
        let issued = self.session_tokens.issue(&user, roles, request.remember)?;

        metrics::record_authentication("success");
        info!(user_id = %user.id, email = %user.email, "user logged in");

        Ok(issued)
    }

    /// Acknowledge a logout. The service keeps no session registry, so the
    /// caller discards its token; nothing is mutated here.
    #[instrument(skip(self, claims), fields(user_id = %claims.uid))]
    pub async fn logout(&self, claims: &SessionClaims) -> Result<()> {
        info!(user_id = %claims.uid, jti = %claims.jti, "user logged out");
        Ok(())
    }

    /// Start a password reset for a verified account: mint a reset token
    /// and email the reset link. Unverified accounts are rejected so reset
    /// capability never reaches an unconfirmed address.
    ///
    /// Unlike registration, a delivery failure here is surfaced: the caller
    /// has nothing to show for the request if the email never went out.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn forgot_password(&self, request: ForgotPasswordRequest) -> Result<String> {
        request.validate().map_err(Error::from)?;

        let email = User::normalize_email(&request.email);
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| Error::not_found("user", email.clone()))?;

        if !user.email_confirmed {
            return Err(Error::validation("Email address has not been verified"));
        }

        let token = self.purpose_tokens.mint(&user, TokenPurpose::ResetPassword);
        let link = build_link(&self.links.reset_base_url, user.id.as_str(), &token);
        self.notifier.send(&user.email, &link, EmailKind::Reset).await?;

        info!(user_id = %user.id, "password reset email sent");
        Ok("A password reset email has been sent".to_string())
    }

    /// Complete a password reset from an emailed link. On success the
    /// password hash is replaced and the security stamp rotated, which
    /// invalidates every other outstanding confirmation/reset token.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn reset_password(&self, request: ResetPasswordRequest) -> Result<String> {
        request.validate().map_err(Error::from)?;

        let email = User::normalize_email(&request.email);
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| Error::not_found("user", email.clone()))?;

        if let Err(err) = self.purpose_tokens.validate(&user, TokenPurpose::ResetPassword, &request.token) {
            metrics::record_password_update("reset", false);
            return Err(err);
        }

        self.users
            .set_password(&user.id, &request.new_password, &User::new_security_stamp())
            .await?;

        metrics::record_password_update("reset", true);
        info!(user_id = %user.id, "password reset completed");
        Ok("Password reset successful".to_string())
    }

    /// Change the password of an authenticated user. The current password
    /// must verify first; on failure nothing is mutated. Accounts without a
    /// password hash (external-login-only) cannot change one.
    #[instrument(skip(self, claims, request), fields(user_id = %claims.uid))]
    pub async fn change_password(
        &self,
        claims: &SessionClaims,
        request: ChangePasswordRequest,
    ) -> Result<String> {
        request.validate().map_err(Error::from)?;

        let user = self.find_by_claims(claims).await?;

        if !self.users.has_password(&user.id).await? {
            metrics::record_password_update("change", false);
            return Err(Error::credential("Account has no password set"));
        }

        if !self.users.verify_password(&user.id, &request.current_password).await? {
            metrics::record_password_update("change", false);
            warn!(user_id = %user.id, "password change with incorrect current password");
            return Err(Error::credential("Current password is incorrect"));
        }

        self.users
            .set_password(&user.id, &request.new_password, &User::new_security_stamp())
            .await?;

        metrics::record_password_update("change", true);
        info!(user_id = %user.id, "password changed");
        Ok("Password changed successfully".to_string())
    }

    /// Fetch the authenticated user's own profile.
    #[instrument(skip(self, claims), fields(user_id = %claims.uid))]
    pub async fn get_profile(&self, claims: &SessionClaims) -> Result<ProfileResponse> {
        let user = self.find_by_claims(claims).await?;
        let roles = self.roles.list_user_roles(&user.id).await?;
        Ok(ProfileResponse::from_user(user, roles))
    }

    /// Update the authenticated user's username and/or phone number.
    ///
    /// Absent or blank values mean "no change"; a blank value never stomps
    /// an existing one.
    #[instrument(skip(self, claims, request), fields(user_id = %claims.uid))]
    pub async fn update_profile(
        &self,
        claims: &SessionClaims,
        request: UpdateProfileRequest,
    ) -> Result<ProfileResponse> {
        let mut user = self.find_by_claims(claims).await?;

        if let Some(username) = normalize_optional(request.username.as_deref()) {
            user.username = username;
        }
        if let Some(phone) = normalize_optional(request.phone.as_deref()) {
            user.phone = Some(phone);
        }

        let user = self.users.update_user(&user).await?;
        let roles = self.roles.list_user_roles(&user.id).await?;

        info!(user_id = %user.id, "profile updated");
        Ok(ProfileResponse::from_user(user, roles))
    }

    async fn find_by_claims(&self, claims: &SessionClaims) -> Result<User> {
        let email = User::normalize_email(&claims.sub);
        self.users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| Error::not_found("user", email))
    }
}

/// Trim an optional value; blank or whitespace-only becomes `None`.
fn normalize_optional(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_optional_drops_blank_values() {
        assert_eq!(normalize_optional(None), None);
        assert_eq!(normalize_optional(Some("")), None);
        assert_eq!(normalize_optional(Some("   ")), None);
        assert_eq!(normalize_optional(Some("  bob  ")), Some("bob".to_string()));
    }

    #[test]
    fn dummy_hash_is_a_valid_phc_string() {
        assert!(DUMMY_HASH.starts_with("$argon2id$"));
    }
}
