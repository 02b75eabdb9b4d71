//! Validation helpers for account-related requests.

use lazy_static::lazy_static;
use regex::Regex;
use validator::{Validate, ValidationError, ValidationErrors};

use super::user::{
    ChangePasswordRequest, ForgotPasswordRequest, RegisterRequest, ResetPasswordRequest,
};

lazy_static! {
    // Email validation: basic RFC 5322 compliant pattern
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    )
    .expect("EMAIL_REGEX should be a valid regex pattern");

    // Phone validation: optional leading +, digits with common separators
    static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9][0-9 ()./-]{5,19}$")
        .expect("PHONE_REGEX should be a valid regex pattern");
}

/// Minimum password length requirement
const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length to prevent DoS
const MAX_PASSWORD_LENGTH: usize = 128;

/// Validate email format
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if EMAIL_REGEX.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_email"))
    }
}

/// Validate password strength
/// Requirements:
/// - At least 8 characters
/// - At most 128 characters (to prevent DoS)
/// - Contains at least one uppercase letter
/// - Contains at least one lowercase letter
/// - Contains at least one digit
/// - Contains at least one special character
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::new("password_too_short"));
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::new("password_too_long"));
    }

    let has_uppercase = password.chars().any(|c| c.is_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_numeric());
    let has_special = password.chars().any(|c| !c.is_alphanumeric());

    if !has_uppercase {
        return Err(ValidationError::new("password_missing_uppercase"));
    }

    if !has_lowercase {
        return Err(ValidationError::new("password_missing_lowercase"));
    }

    if !has_digit {
        return Err(ValidationError::new("password_missing_digit"));
    }

    if !has_special {
        return Err(ValidationError::new("password_missing_special"));
    }

    Ok(())
}

/// Validate username (non-empty, reasonable length)
pub fn validate_username(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::new("username_empty"));
    }

    if trimmed.len() > 255 {
        return Err(ValidationError::new("username_too_long"));
    }

    Ok(())
}

/// Validate phone number format
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if PHONE_REGEX.is_match(phone) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_phone"))
    }
}

// Manual Validate impls: each collects every field violation so the caller
// can report them all at once.

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(err) = validate_email(&self.email) {
            errors.add("email", err);
        }

        if let Err(err) = validate_username(&self.username) {
            errors.add("username", err);
        }

        if let Err(err) = validate_password(&self.password) {
            errors.add("password", err);
        }

        if self.confirm_password.is_empty() {
            errors.add("confirmPassword", ValidationError::new("confirm_password_empty"));
        }

        if let Some(phone) = &self.phone {
            if let Err(err) = validate_phone(phone) {
                errors.add("phone", err);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Validate for ForgotPasswordRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(err) = validate_email(&self.email) {
            errors.add("email", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Validate for ResetPasswordRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(err) = validate_email(&self.email) {
            errors.add("email", err);
        }

        if self.token.trim().is_empty() {
            errors.add("token", ValidationError::new("token_empty"));
        }

        if let Err(err) = validate_password(&self.new_password) {
            errors.add("newPassword", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Validate for ChangePasswordRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.current_password.is_empty() {
            errors.add("currentPassword", ValidationError::new("current_password_empty"));
        }

        if let Err(err) = validate_password(&self.new_password) {
            errors.add("newPassword", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
