//! Metrics collection for account lifecycle operations.
//!
//! Counters are recorded through the `metrics` facade; they are no-ops
//! until the embedding process installs a recorder.

use metrics::counter;

/// Record an authentication attempt outcome
/// (`success`, `invalid_credentials`).
pub fn record_authentication(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!("account_authentications_total", &labels).increment(1);
}

/// Record a registration attempt outcome
/// (`success`, `validation_failed`, `conflict`, `store_rejected`).
pub fn record_registration(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!("account_registrations_total", &labels).increment(1);
}

/// Record an email verification outcome
/// (`confirmed`, `already_confirmed`, `token_rejected`).
pub fn record_email_verification(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!("account_email_verifications_total", &labels).increment(1);
}

/// Record a purpose-token mint event
pub fn record_purpose_token_minted(purpose: &str) {
    let labels = [("purpose", purpose.to_string())];
    counter!("purpose_tokens_minted_total", &labels).increment(1);
}

/// Record a purpose-token validation outcome
pub fn record_purpose_token_validated(purpose: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    let labels = [("purpose", purpose.to_string()), ("status", status.to_string())];
    counter!("purpose_tokens_validated_total", &labels).increment(1);
}

/// Record a password change/reset outcome
pub fn record_password_update(operation: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    let labels = [("operation", operation.to_string()), ("status", status.to_string())];
    counter!("password_updates_total", &labels).increment(1);
}

/// Record an outbound email dispatch outcome
pub fn record_email_sent(kind: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    let labels = [("kind", kind.to_string()), ("status", status.to_string())];
    counter!("notification_emails_total", &labels).increment(1);
}
