//! Outbound email delivery for verification and reset links.
//!
//! The orchestrator only depends on the [`Notifier`] trait; the SMTP
//! implementation lives here so tests can substitute a recording stub.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use std::fmt::{Display, Formatter};
use tracing::{info, instrument};

use crate::config::SmtpConfig;
use crate::errors::{Error, Result};
use crate::observability::metrics;

/// Which template an outbound email uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    Confirm,
    Reset,
}

impl EmailKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailKind::Confirm => "confirm",
            EmailKind::Reset => "reset",
        }
    }
}

impl Display for EmailKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Build a verification or reset link: `<base>?userId=<id>&token=<encoded>`.
///
/// Tokens are URL-safe by construction (base64 URL alphabet), so no further
/// escaping is applied.
pub fn build_link(base: &str, user_id: &str, token: &str) -> String {
    format!("{}?userId={}&token={}", base, user_id, token)
}

/// Contract the delivery transport must satisfy.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to_email: &str, link: &str, kind: EmailKind) -> Result<()>;
}

/// SMTP notifier backed by lettre's async transport (STARTTLS).
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)
            .map_err(|err| Error::config(format!("Invalid SMTP relay '{}': {}", config.server, err)))?
            .port(config.port)
            .credentials(Credentials::new(config.username.clone(), config.password.clone()))
            .build();

        let from = format!("{} <{}>", config.from_name, config.from_email)
            .parse()
            .map_err(|err| Error::config(format!("Invalid from address: {}", err)))?;

        Ok(Self { transport, from })
    }

    fn subject(kind: EmailKind) -> &'static str {
        match kind {
            EmailKind::Confirm => "Verify your account",
            EmailKind::Reset => "Password reset request",
        }
    }

    fn body(kind: EmailKind, link: &str) -> String {
        match kind {
            EmailKind::Confirm => format!(
                "<h2>Verify your account</h2>\
                 <p>Please click the link below to verify your email address:</p>\
                 <p><a href='{link}'>Verify now</a></p>\
                 <p>If you did not sign up, you can ignore this email.</p>"
            ),
            EmailKind::Reset => format!(
                "<h2>Password reset request</h2>\
                 <p>We received a request to reset the password for your account.</p>\
                 <p><a href='{link}'>Reset password</a></p>\
                 <p>If you did not request a password reset, ignore this email; \
                 your password will not be changed.</p>"
            ),
        }
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    #[instrument(skip(self, link), fields(kind = %kind))]
    async fn send(&self, to_email: &str, link: &str, kind: EmailKind) -> Result<()> {
        let to = to_email
            .parse()
            .map_err(|err| Error::notification(format!("Invalid recipient address: {}", err)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(Self::subject(kind))
            .header(ContentType::TEXT_HTML)
            .body(Self::body(kind, link))
            .map_err(|err| Error::notification(format!("Failed to build email: {}", err)))?;

        self.transport.send(message).await.map_err(|err| {
            metrics::record_email_sent(kind.as_str(), false);
            Error::notification(format!("Failed to send email: {}", err))
        })?;

        metrics::record_email_sent(kind.as_str(), true);
        info!(kind = %kind, "notification email dispatched");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_shape() {
        let link = build_link("https://app.example.com/verify", "u-1", "tok_abc");
        assert_eq!(link, "https://app.example.com/verify?userId=u-1&token=tok_abc");
    }

    #[test]
    fn email_kind_display() {
        assert_eq!(EmailKind::Confirm.to_string(), "confirm");
        assert_eq!(EmailKind::Reset.to_string(), "reset");
    }

    #[test]
    fn bodies_embed_the_link() {
        let link = "https://app.example.com/r?userId=u&token=t";
        assert!(SmtpNotifier::body(EmailKind::Confirm, link).contains(link));
        assert!(SmtpNotifier::body(EmailKind::Reset, link).contains(link));
    }

    #[test]
    fn subjects_differ_by_kind() {
        assert_ne!(SmtpNotifier::subject(EmailKind::Confirm), SmtpNotifier::subject(EmailKind::Reset));
    }
}
