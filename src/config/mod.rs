//! # Configuration Management
//!
//! Process-wide configuration for the Gatehouse account service. Loaded
//! once at startup from environment variables and read-only afterwards.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Token signing and claim configuration
    pub auth: AuthConfig,

    /// Outbound SMTP configuration
    pub smtp: SmtpConfig,

    /// Verification/reset link configuration
    pub links: LinkConfig,
}

impl AppConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database: DatabaseConfig::from_env()?,
            auth: AuthConfig::from_env()?,
            smtp: SmtpConfig::from_env()?,
            links: LinkConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        if !self.database.url.starts_with("postgresql://") && !self.database.url.starts_with("postgres://") {
            return Err(Error::config("Database URL must start with 'postgresql://'"));
        }

        if self.auth.jwt_secret.len() < 32 {
            return Err(Error::config("JWT secret must be at least 32 characters long"));
        }

        if self.auth.token_key.len() < 32 {
            return Err(Error::config("Purpose-token key must be at least 32 characters long"));
        }

        for (name, base) in
            [("verify", &self.links.verify_base_url), ("reset", &self.links.reset_base_url)]
        {
            url::Url::parse(base).map_err(|e| {
                Error::config(format!("Invalid {} link base URL '{}': {}", name, base, e))
            })?;
        }

        Ok(())
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Connection timeout in seconds
    pub connect_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/gatehouse".to_string(),
            max_connections: 10,
            connect_timeout_seconds: 10,
        }
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            url: std::env::var("GATEHOUSE_DATABASE_URL").unwrap_or(defaults.url),
            max_connections: env_parse("GATEHOUSE_DATABASE_MAX_CONNECTIONS", defaults.max_connections)?,
            connect_timeout_seconds: env_parse(
                "GATEHOUSE_DATABASE_CONNECT_TIMEOUT_SECONDS",
                defaults.connect_timeout_seconds,
            )?,
        })
    }

    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

/// Token signing configuration: session JWT key/claims and the purpose-token key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Symmetric key for signing session tokens (HS256)
    pub jwt_secret: String,

    /// Issuer claim stamped into and required of session tokens
    pub issuer: String,

    /// Audience claim stamped into and required of session tokens
    pub audience: String,

    /// Key for deriving single-use purpose tokens (confirm-email, reset-password)
    pub token_key: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            issuer: "gatehouse".to_string(),
            audience: "gatehouse-clients".to_string(),
            token_key: String::new(),
        }
    }
}

impl AuthConfig {
    fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            jwt_secret: std::env::var("GATEHOUSE_JWT_SECRET")
                .map_err(|_| Error::config("GATEHOUSE_JWT_SECRET must be set"))?,
            issuer: std::env::var("GATEHOUSE_JWT_ISSUER").unwrap_or(defaults.issuer),
            audience: std::env::var("GATEHOUSE_JWT_AUDIENCE").unwrap_or(defaults.audience),
            token_key: std::env::var("GATEHOUSE_TOKEN_KEY")
                .map_err(|_| Error::config("GATEHOUSE_TOKEN_KEY must be set"))?,
        })
    }
}

/// Outbound SMTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            server: "localhost".to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from_email: "no-reply@localhost".to_string(),
            from_name: "Gatehouse".to_string(),
        }
    }
}

impl SmtpConfig {
    fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            server: std::env::var("GATEHOUSE_SMTP_SERVER").unwrap_or(defaults.server),
            port: env_parse("GATEHOUSE_SMTP_PORT", defaults.port)?,
            username: std::env::var("GATEHOUSE_SMTP_USER").unwrap_or(defaults.username),
            password: std::env::var("GATEHOUSE_SMTP_PASS").unwrap_or(defaults.password),
            from_email: std::env::var("GATEHOUSE_SMTP_FROM").unwrap_or(defaults.from_email),
            from_name: std::env::var("GATEHOUSE_SMTP_FROM_NAME").unwrap_or(defaults.from_name),
        })
    }
}

/// Base URLs for links embedded in outbound emails
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Base URL of the email-verification endpoint
    pub verify_base_url: String,

    /// Base URL of the password-reset endpoint
    pub reset_base_url: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            verify_base_url: "http://localhost:5194/api/account/verify_email".to_string(),
            reset_base_url: "http://localhost:5194/api/account/reset_password".to_string(),
        }
    }
}

impl LinkConfig {
    fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            verify_base_url: std::env::var("GATEHOUSE_VERIFY_LINK_BASE")
                .unwrap_or(defaults.verify_base_url),
            reset_base_url: std::env::var("GATEHOUSE_RESET_LINK_BASE")
                .unwrap_or(defaults.reset_base_url),
        })
    }
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) => raw.parse().map_err(|e| Error::config(format!("Invalid {}: {}", var, e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            auth: AuthConfig {
                jwt_secret: "0123456789abcdef0123456789abcdef".to_string(),
                token_key: "fedcba9876543210fedcba9876543210".to_string(),
                ..AuthConfig::default()
            },
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_valid_config_passes_validation() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_short_jwt_secret_rejected() {
        let mut config = valid_config();
        config.auth.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_short_token_key_rejected() {
        let mut config = valid_config();
        config.auth.token_key = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_postgres_database_url_rejected() {
        let mut config = valid_config();
        config.database.url = "sqlite://./gatehouse.db".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_link_base_rejected() {
        let mut config = valid_config();
        config.links.reset_base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }
}
