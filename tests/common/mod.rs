//! Shared test support: in-memory repositories and a recording notifier
//! so account flows can be exercised without Postgres or SMTP.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use gatehouse::auth::{AccountService, PurposeTokenService, SessionTokenService};
use gatehouse::auth::user::{NewUser, RegisterRequest, User};
use gatehouse::config::{AuthConfig, LinkConfig};
use gatehouse::domain::UserId;
use gatehouse::errors::{Error, Result};
use gatehouse::notify::{EmailKind, Notifier};
use gatehouse::storage::repositories::{RoleRepository, UserRepository};

/// In-memory credential store. Passwords are kept as plain text; the
/// double only has to answer "does this candidate match", not hash.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<String, (User, Option<String>)>>,
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create_user(&self, user: NewUser, password: &str) -> Result<User> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|(u, _)| u.email == user.email) {
            return Err(Error::conflict(
                format!("Email '{}' is already registered", user.email),
                "user",
            ));
        }

        let now = Utc::now();
        let stored = User {
            id: user.id.clone(),
            email: user.email,
            username: user.username,
            phone: user.phone,
            email_confirmed: user.email_confirmed,
            security_stamp: user.security_stamp,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id.to_string(), (stored.clone(), Some(password.to_string())));
        Ok(stored)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>> {
        Ok(self.users.lock().unwrap().get(id.as_str()).map(|(u, _)| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|(u, _)| u.email == email)
            .map(|(u, _)| u.clone()))
    }

    async fn update_user(&self, user: &User) -> Result<User> {
        let mut users = self.users.lock().unwrap();
        let (stored, _) = users
            .get_mut(user.id.as_str())
            .ok_or_else(|| Error::not_found("user", user.id.as_str()))?;

        stored.username = user.username.clone();
        stored.phone = user.phone.clone();
        stored.email_confirmed = user.email_confirmed;
        stored.security_stamp = user.security_stamp.clone();
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn verify_password(&self, id: &UserId, candidate: &str) -> Result<bool> {
        let users = self.users.lock().unwrap();
        let (_, password) = users
            .get(id.as_str())
            .ok_or_else(|| Error::not_found("user", id.as_str()))?;
        Ok(password.as_deref() == Some(candidate))
    }

    async fn has_password(&self, id: &UserId) -> Result<bool> {
        let users = self.users.lock().unwrap();
        let (_, password) = users
            .get(id.as_str())
            .ok_or_else(|| Error::not_found("user", id.as_str()))?;
        Ok(password.is_some())
    }

    async fn set_password(
        &self,
        id: &UserId,
        new_password: &str,
        security_stamp: &str,
    ) -> Result<()> {
        let mut users = self.users.lock().unwrap();
        let (stored, password) = users
            .get_mut(id.as_str())
            .ok_or_else(|| Error::not_found("user", id.as_str()))?;

        *password = Some(new_password.to_string());
        stored.security_stamp = security_stamp.to_string();
        stored.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryRoleRepository {
    roles: Mutex<HashSet<String>>,
    assignments: Mutex<HashMap<String, BTreeSet<String>>>,
}

#[async_trait]
impl RoleRepository for InMemoryRoleRepository {
    async fn ensure_role(&self, name: &str) -> Result<()> {
        self.roles.lock().unwrap().insert(name.to_string());
        Ok(())
    }

    async fn role_exists(&self, name: &str) -> Result<bool> {
        Ok(self.roles.lock().unwrap().contains(name))
    }

    async fn assign_role(&self, user_id: &UserId, role: &str) -> Result<()> {
        self.assignments
            .lock()
            .unwrap()
            .entry(user_id.to_string())
            .or_default()
            .insert(role.to_string());
        Ok(())
    }

    async fn list_user_roles(&self, user_id: &UserId) -> Result<Vec<String>> {
        Ok(self
            .assignments
            .lock()
            .unwrap()
            .get(user_id.as_str())
            .map(|roles| roles.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub link: String,
    pub kind: EmailKind,
}

/// Notifier double that records every send and can be toggled to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentEmail>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn fail_next_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last(&self) -> SentEmail {
        self.sent.lock().unwrap().last().expect("no email was sent").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, to_email: &str, link: &str, kind: EmailKind) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::notification("simulated delivery failure"));
        }
        self.sent.lock().unwrap().push(SentEmail {
            to: to_email.to_string(),
            link: link.to_string(),
            kind,
        });
        Ok(())
    }
}

pub struct Harness {
    pub service: AccountService,
    pub users: Arc<InMemoryUserRepository>,
    pub roles: Arc<InMemoryRoleRepository>,
    pub notifier: Arc<RecordingNotifier>,
    pub sessions: SessionTokenService,
}

impl Harness {
    pub fn new() -> Self {
        let auth = AuthConfig {
            jwt_secret: "0123456789abcdef0123456789abcdef".to_string(),
            issuer: "gatehouse".to_string(),
            audience: "gatehouse-clients".to_string(),
            token_key: "fedcba9876543210fedcba9876543210".to_string(),
        };
        let links = LinkConfig {
            verify_base_url: "http://localhost:5194/api/account/verify_email".to_string(),
            reset_base_url: "http://localhost:5194/api/account/reset_password".to_string(),
        };

        let users = Arc::new(InMemoryUserRepository::default());
        let roles = Arc::new(InMemoryRoleRepository::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let sessions = SessionTokenService::new(&auth);

        let service = AccountService::new(
            users.clone(),
            roles.clone(),
            notifier.clone(),
            PurposeTokenService::new(auth.token_key.as_bytes().to_vec()),
            sessions.clone(),
            links,
        );

        Self { service, users, roles, notifier, sessions }
    }

    /// Register an account with a known-good password.
    pub async fn register(&self, email: &str) -> gatehouse::auth::RegistrationOutcome {
        self.service
            .register(register_request(email))
            .await
            .expect("registration failed")
    }

    /// Register and complete email verification via the emailed link.
    pub async fn register_verified(&self, email: &str) -> gatehouse::auth::RegistrationOutcome {
        let outcome = self.register(email).await;
        let (user_id, token) = parse_link(&self.notifier.last().link);
        self.service
            .verify_email(&user_id, &token)
            .await
            .expect("verification failed");
        outcome
    }
}

pub fn register_request(email: &str) -> RegisterRequest {
    RegisterRequest {
        email: email.to_string(),
        username: email.split('@').next().unwrap_or("user").to_string(),
        password: "Pass1234!".to_string(),
        confirm_password: "Pass1234!".to_string(),
        phone: None,
        pre_verified: false,
    }
}

/// Pull `userId` and `token` back out of an emailed link.
pub fn parse_link(link: &str) -> (String, String) {
    let (_, query) = link.split_once('?').expect("link has no query string");
    let mut user_id = None;
    let mut token = None;
    for pair in query.split('&') {
        match pair.split_once('=') {
            Some(("userId", value)) => user_id = Some(value.to_string()),
            Some(("token", value)) => token = Some(value.to_string()),
            _ => {}
        }
    }
    (user_id.expect("link has no userId"), token.expect("link has no token"))
}
