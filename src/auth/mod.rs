//! # Account & Authentication
//!
//! User account lifecycle: registration with email verification, login
//! with JWT session tokens, password reset/change, and profile management.
//!
//! The pieces compose as follows: [`AccountService`] orchestrates the
//! flows over a [`UserRepository`]/[`RoleRepository`] pair, minting
//! stamp-bound purpose tokens through [`PurposeTokenService`] and session
//! tokens through [`SessionTokenService`], and delivering links through a
//! [`Notifier`].
//!
//! [`UserRepository`]: crate::storage::repositories::UserRepository
//! [`RoleRepository`]: crate::storage::repositories::RoleRepository
//! [`Notifier`]: crate::notify::Notifier

pub mod account_service;
pub mod hashing;
pub mod purpose_token;
pub mod session;
pub mod user;
pub mod validation;

pub use account_service::{AccountService, RegistrationOutcome, VerificationOutcome, DEFAULT_ROLE};
pub use purpose_token::{PurposeTokenService, TokenPurpose};
pub use session::{IssuedSessionToken, SessionClaims, SessionTokenService};
pub use user::{
    ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, NewUser, ProfileResponse,
    RegisterRequest, ResetPasswordRequest, UpdateProfileRequest, User,
};
