//! Repository traits and their PostgreSQL implementations.

mod role;
mod user;

pub use role::{RoleRepository, SqlxRoleRepository};
pub use user::{SqlxUserRepository, UserRepository};
