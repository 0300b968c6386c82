//! `stockbook-auth`: local user accounts.
//!
//! Password policy, bcrypt hashing and the `User` document. No sessions or
//! tokens: authentication is a single name/password check.

pub mod password;
pub mod user;

pub use password::{PasswordError, PasswordHash, PasswordPolicy};
pub use user::{User, UserEvent, UserId};
