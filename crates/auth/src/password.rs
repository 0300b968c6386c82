//! Password policy and bcrypt hashing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    /// The password does not satisfy the policy.
    #[error("{0}")]
    Policy(String),

    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// Rules a new password must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    /// bcrypt work factor used when hashing.
    pub cost: u32,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

const SPECIAL_CHARS: &str = "@$!%*?&";

impl PasswordPolicy {
    pub fn with_cost(cost: u32) -> Self {
        Self {
            cost,
            ..Self::default()
        }
    }

    /// At least `min_length` characters, one letter and one digit, using only
    /// ASCII letters, digits and `@$!%*?&`.
    pub fn check(&self, password: &str) -> Result<(), PasswordError> {
        if password.chars().count() < self.min_length {
            return Err(PasswordError::Policy(format!(
                "password must be at least {} characters",
                self.min_length
            )));
        }
        if let Some(bad) = password
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !SPECIAL_CHARS.contains(*c))
        {
            return Err(PasswordError::Policy(format!(
                "password contains an unsupported character: {bad:?}"
            )));
        }
        if !password.chars().any(|c| c.is_ascii_alphabetic()) {
            return Err(PasswordError::Policy(
                "password must contain at least one letter".to_string(),
            ));
        }
        if !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(PasswordError::Policy(
                "password must contain at least one digit".to_string(),
            ));
        }
        Ok(())
    }

    /// Check `password` against the policy and hash it.
    pub fn hash(&self, password: &str) -> Result<PasswordHash, PasswordError> {
        self.check(password)?;
        Ok(PasswordHash(bcrypt::hash(password, self.cost)?))
    }
}

/// A bcrypt hash. `Debug` never prints the hash itself.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Constant outcome for malformed hashes: they never verify.
    pub fn verify(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.0).unwrap_or(false)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("PasswordHash(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_policy() -> PasswordPolicy {
        PasswordPolicy::with_cost(4)
    }

    #[test]
    fn accepts_letters_digits_and_specials() {
        assert!(fast_policy().check("abc12345").is_ok());
        assert!(fast_policy().check("P@ssw0rd!").is_ok());
    }

    #[test]
    fn rejects_short_passwords() {
        let err = fast_policy().check("ab1").unwrap_err();
        assert!(matches!(err, PasswordError::Policy(msg) if msg.contains("at least 8")));
    }

    #[test]
    fn rejects_missing_letter_or_digit() {
        assert!(fast_policy().check("12345678").is_err());
        assert!(fast_policy().check("abcdefgh").is_err());
    }

    #[test]
    fn rejects_characters_outside_the_allowed_set() {
        assert!(fast_policy().check("abcd 1234").is_err());
        assert!(fast_policy().check("abcd#1234").is_err());
    }

    #[test]
    fn hash_verifies_only_the_original_password() {
        let hash = fast_policy().hash("secret123").unwrap();
        assert!(hash.verify("secret123"));
        assert!(!hash.verify("secret124"));
        assert!(!format!("{hash:?}").contains(hash.as_str()));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        let hash = PasswordHash("not-a-bcrypt-hash".to_string());
        assert!(!hash.verify("anything1"));
    }
}
