//! Service-level error model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockbook_auth::PasswordError;
use stockbook_core::DomainError;

use crate::store::StoreError;

/// Coarse classification of a failed operation, as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    OutOfStock,
    InvalidInput,
    InvariantViolation,
    Conflict,
    PersistenceFailure,
    Unauthorized,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("not enough stock for {product}: requested {requested}, available {available}")]
    OutOfStock {
        product: String,
        requested: u64,
        available: u64,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    InvariantViolation(String),

    /// Stale read detected at commit; the operation may be retried.
    #[error("concurrent modification: {0}")]
    Concurrency(String),

    /// Not retryable: a unique key is taken, or retries were exhausted.
    #[error("{0}")]
    Conflict(String),

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("{0}")]
    Unauthorized(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::OutOfStock { .. } => ErrorKind::OutOfStock,
            ServiceError::InvalidInput(_) => ErrorKind::InvalidInput,
            ServiceError::InvariantViolation(_) => ErrorKind::InvariantViolation,
            ServiceError::Concurrency(_) | ServiceError::Conflict(_) => ErrorKind::Conflict,
            ServiceError::Persistence(_) => ErrorKind::PersistenceFailure,
            ServiceError::Unauthorized(_) => ErrorKind::Unauthorized,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Concurrency(_))
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        ServiceError::NotFound(what.into())
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => ServiceError::InvalidInput(msg),
            DomainError::InvalidId(msg) => ServiceError::InvalidInput(msg),
            DomainError::InvariantViolation(msg) => ServiceError::InvariantViolation(msg),
            DomainError::NotFound(what) => ServiceError::NotFound(what),
            DomainError::OutOfStock {
                product,
                requested,
                available,
            } => ServiceError::OutOfStock {
                product,
                requested,
                available,
            },
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
            DomainError::Unauthorized => ServiceError::Unauthorized("unauthorized".to_string()),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => ServiceError::Concurrency(msg),
            StoreError::UniqueViolation(msg) => ServiceError::Conflict(msg),
            StoreError::InvalidChangeSet(msg) => ServiceError::Persistence(msg),
            StoreError::Persistence(msg) => ServiceError::Persistence(msg),
            StoreError::Poisoned => ServiceError::Persistence("store lock poisoned".to_string()),
        }
    }
}

impl From<PasswordError> for ServiceError {
    fn from(value: PasswordError) -> Self {
        match value {
            PasswordError::Policy(msg) => ServiceError::InvalidInput(msg),
            PasswordError::Hash(e) => ServiceError::Persistence(format!("password hashing failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_kinds() {
        let cases = [
            (DomainError::validation("x"), ErrorKind::InvalidInput),
            (DomainError::invalid_id("x"), ErrorKind::InvalidInput),
            (DomainError::invariant("x"), ErrorKind::InvariantViolation),
            (DomainError::not_found("order 1"), ErrorKind::NotFound),
            (DomainError::out_of_stock("A", 10, 3), ErrorKind::OutOfStock),
            (DomainError::conflict("x"), ErrorKind::Conflict),
            (DomainError::Unauthorized, ErrorKind::Unauthorized),
        ];
        for (err, kind) in cases {
            assert_eq!(ServiceError::from(err).kind(), kind);
        }
    }

    #[test]
    fn only_store_concurrency_is_retryable() {
        assert!(ServiceError::from(StoreError::Concurrency("x".into())).is_retryable());
        assert!(!ServiceError::from(StoreError::UniqueViolation("x".into())).is_retryable());
        assert_eq!(
            ServiceError::from(StoreError::Persistence("disk full".into())).kind(),
            ErrorKind::PersistenceFailure
        );
    }

    #[test]
    fn out_of_stock_message_names_the_product() {
        let err = ServiceError::from(DomainError::out_of_stock("Oak board", 10, 3));
        assert_eq!(
            err.to_string(),
            "not enough stock for Oak board: requested 10, available 3"
        );
    }
}
