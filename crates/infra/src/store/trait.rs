use std::sync::Arc;

use thiserror::Error;

use stockbook_auth::{User, UserId};
use stockbook_parties::{Customer, CustomerId};
use stockbook_products::{Product, ProductId};
use stockbook_sales::{Order, OrderId};

use super::change_set::{ChangeSet, CommitReceipt};

/// Document store operation error.
///
/// Infrastructure errors only; business rule failures are `DomainError`s and
/// never reach the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write's expected version did not match the stored one.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// A unique field (customer email, user name) is already taken.
    #[error("{0}")]
    UniqueViolation(String),

    /// The change set itself is malformed (e.g. touches a document twice).
    #[error("invalid change set: {0}")]
    InvalidChangeSet(String),

    /// The snapshot could not be read or written.
    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// A customer document together with every order that references it, read
/// in one consistent view.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerLedger {
    pub customer: Customer,
    pub orders: Vec<Order>,
}

/// Transactional document store for products, customers, orders and users.
///
/// ## Commit semantics
///
/// `commit()`:
/// - checks every write's expected version against the stored version
/// - assigns each written document `stored_version + 1`
/// - checks unique fields over the resulting state
/// - applies every write or none of them
///
/// Reads return owned copies; nothing a caller does to them is visible until
/// it is committed.
pub trait DocumentStore: Send + Sync {
    fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    fn products(&self) -> Result<Vec<Product>, StoreError>;

    fn customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError>;

    fn customers(&self) -> Result<Vec<Customer>, StoreError>;

    /// A customer and their orders, or `None` when the customer is unknown.
    fn customer_ledger(&self, id: CustomerId) -> Result<Option<CustomerLedger>, StoreError>;

    fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// All orders, oldest first.
    fn orders(&self) -> Result<Vec<Order>, StoreError>;

    fn orders_for_customer(&self, id: CustomerId) -> Result<Vec<Order>, StoreError>;

    fn user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    fn user_by_name(&self, name: &str) -> Result<Option<User>, StoreError>;

    /// Apply a change set atomically.
    fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt, StoreError>;
}

impl<S> DocumentStore for Arc<S>
where
    S: DocumentStore + ?Sized,
{
    fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).product(id)
    }

    fn products(&self) -> Result<Vec<Product>, StoreError> {
        (**self).products()
    }

    fn customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        (**self).customer(id)
    }

    fn customers(&self) -> Result<Vec<Customer>, StoreError> {
        (**self).customers()
    }

    fn customer_ledger(&self, id: CustomerId) -> Result<Option<CustomerLedger>, StoreError> {
        (**self).customer_ledger(id)
    }

    fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        (**self).order(id)
    }

    fn orders(&self) -> Result<Vec<Order>, StoreError> {
        (**self).orders()
    }

    fn orders_for_customer(&self, id: CustomerId) -> Result<Vec<Order>, StoreError> {
        (**self).orders_for_customer(id)
    }

    fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        (**self).user(id)
    }

    fn user_by_name(&self, name: &str) -> Result<Option<User>, StoreError> {
        (**self).user_by_name(name)
    }

    fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt, StoreError> {
        (**self).commit(changes)
    }
}
