//! Infrastructure layer: document store, configuration, and the services
//! that run every business operation as one atomic commit.

pub mod catalog_service;
pub mod config;
pub mod customer_service;
pub mod dispatcher;
pub mod error;
pub mod order_service;
pub mod services;
pub mod store;
pub mod user_service;

#[cfg(test)]
mod test_fixtures;


pub use catalog_service::CatalogService;
pub use config::{AppConfig, ConfigError, RestockPolicy};
pub use customer_service::CustomerService;
pub use dispatcher::{Dispatcher, Outcome, PendingEvent};
pub use error::{ErrorKind, ServiceError};
pub use order_service::{NewOrderLine, OrderService};
pub use services::Services;
pub use store::{ChangeSet, CommitReceipt, DocumentStore, InMemoryDocumentStore, StoreError};
pub use user_service::UserService;
