//! Transactional document store boundary.
//!
//! Services read documents, decide all changes in memory, and hand the store
//! one [`ChangeSet`] per operation. The store is the only place where
//! versions are checked and assigned.

pub mod change_set;
pub mod in_memory;
pub mod r#trait;

pub use change_set::{ChangeSet, CommitReceipt, Document, DocumentRef, Mutation};
pub use in_memory::InMemoryDocumentStore;
pub use r#trait::{CustomerLedger, DocumentStore, StoreError};
