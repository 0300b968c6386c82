use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use stockbook_auth::{User, UserId};
use stockbook_core::{AggregateRoot, ExpectedVersion};
use stockbook_parties::{Customer, CustomerId};
use stockbook_products::{Product, ProductId};
use stockbook_sales::{Order, OrderId};

use super::change_set::{ChangeSet, CommitReceipt, Document, DocumentRef, Mutation};
use super::r#trait::{CustomerLedger, DocumentStore, StoreError};

#[derive(Debug, Clone, Default)]
struct Tables {
    products: BTreeMap<ProductId, Product>,
    customers: BTreeMap<CustomerId, Customer>,
    orders: BTreeMap<OrderId, Order>,
    users: BTreeMap<UserId, User>,
}

impl Tables {
    fn version_of(&self, target: DocumentRef) -> u64 {
        match target {
            DocumentRef::Product(id) => self.products.get(&id).map(|d| d.version()),
            DocumentRef::Customer(id) => self.customers.get(&id).map(|d| d.version()),
            DocumentRef::Order(id) => self.orders.get(&id).map(|d| d.version()),
            DocumentRef::User(id) => self.users.get(&id).map(|d| d.version()),
        }
        .unwrap_or(0)
    }

    fn insert(&mut self, document: Document) {
        match document {
            Document::Product(p) => {
                self.products.insert(p.id_typed(), p);
            }
            Document::Customer(c) => {
                self.customers.insert(c.id_typed(), c);
            }
            Document::Order(o) => {
                self.orders.insert(o.id_typed(), o);
            }
            Document::User(u) => {
                self.users.insert(u.id_typed(), u);
            }
        }
    }

    fn remove(&mut self, target: DocumentRef) {
        match target {
            DocumentRef::Product(id) => {
                self.products.remove(&id);
            }
            DocumentRef::Customer(id) => {
                self.customers.remove(&id);
            }
            DocumentRef::Order(id) => {
                self.orders.remove(&id);
            }
            DocumentRef::User(id) => {
                self.users.remove(&id);
            }
        }
    }

    /// Unique fields are checked for the documents written in this commit only.
    fn check_unique(&self, written: &HashSet<DocumentRef>) -> Result<(), StoreError> {
        for target in written {
            match target {
                DocumentRef::Customer(id) => {
                    let Some(customer) = self.customers.get(id) else {
                        continue;
                    };
                    let taken = self
                        .customers
                        .values()
                        .any(|other| other.id_typed() != *id && other.email() == customer.email());
                    if taken {
                        return Err(StoreError::UniqueViolation(format!(
                            "a customer with email {} already exists",
                            customer.email()
                        )));
                    }
                }
                DocumentRef::User(id) => {
                    let Some(user) = self.users.get(id) else {
                        continue;
                    };
                    let taken = self
                        .users
                        .values()
                        .any(|other| other.id_typed() != *id && other.name() == user.name());
                    if taken {
                        return Err(StoreError::UniqueViolation(format!(
                            "user name {} is already taken",
                            user.name()
                        )));
                    }
                }
                DocumentRef::Product(_) | DocumentRef::Order(_) => {}
            }
        }
        Ok(())
    }
}

/// On-disk layout of the snapshot file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    products: Vec<Product>,
    #[serde(default)]
    customers: Vec<Customer>,
    #[serde(default)]
    orders: Vec<Order>,
    #[serde(default)]
    users: Vec<User>,
}

impl From<&Tables> for Snapshot {
    fn from(tables: &Tables) -> Self {
        Self {
            products: tables.products.values().cloned().collect(),
            customers: tables.customers.values().cloned().collect(),
            orders: tables.orders.values().cloned().collect(),
            users: tables.users.values().cloned().collect(),
        }
    }
}

impl From<Snapshot> for Tables {
    fn from(snapshot: Snapshot) -> Self {
        let mut tables = Tables::default();
        for p in snapshot.products {
            tables.insert(Document::Product(p));
        }
        for c in snapshot.customers {
            tables.insert(Document::Customer(c));
        }
        for o in snapshot.orders {
            tables.insert(Document::Order(o));
        }
        for u in snapshot.users {
            tables.insert(Document::User(u));
        }
        tables
    }
}

/// In-memory document store, optionally mirrored to a JSON snapshot file.
///
/// Commits are validated against a copy of the tables and swapped in only
/// when every check passed and the snapshot (if any) was written. A failed
/// snapshot write therefore leaves the in-memory state unchanged too.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    tables: RwLock<Tables>,
    snapshot_path: Option<PathBuf>,
}

impl InMemoryDocumentStore {
    /// Volatile store (tests, demos).
    pub fn new() -> Self {
        Self::default()
    }

    /// Store backed by `path`. Loads the snapshot if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let tables = if path.exists() {
            let bytes = std::fs::read(&path).map_err(|e| {
                StoreError::Persistence(format!("reading {}: {e}", path.display()))
            })?;
            let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
                StoreError::Persistence(format!("parsing {}: {e}", path.display()))
            })?;
            let tables = Tables::from(snapshot);
            tracing::info!(
                path = %path.display(),
                products = tables.products.len(),
                customers = tables.customers.len(),
                orders = tables.orders.len(),
                users = tables.users.len(),
                "loaded snapshot"
            );
            tables
        } else {
            tracing::info!(path = %path.display(), "no snapshot yet, starting empty");
            Tables::default()
        };

        Ok(Self {
            tables: RwLock::new(tables),
            snapshot_path: Some(path),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&tables))
    }
}

fn check_expected(
    target: DocumentRef,
    expected: ExpectedVersion,
    current: u64,
) -> Result<(), StoreError> {
    if expected.matches(current) {
        Ok(())
    } else {
        Err(StoreError::Concurrency(format!(
            "{target}: expected {expected:?}, found {current}"
        )))
    }
}

fn write_snapshot(path: &Path, tables: &Tables) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(&Snapshot::from(tables))
        .map_err(|e| StoreError::Persistence(format!("serializing snapshot: {e}")))?;

    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)
        .map_err(|e| StoreError::Persistence(format!("writing {}: {e}", tmp.display())))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| StoreError::Persistence(format!("replacing {}: {e}", path.display())))?;
    Ok(())
}

impl DocumentStore for InMemoryDocumentStore {
    fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        self.read(|t| t.products.get(&id).cloned())
    }

    fn products(&self) -> Result<Vec<Product>, StoreError> {
        self.read(|t| t.products.values().cloned().collect())
    }

    fn customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        self.read(|t| t.customers.get(&id).cloned())
    }

    fn customers(&self) -> Result<Vec<Customer>, StoreError> {
        self.read(|t| t.customers.values().cloned().collect())
    }

    fn customer_ledger(&self, id: CustomerId) -> Result<Option<CustomerLedger>, StoreError> {
        self.read(|t| {
            t.customers.get(&id).map(|customer| CustomerLedger {
                customer: customer.clone(),
                orders: t
                    .orders
                    .values()
                    .filter(|o| o.customer_id() == id)
                    .cloned()
                    .collect(),
            })
        })
    }

    fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.read(|t| t.orders.get(&id).cloned())
    }

    fn orders(&self) -> Result<Vec<Order>, StoreError> {
        // Order ids are UUIDv7, so key order is creation order.
        self.read(|t| t.orders.values().cloned().collect())
    }

    fn orders_for_customer(&self, id: CustomerId) -> Result<Vec<Order>, StoreError> {
        self.read(|t| {
            t.orders
                .values()
                .filter(|o| o.customer_id() == id)
                .cloned()
                .collect()
        })
    }

    fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.read(|t| t.users.get(&id).cloned())
    }

    fn user_by_name(&self, name: &str) -> Result<Option<User>, StoreError> {
        self.read(|t| t.users.values().find(|u| u.name() == name).cloned())
    }

    fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt, StoreError> {
        if changes.is_empty() {
            return Ok(CommitReceipt::default());
        }

        let mut tables = self.tables.write().map_err(|_| StoreError::Poisoned)?;
        let mut next = tables.clone();
        let mut written = HashSet::new();
        let mut receipt = CommitReceipt::default();

        for mutation in changes.into_mutations() {
            let target = mutation.target();
            if !written.insert(target) {
                return Err(StoreError::InvalidChangeSet(format!(
                    "{target} is written more than once"
                )));
            }
            let current = next.version_of(target);

            match mutation {
                Mutation::Put {
                    mut document,
                    expected,
                } => {
                    check_expected(target, expected, current)?;
                    let version = current + 1;
                    document.set_version(version);
                    next.insert(document);
                    receipt.record(target, version);
                }
                Mutation::Delete { expected, .. } => {
                    if current == 0 {
                        return Err(StoreError::Concurrency(format!("{target} no longer exists")));
                    }
                    check_expected(target, expected, current)?;
                    next.remove(target);
                    receipt.record(target, 0);
                }
            }
        }

        next.check_unique(&written)?;

        if let Some(path) = &self.snapshot_path {
            write_snapshot(path, &next)?;
        }

        *tables = next;
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::*;

    #[test]
    fn put_assigns_version_one_to_new_documents() {
        let store = InMemoryDocumentStore::new();
        let mut product = product("Oak", 5, 10);

        let mut changes = ChangeSet::new();
        changes.put(product.clone());
        let receipt = store.commit(changes).unwrap();

        assert_eq!(receipt.version_of(product.id_typed()), Some(1));
        receipt.stamp(&mut product);
        assert_eq!(product.version(), 1);
        assert_eq!(store.product(product.id_typed()).unwrap(), Some(product));
    }

    #[test]
    fn stale_write_is_rejected() {
        let store = InMemoryDocumentStore::new();
        let product = seed_product(&store, "Oak", 5, 10);

        let mut first = product.clone();
        first.adjust_stock(1, now()).unwrap();
        let mut changes = ChangeSet::new();
        changes.put(first);
        store.commit(changes).unwrap();

        let mut second = product;
        second.adjust_stock(2, now()).unwrap();
        let mut changes = ChangeSet::new();
        changes.put(second);
        let err = store.commit(changes).unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));
    }

    #[test]
    fn creating_an_existing_document_is_rejected() {
        let store = InMemoryDocumentStore::new();
        let product = seed_product(&store, "Oak", 5, 10);

        let mut fresh = product.clone();
        fresh.set_version(0);
        let mut changes = ChangeSet::new();
        changes.put(fresh);
        assert!(matches!(
            store.commit(changes),
            Err(StoreError::Concurrency(_))
        ));
    }

    #[test]
    fn failed_commit_applies_nothing() {
        let store = InMemoryDocumentStore::new();
        let stale = seed_product(&store, "Stale", 5, 10);
        let mut bumped = stale.clone();
        bumped.adjust_stock(1, now()).unwrap();
        let mut changes = ChangeSet::new();
        changes.put(bumped);
        store.commit(changes).unwrap();

        let newcomer = product("New", 1, 1);
        let mut changes = ChangeSet::new();
        changes.put(newcomer.clone());
        changes.put(stale);
        assert!(store.commit(changes).is_err());

        assert_eq!(store.product(newcomer.id_typed()).unwrap(), None);
        assert_eq!(store.products().unwrap().len(), 1);
    }

    #[test]
    fn touching_a_document_twice_is_invalid() {
        let store = InMemoryDocumentStore::new();
        let product = product("Oak", 5, 10);
        let mut changes = ChangeSet::new();
        changes.put(product.clone());
        changes.put(product);
        assert!(matches!(
            store.commit(changes),
            Err(StoreError::InvalidChangeSet(_))
        ));
    }

    #[test]
    fn delete_checks_version_and_existence() {
        let store = InMemoryDocumentStore::new();
        let product = seed_product(&store, "Oak", 5, 10);

        let mut changes = ChangeSet::new();
        changes.delete(product.id_typed(), 7);
        assert!(matches!(
            store.commit(changes),
            Err(StoreError::Concurrency(_))
        ));

        let mut changes = ChangeSet::new();
        changes.delete(product.id_typed(), product.version());
        let receipt = store.commit(changes).unwrap();
        assert_eq!(receipt.version_of(product.id_typed()), Some(0));
        assert_eq!(store.product(product.id_typed()).unwrap(), None);

        let mut changes = ChangeSet::new();
        changes.delete(product.id_typed(), product.version());
        assert!(store.commit(changes).is_err());
    }

    #[test]
    fn duplicate_customer_email_is_rejected() {
        let store = InMemoryDocumentStore::new();
        seed_customer(&store, "Ada", "ada@example.com");

        let mut changes = ChangeSet::new();
        changes.put(customer("Other Ada", "ADA@example.com"));
        let err = store.commit(changes).unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
        assert_eq!(store.customers().unwrap().len(), 1);
    }

    #[test]
    fn ledger_collects_customer_orders() {
        let store = InMemoryDocumentStore::new();
        let ada = seed_customer(&store, "Ada", "ada@example.com");
        let bob = seed_customer(&store, "Bob", "bob@example.com");
        let oak = product("Oak", 5, 10);

        let mut changes = ChangeSet::new();
        changes.put(order_for(&ada, &[(&oak, 1)]));
        changes.put(order_for(&bob, &[(&oak, 2)]));
        changes.put(order_for(&ada, &[(&oak, 3)]));
        store.commit(changes).unwrap();

        let ledger = store.customer_ledger(ada.id_typed()).unwrap().unwrap();
        assert_eq!(ledger.customer.id_typed(), ada.id_typed());
        assert_eq!(ledger.orders.len(), 2);
        assert_eq!(store.orders_for_customer(bob.id_typed()).unwrap().len(), 1);
        assert!(store.customer_ledger(stockbook_parties::CustomerId::generate()).unwrap().is_none());
    }

    #[test]
    fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stockbook.json");

        let store = InMemoryDocumentStore::open(&path).unwrap();
        let product = seed_product(&store, "Oak", 5, 10);
        let ada = seed_customer(&store, "Ada", "ada@example.com");
        drop(store);

        let reopened = InMemoryDocumentStore::open(&path).unwrap();
        let loaded = reopened.product(product.id_typed()).unwrap().unwrap();
        assert_eq!(loaded, product);
        assert_eq!(loaded.version(), 1);
        assert_eq!(reopened.customer(ada.id_typed()).unwrap(), Some(ada));
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn failed_snapshot_write_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("stockbook.json");
        let store = InMemoryDocumentStore::open(&path).unwrap();

        let mut changes = ChangeSet::new();
        changes.put(product("Oak", 5, 10));
        let err = store.commit(changes).unwrap_err();
        assert!(matches!(err, StoreError::Persistence(_)));
        assert!(store.products().unwrap().is_empty());
    }

    #[test]
    fn corrupt_snapshot_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stockbook.json");
        std::fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(
            InMemoryDocumentStore::open(&path),
            Err(StoreError::Persistence(_))
        ));
    }
}
