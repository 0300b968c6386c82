use std::collections::HashMap;

use stockbook_auth::{User, UserId};
use stockbook_core::{AggregateId, AggregateRoot, ExpectedVersion};
use stockbook_parties::{Customer, CustomerId};
use stockbook_products::{Product, ProductId};
use stockbook_sales::{Order, OrderId};

/// A stored document of any collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Product(Product),
    Customer(Customer),
    Order(Order),
    User(User),
}

impl Document {
    pub fn key(&self) -> DocumentRef {
        match self {
            Document::Product(p) => DocumentRef::Product(p.id_typed()),
            Document::Customer(c) => DocumentRef::Customer(c.id_typed()),
            Document::Order(o) => DocumentRef::Order(o.id_typed()),
            Document::User(u) => DocumentRef::User(u.id_typed()),
        }
    }

    pub fn version(&self) -> u64 {
        match self {
            Document::Product(p) => p.version(),
            Document::Customer(c) => c.version(),
            Document::Order(o) => o.version(),
            Document::User(u) => u.version(),
        }
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        match self {
            Document::Product(p) => p.set_version(version),
            Document::Customer(c) => c.set_version(version),
            Document::Order(o) => o.set_version(version),
            Document::User(u) => u.set_version(version),
        }
    }
}

impl From<Product> for Document {
    fn from(value: Product) -> Self {
        Document::Product(value)
    }
}

impl From<Customer> for Document {
    fn from(value: Customer) -> Self {
        Document::Customer(value)
    }
}

impl From<Order> for Document {
    fn from(value: Order) -> Self {
        Document::Order(value)
    }
}

impl From<User> for Document {
    fn from(value: User) -> Self {
        Document::User(value)
    }
}

/// Collection + identifier of a document.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocumentRef {
    Product(ProductId),
    Customer(CustomerId),
    Order(OrderId),
    User(UserId),
}

impl DocumentRef {
    pub fn collection(&self) -> &'static str {
        match self {
            DocumentRef::Product(_) => "products",
            DocumentRef::Customer(_) => "customers",
            DocumentRef::Order(_) => "orders",
            DocumentRef::User(_) => "users",
        }
    }

    /// Aggregate type label used on published envelopes.
    pub fn aggregate_type(&self) -> &'static str {
        match self {
            DocumentRef::Product(_) => "products.product",
            DocumentRef::Customer(_) => "parties.customer",
            DocumentRef::Order(_) => "sales.order",
            DocumentRef::User(_) => "auth.user",
        }
    }

    pub fn aggregate_id(&self) -> AggregateId {
        match self {
            DocumentRef::Product(id) => id.0,
            DocumentRef::Customer(id) => id.0,
            DocumentRef::Order(id) => id.0,
            DocumentRef::User(id) => id.0,
        }
    }
}

impl core::fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.collection(), self.aggregate_id())
    }
}

impl From<ProductId> for DocumentRef {
    fn from(value: ProductId) -> Self {
        DocumentRef::Product(value)
    }
}

impl From<CustomerId> for DocumentRef {
    fn from(value: CustomerId) -> Self {
        DocumentRef::Customer(value)
    }
}

impl From<OrderId> for DocumentRef {
    fn from(value: OrderId) -> Self {
        DocumentRef::Order(value)
    }
}

impl From<UserId> for DocumentRef {
    fn from(value: UserId) -> Self {
        DocumentRef::User(value)
    }
}

/// One write inside a [`ChangeSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Insert or replace. `expected` is checked against the stored version
    /// (0 when absent).
    Put {
        document: Document,
        expected: ExpectedVersion,
    },
    Delete {
        target: DocumentRef,
        expected: ExpectedVersion,
    },
}

impl Mutation {
    pub fn target(&self) -> DocumentRef {
        match self {
            Mutation::Put { document, .. } => document.key(),
            Mutation::Delete { target, .. } => *target,
        }
    }
}

/// Writes that commit together or not at all.
///
/// Each write is guarded by the version the document was read at, so a
/// change set built from stale reads is rejected as a whole.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    mutations: Vec<Mutation>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `document`, expecting the store to still hold the version it carries.
    pub fn put(&mut self, document: impl Into<Document>) -> &mut Self {
        let document = document.into();
        let expected = ExpectedVersion::Exact(document.version());
        self.mutations.push(Mutation::Put { document, expected });
        self
    }

    pub fn delete(&mut self, target: impl Into<DocumentRef>, version: u64) -> &mut Self {
        self.mutations.push(Mutation::Delete {
            target: target.into(),
            expected: ExpectedVersion::Exact(version),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }
}

/// Versions assigned by a successful commit (0 for deleted documents).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    versions: HashMap<DocumentRef, u64>,
}

impl CommitReceipt {
    pub(crate) fn record(&mut self, target: DocumentRef, version: u64) {
        self.versions.insert(target, version);
    }

    pub fn version_of(&self, target: impl Into<DocumentRef>) -> Option<u64> {
        self.versions.get(&target.into()).copied()
    }

    /// Bring a locally held copy up to the version it was committed at.
    pub fn stamp<A>(&self, aggregate: &mut A)
    where
        A: AggregateRoot,
        A::Id: Copy + Into<DocumentRef>,
    {
        if let Some(version) = self.version_of(*aggregate.id()) {
            aggregate.set_version(version);
        }
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}
