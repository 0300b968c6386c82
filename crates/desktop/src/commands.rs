//! Command handlers behind the bridge channels.
//!
//! Each handler takes typed input, runs the service call on the blocking
//! pool (services are synchronous and password hashing is slow), and
//! returns a typed result.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use thiserror::Error;

use stockbook_events::{EventEnvelope, InMemoryEventBus};
use stockbook_infra::{
    AppConfig, ErrorKind, InMemoryDocumentStore, NewOrderLine, ServiceError, Services,
};
use stockbook_parties::{CustomerId, CustomerUpdate, NewCustomer};
use stockbook_products::{NewProduct, Product, ProductId, ShapeKind};
use stockbook_sales::{ItemRevision, OrderId, OrderItemId};

use crate::types::{CustomerView, OrderView, UserView};

pub type Store = Arc<InMemoryDocumentStore>;
pub type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type AppServices = Services<Store, Bus>;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid payload: {0}")]
    InvalidPayload(#[source] serde_json::Error),

    #[error("unknown channel {0:?}")]
    UnknownChannel(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("could not encode response: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("operation aborted: {0}")]
    Aborted(#[from] tokio::task::JoinError),
}

impl CommandError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            CommandError::InvalidPayload(_) | CommandError::UnknownChannel(_) => {
                Some(ErrorKind::InvalidInput)
            }
            CommandError::Service(err) => Some(err.kind()),
            CommandError::Encode(_) | CommandError::Aborted(_) => None,
        }
    }
}

/// Application state shared across command handlers.
#[derive(Clone)]
pub struct AppState {
    services: Arc<AppServices>,
    bus: Bus,
}

impl AppState {
    pub fn new(store: Store, config: &AppConfig) -> Self {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let services = Arc::new(Services::new(store, bus.clone(), config));
        Self { services, bus }
    }

    /// Open the configured snapshot file, or start empty in memory.
    pub fn open(config: &AppConfig) -> Result<Self, ServiceError> {
        let store = match &config.data_file {
            Some(path) => InMemoryDocumentStore::open(path)?,
            None => {
                tracing::info!("no data file configured, state is kept in memory only");
                InMemoryDocumentStore::new()
            }
        };
        Ok(Self::new(Arc::new(store), config))
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    async fn run<T, F>(&self, call: F) -> Result<T, CommandError>
    where
        F: FnOnce(&AppServices) -> Result<T, ServiceError> + Send + 'static,
        T: Send + 'static,
    {
        let services = self.services.clone();
        Ok(tokio::task::spawn_blocking(move || call(&services)).await??)
    }
}

// Products

pub async fn create_product(state: &AppState, input: NewProduct) -> Result<Product, CommandError> {
    state.run(move |s| s.catalog.create_product(input)).await
}

pub async fn delete_product(state: &AppState, id: ProductId) -> Result<Product, CommandError> {
    state.run(move |s| s.catalog.delete_product(id)).await
}

pub async fn fetch_product(state: &AppState, id: ProductId) -> Result<Product, CommandError> {
    state.run(move |s| s.catalog.product(id)).await
}

pub async fn fetch_products(state: &AppState) -> Result<Vec<Product>, CommandError> {
    state.run(|s| s.catalog.products()).await
}

pub async fn fetch_products_by_shape(
    state: &AppState,
    shape: ShapeKind,
) -> Result<Vec<Product>, CommandError> {
    state.run(move |s| s.catalog.products_by_shape(shape)).await
}

pub async fn adjust_stock(state: &AppState, id: ProductId, delta: i64) -> Result<Product, CommandError> {
    state.run(move |s| s.catalog.adjust_stock(id, delta)).await
}

// Customers

pub async fn create_customer(state: &AppState, input: NewCustomer) -> Result<CustomerView, CommandError> {
    let customer = state.run(move |s| s.customers.register(input)).await?;
    Ok(customer.into())
}

pub async fn update_customer(
    state: &AppState,
    id: CustomerId,
    update: CustomerUpdate,
) -> Result<CustomerView, CommandError> {
    let customer = state.run(move |s| s.customers.update(id, update)).await?;
    Ok(customer.into())
}

pub async fn delete_customer(state: &AppState, id: CustomerId) -> Result<CustomerView, CommandError> {
    let customer = state.run(move |s| s.customers.delete(id)).await?;
    Ok(customer.into())
}

pub async fn fetch_customer(state: &AppState, id: CustomerId) -> Result<CustomerView, CommandError> {
    let customer = state.run(move |s| s.customers.customer(id)).await?;
    Ok(customer.into())
}

pub async fn fetch_customers(state: &AppState) -> Result<Vec<CustomerView>, CommandError> {
    let customers = state.run(|s| s.customers.customers()).await?;
    Ok(customers.into_iter().map(CustomerView::from).collect())
}

pub async fn reconcile_customer(state: &AppState, id: CustomerId) -> Result<CustomerView, CommandError> {
    let customer = state.run(move |s| s.orders.reconcile_customer(id)).await?;
    Ok(customer.into())
}

/// Repair every customer balance. Returns how many were corrected.
pub async fn reconcile_all(state: &AppState) -> Result<usize, CommandError> {
    state.run(|s| s.orders.reconcile_all()).await
}

// Orders

pub async fn create_order(
    state: &AppState,
    customer_id: CustomerId,
    lines: Vec<NewOrderLine>,
) -> Result<OrderView, CommandError> {
    let order = state
        .run(move |s| s.orders.create_order(customer_id, &lines))
        .await?;
    Ok(order.into())
}

pub async fn update_order(
    state: &AppState,
    id: OrderId,
    items: Vec<ItemRevision>,
) -> Result<OrderView, CommandError> {
    let order = state.run(move |s| s.orders.revise_order(id, &items)).await?;
    Ok(order.into())
}

pub async fn delete_order(state: &AppState, id: OrderId) -> Result<OrderView, CommandError> {
    let order = state.run(move |s| s.orders.delete_order(id)).await?;
    Ok(order.into())
}

pub async fn delete_order_item(
    state: &AppState,
    order_id: OrderId,
    item_id: OrderItemId,
) -> Result<OrderView, CommandError> {
    let order = state
        .run(move |s| s.orders.delete_item(order_id, item_id))
        .await?;
    Ok(order.into())
}

pub async fn toggle_paid(state: &AppState, id: OrderId) -> Result<OrderView, CommandError> {
    let order = state.run(move |s| s.orders.toggle_paid(id)).await?;
    Ok(order.into())
}

pub async fn mark_paid(state: &AppState, id: OrderId) -> Result<OrderView, CommandError> {
    let order = state.run(move |s| s.orders.mark_paid(id)).await?;
    Ok(order.into())
}

pub async fn mark_unpaid(state: &AppState, id: OrderId) -> Result<OrderView, CommandError> {
    let order = state.run(move |s| s.orders.mark_unpaid(id)).await?;
    Ok(order.into())
}

pub async fn fetch_order(state: &AppState, id: OrderId) -> Result<OrderView, CommandError> {
    let order = state.run(move |s| s.orders.order(id)).await?;
    Ok(order.into())
}

pub async fn fetch_orders(state: &AppState) -> Result<Vec<OrderView>, CommandError> {
    let orders = state.run(|s| s.orders.orders()).await?;
    Ok(orders.into_iter().map(OrderView::from).collect())
}

pub async fn fetch_orders_by_customer(
    state: &AppState,
    customer_id: CustomerId,
) -> Result<Vec<OrderView>, CommandError> {
    let orders = state
        .run(move |s| s.orders.orders_for_customer(customer_id))
        .await?;
    Ok(orders.into_iter().map(OrderView::from).collect())
}

// Users

pub async fn create_user(state: &AppState, name: String, password: String) -> Result<UserView, CommandError> {
    let user = state.run(move |s| s.users.register(&name, &password)).await?;
    Ok(user.into())
}

pub async fn authenticate(state: &AppState, name: String, password: String) -> Result<UserView, CommandError> {
    let user = state
        .run(move |s| s.users.authenticate(&name, &password))
        .await?;
    Ok(user.into())
}
