//! Application service bundle.

use serde_json::Value as JsonValue;

use stockbook_auth::PasswordPolicy;
use stockbook_events::{EventBus, EventEnvelope};

use crate::catalog_service::CatalogService;
use crate::config::AppConfig;
use crate::customer_service::CustomerService;
use crate::dispatcher::Dispatcher;
use crate::order_service::OrderService;
use crate::store::DocumentStore;
use crate::user_service::UserService;

/// Every service, sharing one store and one bus.
pub struct Services<S, B> {
    pub catalog: CatalogService<S, B>,
    pub customers: CustomerService<S, B>,
    pub orders: OrderService<S, B>,
    pub users: UserService<S, B>,
}

impl<S, B> Services<S, B>
where
    S: DocumentStore + Clone,
    B: EventBus<EventEnvelope<JsonValue>> + Clone,
{
    pub fn new(store: S, bus: B, config: &AppConfig) -> Self {
        let dispatcher = || Dispatcher::new(store.clone(), bus.clone(), config.max_commit_retries);
        Self {
            catalog: CatalogService::new(dispatcher()),
            customers: CustomerService::new(dispatcher()),
            orders: OrderService::new(dispatcher(), config.restock_policy),
            users: UserService::new(dispatcher(), PasswordPolicy::with_cost(config.bcrypt_cost)),
        }
    }
}
