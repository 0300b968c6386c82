//! Customer directory.
//!
//! Contact details only. The balance belongs to [`crate::OrderService`].

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::instrument;

use stockbook_core::AggregateRoot;
use stockbook_events::{EventBus, EventEnvelope};
use stockbook_parties::{Customer, CustomerEvent, CustomerId, CustomerUpdate, NewCustomer};

use crate::dispatcher::{Dispatcher, Outcome};
use crate::error::ServiceError;
use crate::store::DocumentStore;

pub struct CustomerService<S, B> {
    dispatcher: Dispatcher<S, B>,
}

impl<S, B> CustomerService<S, B> {
    pub fn new(dispatcher: Dispatcher<S, B>) -> Self {
        Self { dispatcher }
    }
}

impl<S, B> CustomerService<S, B>
where
    S: DocumentStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Register a customer with no debt. Emails are unique.
    #[instrument(skip(self, input), err)]
    pub fn register(&self, input: NewCustomer) -> Result<Customer, ServiceError> {
        let (mut customer, receipt) = self.dispatcher.execute("customer.register", |_| {
            let now = Utc::now();
            let customer = Customer::register(CustomerId::generate(), input.clone(), now)?;

            let mut outcome = Outcome::new(customer.clone());
            outcome.event(
                customer.id_typed(),
                &CustomerEvent::CustomerRegistered {
                    customer_id: customer.id_typed(),
                    name: customer.name().to_string(),
                    occurred_at: now,
                },
            )?;
            outcome.put(customer);
            Ok(outcome)
        })?;

        receipt.stamp(&mut customer);
        tracing::info!(customer_id = %customer.id_typed(), "customer registered");
        Ok(customer)
    }

    #[instrument(skip(self, update), fields(customer_id = %customer_id), err)]
    pub fn update(&self, customer_id: CustomerId, update: CustomerUpdate) -> Result<Customer, ServiceError> {
        let (mut customer, receipt) = self.dispatcher.execute("customer.update", |store| {
            let now = Utc::now();
            let mut customer = store
                .customer(customer_id)?
                .ok_or_else(|| ServiceError::not_found(format!("customer {customer_id}")))?;
            customer.update_details(update.clone(), now)?;

            let mut outcome = Outcome::new(customer.clone());
            outcome.event(
                customer_id,
                &CustomerEvent::CustomerUpdated {
                    customer_id,
                    occurred_at: now,
                },
            )?;
            outcome.put(customer);
            Ok(outcome)
        })?;

        receipt.stamp(&mut customer);
        tracing::info!("customer updated");
        Ok(customer)
    }

    /// Delete a customer who has no orders left.
    #[instrument(skip(self), fields(customer_id = %customer_id), err)]
    pub fn delete(&self, customer_id: CustomerId) -> Result<Customer, ServiceError> {
        let (customer, _) = self.dispatcher.execute("customer.delete", |store| {
            let ledger = store
                .customer_ledger(customer_id)?
                .ok_or_else(|| ServiceError::not_found(format!("customer {customer_id}")))?;
            if !ledger.orders.is_empty() {
                return Err(ServiceError::InvariantViolation(format!(
                    "customer still has {} order(s); delete them first",
                    ledger.orders.len()
                )));
            }

            let customer = ledger.customer;
            let mut outcome = Outcome::new(customer.clone());
            outcome.delete(customer_id, customer.version());
            outcome.event(
                customer_id,
                &CustomerEvent::CustomerDeleted {
                    customer_id,
                    occurred_at: Utc::now(),
                },
            )?;
            Ok(outcome)
        })?;

        tracing::info!("customer deleted");
        Ok(customer)
    }

    pub fn customer(&self, customer_id: CustomerId) -> Result<Customer, ServiceError> {
        self.dispatcher
            .store()
            .customer(customer_id)?
            .ok_or_else(|| ServiceError::not_found(format!("customer {customer_id}")))
    }

    pub fn customers(&self) -> Result<Vec<Customer>, ServiceError> {
        Ok(self.dispatcher.store().customers()?)
    }
}
