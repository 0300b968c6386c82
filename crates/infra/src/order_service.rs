//! Order reconciliation: orders, the stock they hold, and customer balances.
//!
//! Every operation here commits the order, each product whose stock moved,
//! and the owning customer in one change set. The customer is written even
//! when their balance did not move, so two operations on the same customer's
//! orders can never interleave: the second one sees a stale customer version
//! and is re-run.

use std::collections::BTreeMap;
use std::iter;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::instrument;

use stockbook_core::AggregateRoot;
use stockbook_events::{EventBus, EventEnvelope};
use stockbook_parties::{Customer, CustomerEvent, CustomerId};
use stockbook_products::{Product, ProductEvent, ProductId};
use stockbook_sales::{
    ItemRevision, Order, OrderEvent, OrderId, OrderItem, OrderItemId, OrderStatus, PlannedItem,
    outstanding_balance, plan_revision,
};

use crate::config::RestockPolicy;
use crate::dispatcher::{Dispatcher, Outcome};
use crate::error::ServiceError;
use crate::store::DocumentStore;

/// A requested line of a new order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Products read during one decide step and the net stock movement applied
/// to each of them so far.
struct StockMoves<'s, S> {
    store: &'s S,
    now: DateTime<Utc>,
    touched: BTreeMap<ProductId, (Product, i64)>,
}

impl<'s, S: DocumentStore> StockMoves<'s, S> {
    fn new(store: &'s S, now: DateTime<Utc>) -> Self {
        Self {
            store,
            now,
            touched: BTreeMap::new(),
        }
    }

    fn load(&mut self, id: ProductId) -> Result<Option<&mut (Product, i64)>, ServiceError> {
        if !self.touched.contains_key(&id) {
            match self.store.product(id)? {
                Some(product) => {
                    self.touched.insert(id, (product, 0));
                }
                None => return Ok(None),
            }
        }
        Ok(self.touched.get_mut(&id))
    }

    /// The product as it stands after the moves so far.
    fn current(&mut self, id: ProductId) -> Result<&Product, ServiceError> {
        let (product, _) = self
            .load(id)?
            .ok_or_else(|| ServiceError::not_found(format!("product {id}")))?;
        Ok(&*product)
    }

    fn take(&mut self, id: ProductId, quantity: u32) -> Result<&Product, ServiceError> {
        let now = self.now;
        let (product, delta) = self
            .load(id)?
            .ok_or_else(|| ServiceError::not_found(format!("product {id}")))?;
        product.reserve(quantity, now)?;
        *delta -= i64::from(quantity);
        Ok(&*product)
    }

    fn give_back(&mut self, id: ProductId, quantity: u32) -> Result<(), ServiceError> {
        let now = self.now;
        match self.load(id)? {
            Some((product, delta)) => {
                product.release(quantity, now)?;
                *delta += i64::from(quantity);
            }
            None => {
                tracing::warn!(product_id = %id, quantity, "product no longer exists, units not returned to stock");
            }
        }
        Ok(())
    }

    fn apply(&mut self, id: ProductId, delta: i64) -> Result<(), ServiceError> {
        let quantity = u32::try_from(delta.unsigned_abs())
            .map_err(|_| ServiceError::InvalidInput("stock movement too large".to_string()))?;
        match delta.signum() {
            1 => self.give_back(id, quantity),
            -1 => self.take(id, quantity).map(|_| ()),
            _ => Ok(()),
        }
    }

    /// Write every product whose stock actually moved.
    fn finish<T>(self, outcome: &mut Outcome<T>) -> Result<(), ServiceError> {
        let now = self.now;
        for (id, (product, delta)) in self.touched {
            if delta == 0 {
                continue;
            }
            outcome.event(
                id,
                &ProductEvent::StockAdjusted {
                    product_id: id,
                    delta,
                    quantity: product.quantity(),
                    occurred_at: now,
                },
            )?;
            outcome.put(product);
        }
        Ok(())
    }
}

/// Recompute `customer`'s balance from `orders` (their orders as they will be
/// after this commit) and write the customer.
fn settle<'a, T>(
    outcome: &mut Outcome<T>,
    mut customer: Customer,
    orders: impl IntoIterator<Item = &'a Order>,
    now: DateTime<Utc>,
) -> Result<Customer, ServiceError> {
    let balance = outstanding_balance(orders)?;
    if let Some(previous) = customer.reconcile_balance(balance, now) {
        outcome.event(
            customer.id_typed(),
            &CustomerEvent::BalanceReconciled {
                customer_id: customer.id_typed(),
                previous,
                total_price: balance,
                status: customer.status(),
                occurred_at: now,
            },
        )?;
    }
    outcome.put(customer.clone());
    Ok(customer)
}

/// Settle the owner of `order` with `order` replacing (or, when `None`,
/// removing) its stored version.
fn settle_owner<S: DocumentStore, T>(
    store: &S,
    outcome: &mut Outcome<T>,
    customer_id: CustomerId,
    order_id: OrderId,
    order: Option<&Order>,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let Some(ledger) = store.customer_ledger(customer_id)? else {
        tracing::warn!(customer_id = %customer_id, order_id = %order_id, "order references a missing customer");
        return Ok(());
    };
    let others = ledger.orders.iter().filter(|o| o.id_typed() != order_id);
    settle(outcome, ledger.customer, others.chain(order), now)?;
    Ok(())
}

pub struct OrderService<S, B> {
    dispatcher: Dispatcher<S, B>,
    restock: RestockPolicy,
}

impl<S, B> OrderService<S, B> {
    pub fn new(dispatcher: Dispatcher<S, B>, restock: RestockPolicy) -> Self {
        Self {
            dispatcher,
            restock,
        }
    }

    pub fn restock_policy(&self) -> RestockPolicy {
        self.restock
    }
}

impl<S, B> OrderService<S, B>
where
    S: DocumentStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Reserve stock for every line, snapshot current prices, and open a
    /// not-paid order for the customer.
    #[instrument(skip(self, lines), fields(customer_id = %customer_id, lines = lines.len()), err)]
    pub fn create_order(
        &self,
        customer_id: CustomerId,
        lines: &[NewOrderLine],
    ) -> Result<Order, ServiceError> {
        if lines.is_empty() {
            return Err(ServiceError::InvalidInput(
                "an order needs at least one item".to_string(),
            ));
        }
        if lines.iter().any(|line| line.quantity == 0) {
            return Err(ServiceError::InvalidInput("quantity must be positive".to_string()));
        }

        let (mut order, receipt) = self.dispatcher.execute("order.create", |store| {
            let now = Utc::now();
            let ledger = store
                .customer_ledger(customer_id)?
                .ok_or_else(|| ServiceError::not_found(format!("customer {customer_id}")))?;

            let mut stock = StockMoves::new(store, now);
            let mut items = Vec::with_capacity(lines.len());
            for line in lines {
                let product = stock.take(line.product_id, line.quantity)?;
                items.push(OrderItem::snapshot(product, line.quantity)?);
            }
            let order = Order::place(OrderId::generate(), customer_id, items, now)?;

            let mut outcome = Outcome::new(order.clone());
            stock.finish(&mut outcome)?;
            outcome.event(
                order.id_typed(),
                &OrderEvent::OrderPlaced {
                    order_id: order.id_typed(),
                    customer_id,
                    total: order.total(),
                    occurred_at: now,
                },
            )?;
            outcome.put(order.clone());
            settle(
                &mut outcome,
                ledger.customer,
                ledger.orders.iter().chain(iter::once(&order)),
                now,
            )?;
            Ok(outcome)
        })?;

        receipt.stamp(&mut order);
        tracing::info!(order_id = %order.id_typed(), total = order.total(), "order created");
        Ok(order)
    }

    /// Replace the item list of a not-paid order, moving stock by the
    /// difference.
    #[instrument(skip(self, revisions), fields(order_id = %order_id, lines = revisions.len()), err)]
    pub fn revise_order(
        &self,
        order_id: OrderId,
        revisions: &[ItemRevision],
    ) -> Result<Order, ServiceError> {
        let (mut order, receipt) = self.dispatcher.execute("order.revise", |store| {
            let now = Utc::now();
            let mut order = store
                .order(order_id)?
                .ok_or_else(|| ServiceError::not_found(format!("order {order_id}")))?;
            let plan = plan_revision(&order, revisions)?;
            tracing::debug!(
                removed = plan.removed.len(),
                moved_products = plan.stock_deltas.len(),
                "planned revision"
            );

            let mut stock = StockMoves::new(store, now);
            for (product_id, delta) in &plan.stock_deltas {
                stock.apply(*product_id, *delta)?;
            }

            let mut items = Vec::with_capacity(plan.items.len());
            for planned in plan.items {
                match planned {
                    PlannedItem::Existing(item) => items.push(item),
                    PlannedItem::New {
                        product_id,
                        quantity,
                    } => {
                        let product = stock.current(product_id)?;
                        items.push(OrderItem::snapshot(product, quantity)?);
                    }
                }
            }
            order.replace_items(items, now)?;

            let mut outcome = Outcome::new(order.clone());
            stock.finish(&mut outcome)?;
            outcome.event(
                order_id,
                &OrderEvent::OrderRevised {
                    order_id,
                    total: order.total(),
                    occurred_at: now,
                },
            )?;
            outcome.put(order.clone());
            settle_owner(store, &mut outcome, order.customer_id(), order_id, Some(&order), now)?;
            Ok(outcome)
        })?;

        receipt.stamp(&mut order);
        tracing::info!(total = order.total(), "order revised");
        Ok(order)
    }

    /// Remove an order. Returns the order as it was.
    #[instrument(skip(self), fields(order_id = %order_id), err)]
    pub fn delete_order(&self, order_id: OrderId) -> Result<Order, ServiceError> {
        let restock = self.restock;
        let (order, _) = self.dispatcher.execute("order.delete", |store| {
            let now = Utc::now();
            let order = store
                .order(order_id)?
                .ok_or_else(|| ServiceError::not_found(format!("order {order_id}")))?;

            let mut stock = StockMoves::new(store, now);
            if restock == RestockPolicy::Restock {
                for (product_id, quantity) in order.reserved_quantities() {
                    stock.give_back(product_id, quantity)?;
                }
            }

            let mut outcome = Outcome::new(order.clone());
            stock.finish(&mut outcome)?;
            outcome.delete(order_id, order.version());
            outcome.event(
                order_id,
                &OrderEvent::OrderDeleted {
                    order_id,
                    customer_id: order.customer_id(),
                    occurred_at: now,
                },
            )?;
            settle_owner(store, &mut outcome, order.customer_id(), order_id, None, now)?;
            Ok(outcome)
        })?;

        tracing::info!(restock = ?restock, "order deleted");
        Ok(order)
    }

    /// Remove one line from a not-paid order.
    #[instrument(skip(self), fields(order_id = %order_id, item_id = %item_id), err)]
    pub fn delete_item(&self, order_id: OrderId, item_id: OrderItemId) -> Result<Order, ServiceError> {
        let restock = self.restock;
        let (mut order, receipt) = self.dispatcher.execute("order.delete_item", |store| {
            let now = Utc::now();
            let mut order = store
                .order(order_id)?
                .ok_or_else(|| ServiceError::not_found(format!("order {order_id}")))?;
            let removed = order.remove_item(item_id, now)?;

            let mut stock = StockMoves::new(store, now);
            if restock == RestockPolicy::Restock {
                stock.give_back(removed.product_id(), removed.quantity())?;
            }

            let mut outcome = Outcome::new(order.clone());
            stock.finish(&mut outcome)?;
            outcome.event(
                order_id,
                &OrderEvent::OrderItemRemoved {
                    order_id,
                    item_id,
                    total: order.total(),
                    occurred_at: now,
                },
            )?;
            outcome.put(order.clone());
            settle_owner(store, &mut outcome, order.customer_id(), order_id, Some(&order), now)?;
            Ok(outcome)
        })?;

        receipt.stamp(&mut order);
        tracing::info!(total = order.total(), "order item deleted");
        Ok(order)
    }

    /// Flip paid/not paid.
    pub fn toggle_paid(&self, order_id: OrderId) -> Result<Order, ServiceError> {
        self.change_status(order_id, None)
    }

    pub fn mark_paid(&self, order_id: OrderId) -> Result<Order, ServiceError> {
        self.change_status(order_id, Some(OrderStatus::Paid))
    }

    pub fn mark_unpaid(&self, order_id: OrderId) -> Result<Order, ServiceError> {
        self.change_status(order_id, Some(OrderStatus::NotPaid))
    }

    /// `None` toggles. The customer is settled even when the status is
    /// already the requested one.
    #[instrument(skip(self), fields(order_id = %order_id), err)]
    fn change_status(
        &self,
        order_id: OrderId,
        target: Option<OrderStatus>,
    ) -> Result<Order, ServiceError> {
        let (mut order, receipt) = self.dispatcher.execute("order.set_status", |store| {
            let now = Utc::now();
            let mut order = store
                .order(order_id)?
                .ok_or_else(|| ServiceError::not_found(format!("order {order_id}")))?;

            let changed = match target {
                None => {
                    order.toggle_paid(now);
                    true
                }
                Some(status) => order.set_status(status, now),
            };

            let mut outcome = Outcome::new(order.clone());
            if changed {
                outcome.event(
                    order_id,
                    &OrderEvent::PaymentStatusChanged {
                        order_id,
                        status: order.status(),
                        occurred_at: now,
                    },
                )?;
                outcome.put(order.clone());
            }
            settle_owner(store, &mut outcome, order.customer_id(), order_id, Some(&order), now)?;
            Ok(outcome)
        })?;

        receipt.stamp(&mut order);
        tracing::info!(status = %order.status(), "order status set");
        Ok(order)
    }

    pub fn order(&self, order_id: OrderId) -> Result<Order, ServiceError> {
        self.dispatcher
            .store()
            .order(order_id)?
            .ok_or_else(|| ServiceError::not_found(format!("order {order_id}")))
    }

    pub fn orders(&self) -> Result<Vec<Order>, ServiceError> {
        Ok(self.dispatcher.store().orders()?)
    }

    pub fn orders_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Order>, ServiceError> {
        let ledger = self
            .dispatcher
            .store()
            .customer_ledger(customer_id)?
            .ok_or_else(|| ServiceError::not_found(format!("customer {customer_id}")))?;
        Ok(ledger.orders)
    }

    /// Recompute one customer's balance from their not-paid orders, writing
    /// it only if it drifted.
    pub fn reconcile_customer(&self, customer_id: CustomerId) -> Result<Customer, ServiceError> {
        self.reconcile(customer_id).map(|(customer, _)| customer)
    }

    /// Reconcile every customer. Returns how many were corrected.
    #[instrument(skip(self), err)]
    pub fn reconcile_all(&self) -> Result<usize, ServiceError> {
        let mut corrected = 0;
        for customer in self.dispatcher.store().customers()? {
            match self.reconcile(customer.id_typed()) {
                Ok((_, true)) => corrected += 1,
                Ok((_, false)) => {}
                // Deleted since the listing.
                Err(ServiceError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        tracing::info!(corrected, "customer balances reconciled");
        Ok(corrected)
    }

    fn reconcile(&self, customer_id: CustomerId) -> Result<(Customer, bool), ServiceError> {
        let ((mut customer, corrected), receipt) =
            self.dispatcher.execute("customer.reconcile", |store| {
                let now = Utc::now();
                let ledger = store
                    .customer_ledger(customer_id)?
                    .ok_or_else(|| ServiceError::not_found(format!("customer {customer_id}")))?;
                let balance = outstanding_balance(&ledger.orders)?;

                let mut customer = ledger.customer;
                let previous = customer.reconcile_balance(balance, now);
                let mut outcome = Outcome::new((customer.clone(), previous.is_some()));
                if let Some(previous) = previous {
                    tracing::warn!(
                        customer_id = %customer_id,
                        previous,
                        total_price = balance,
                        "customer balance drifted from orders, correcting"
                    );
                    outcome.event(
                        customer_id,
                        &CustomerEvent::BalanceReconciled {
                            customer_id,
                            previous,
                            total_price: balance,
                            status: customer.status(),
                            occurred_at: now,
                        },
                    )?;
                    outcome.put(customer);
                }
                Ok(outcome)
            })?;

        receipt.stamp(&mut customer);
        Ok((customer, corrected))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use stockbook_events::InMemoryEventBus;
    use stockbook_parties::DebtStatus;

    use super::*;
    use crate::store::{ChangeSet, InMemoryDocumentStore};
    use crate::test_fixtures::*;

    type Store = Arc<InMemoryDocumentStore>;
    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

    fn service(restock: RestockPolicy) -> (OrderService<Store, Bus>, Store, Bus) {
        let store: Store = Arc::new(InMemoryDocumentStore::new());
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let dispatcher = Dispatcher::new(store.clone(), bus.clone(), 3);
        (OrderService::new(dispatcher, restock), store, bus)
    }

    fn line(product: &Product, quantity: u32) -> NewOrderLine {
        NewOrderLine {
            product_id: product.id_typed(),
            quantity,
        }
    }

    fn stock_of(store: &Store, product: &Product) -> u32 {
        store.product(product.id_typed()).unwrap().unwrap().quantity()
    }

    fn balance_of(store: &Store, customer: &Customer) -> (u64, DebtStatus) {
        let c = store.customer(customer.id_typed()).unwrap().unwrap();
        (c.total_price(), c.status())
    }

    #[test]
    fn create_reserves_stock_and_charges_customer() {
        let (orders, store, _) = service(RestockPolicy::Restock);
        let a = seed_product(&store, "A", 5, 10);
        let c = seed_customer(&store, "C", "c@example.com");

        let order = orders.create_order(c.id_typed(), &[line(&a, 2)]).unwrap();

        assert_eq!(order.total(), 20);
        assert_eq!(order.status(), OrderStatus::NotPaid);
        assert_eq!(order.version(), 1);
        assert_eq!(stock_of(&store, &a), 3);
        assert_eq!(balance_of(&store, &c), (20, DebtStatus::HasDebt));
    }

    #[test]
    fn repeated_product_lines_accumulate_against_one_stock() {
        let (orders, store, _) = service(RestockPolicy::Restock);
        let a = seed_product(&store, "A", 5, 10);
        let c = seed_customer(&store, "C", "c@example.com");

        let err = orders
            .create_order(c.id_typed(), &[line(&a, 3), line(&a, 3)])
            .unwrap_err();
        assert!(matches!(err, ServiceError::OutOfStock { requested: 3, available: 2, .. }));
        assert_eq!(stock_of(&store, &a), 5);

        orders
            .create_order(c.id_typed(), &[line(&a, 3), line(&a, 2)])
            .unwrap();
        assert_eq!(stock_of(&store, &a), 0);
    }

    #[test]
    fn out_of_stock_leaves_everything_untouched() {
        let (orders, store, _) = service(RestockPolicy::Restock);
        let a = seed_product(&store, "A", 3, 10);
        let b = seed_product(&store, "B", 10, 10);
        let c = seed_customer(&store, "C", "c@example.com");

        let err = orders
            .create_order(c.id_typed(), &[line(&b, 4), line(&a, 10)])
            .unwrap_err();

        assert_eq!(err.kind(), crate::error::ErrorKind::OutOfStock);
        assert_eq!(stock_of(&store, &a), 3);
        assert_eq!(stock_of(&store, &b), 10);
        assert!(store.orders().unwrap().is_empty());
        assert_eq!(balance_of(&store, &c), (0, DebtStatus::NoDebt));
    }

    #[test]
    fn create_rejects_bad_input_and_unknown_references() {
        let (orders, store, _) = service(RestockPolicy::Restock);
        let a = seed_product(&store, "A", 3, 10);
        let c = seed_customer(&store, "C", "c@example.com");

        assert!(matches!(
            orders.create_order(c.id_typed(), &[]),
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            orders.create_order(c.id_typed(), &[line(&a, 0)]),
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            orders.create_order(CustomerId::generate(), &[line(&a, 1)]),
            Err(ServiceError::NotFound(_))
        ));
        let ghost = product("Ghost", 1, 1);
        assert!(matches!(
            orders.create_order(c.id_typed(), &[line(&ghost, 1)]),
            Err(ServiceError::NotFound(_))
        ));
        assert_eq!(stock_of(&store, &a), 3);
    }

    #[test]
    fn revise_moves_stock_by_difference() {
        let (orders, store, _) = service(RestockPolicy::Restock);
        let a = seed_product(&store, "A", 5, 10);
        let b = seed_product(&store, "B", 5, 7);
        let c = seed_customer(&store, "C", "c@example.com");
        let order = orders.create_order(c.id_typed(), &[line(&a, 2)]).unwrap();
        let item = &order.items()[0];

        let revised = orders
            .revise_order(
                order.id_typed(),
                &[
                    ItemRevision {
                        item_id: Some(item.id_typed()),
                        product_id: a.id_typed(),
                        quantity: 1,
                    },
                    ItemRevision {
                        item_id: None,
                        product_id: b.id_typed(),
                        quantity: 2,
                    },
                ],
            )
            .unwrap();

        assert_eq!(revised.total(), 10 + 14);
        assert_eq!(revised.items()[0].id_typed(), item.id_typed());
        assert_eq!(stock_of(&store, &a), 4);
        assert_eq!(stock_of(&store, &b), 3);
        assert_eq!(balance_of(&store, &c), (24, DebtStatus::HasDebt));
    }

    #[test]
    fn revise_over_stock_fails_atomically() {
        let (orders, store, _) = service(RestockPolicy::Restock);
        let a = seed_product(&store, "A", 5, 10);
        let c = seed_customer(&store, "C", "c@example.com");
        let order = orders.create_order(c.id_typed(), &[line(&a, 2)]).unwrap();

        let err = orders
            .revise_order(
                order.id_typed(),
                &[ItemRevision {
                    item_id: Some(order.items()[0].id_typed()),
                    product_id: a.id_typed(),
                    quantity: 9,
                }],
            )
            .unwrap_err();

        assert!(matches!(err, ServiceError::OutOfStock { .. }));
        assert_eq!(stock_of(&store, &a), 3);
        assert_eq!(orders.order(order.id_typed()).unwrap().total(), 20);
        assert_eq!(balance_of(&store, &c).0, 20);
    }

    #[test]
    fn new_lines_are_priced_from_current_catalogue() {
        let (orders, store, _) = service(RestockPolicy::Restock);
        let a = seed_product(&store, "A", 5, 10);
        let c = seed_customer(&store, "C", "c@example.com");
        let order = orders.create_order(c.id_typed(), &[line(&a, 1)]).unwrap();

        // Reprice A directly in the store.
        let mut repriced = Product::create(
            a.id_typed(),
            stockbook_products::NewProduct {
                unit_price: 50,
                ..new_product("A", 4, 10)
            },
            now(),
        )
        .unwrap();
        repriced.set_version(store.product(a.id_typed()).unwrap().unwrap().version());
        let mut changes = ChangeSet::new();
        changes.put(repriced);
        store.commit(changes).unwrap();

        let revised = orders
            .revise_order(
                order.id_typed(),
                &[
                    ItemRevision {
                        item_id: Some(order.items()[0].id_typed()),
                        product_id: a.id_typed(),
                        quantity: 1,
                    },
                    ItemRevision {
                        item_id: None,
                        product_id: a.id_typed(),
                        quantity: 1,
                    },
                ],
            )
            .unwrap();

        assert_eq!(revised.items()[0].unit_price(), 10);
        assert_eq!(revised.items()[1].unit_price(), 50);
        assert_eq!(revised.total(), 60);
    }

    #[test]
    fn delete_order_restocks_under_restock_policy() {
        let (orders, store, _) = service(RestockPolicy::Restock);
        let a = seed_product(&store, "A", 5, 10);
        let c = seed_customer(&store, "C", "c@example.com");
        let order = orders.create_order(c.id_typed(), &[line(&a, 2)]).unwrap();

        orders.delete_order(order.id_typed()).unwrap();

        assert_eq!(stock_of(&store, &a), 5);
        assert_eq!(balance_of(&store, &c), (0, DebtStatus::NoDebt));
        assert!(matches!(
            orders.order(order.id_typed()),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn delete_order_keeps_stock_under_retain_policy() {
        let (orders, store, _) = service(RestockPolicy::Retain);
        let a = seed_product(&store, "A", 5, 10);
        let c = seed_customer(&store, "C", "c@example.com");
        let order = orders.create_order(c.id_typed(), &[line(&a, 2)]).unwrap();

        orders.delete_order(order.id_typed()).unwrap();

        assert_eq!(stock_of(&store, &a), 3);
        assert_eq!(balance_of(&store, &c), (0, DebtStatus::NoDebt));
    }

    #[test]
    fn deleting_a_paid_order_does_not_touch_balance() {
        let (orders, store, _) = service(RestockPolicy::Restock);
        let a = seed_product(&store, "A", 5, 10);
        let c = seed_customer(&store, "C", "c@example.com");
        let paid = orders.create_order(c.id_typed(), &[line(&a, 1)]).unwrap();
        orders.create_order(c.id_typed(), &[line(&a, 2)]).unwrap();
        orders.mark_paid(paid.id_typed()).unwrap();
        assert_eq!(balance_of(&store, &c).0, 20);

        orders.delete_order(paid.id_typed()).unwrap();
        assert_eq!(balance_of(&store, &c).0, 20);
        assert_eq!(stock_of(&store, &a), 3);
    }

    #[test]
    fn delete_item_restocks_and_recomputes() {
        let (orders, store, _) = service(RestockPolicy::Restock);
        let a = seed_product(&store, "A", 5, 10);
        let b = seed_product(&store, "B", 5, 7);
        let c = seed_customer(&store, "C", "c@example.com");
        let order = orders
            .create_order(c.id_typed(), &[line(&a, 2), line(&b, 3)])
            .unwrap();

        let updated = orders
            .delete_item(order.id_typed(), order.items()[1].id_typed())
            .unwrap();

        assert_eq!(updated.items().len(), 1);
        assert_eq!(updated.total(), 20);
        assert_eq!(stock_of(&store, &b), 5);
        assert_eq!(balance_of(&store, &c).0, 20);

        let err = orders
            .delete_item(order.id_typed(), updated.items()[0].id_typed())
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[test]
    fn paid_orders_reject_item_changes() {
        let (orders, store, _) = service(RestockPolicy::Restock);
        let a = seed_product(&store, "A", 5, 10);
        let b = seed_product(&store, "B", 5, 10);
        let c = seed_customer(&store, "C", "c@example.com");
        let order = orders
            .create_order(c.id_typed(), &[line(&a, 1), line(&b, 1)])
            .unwrap();
        orders.toggle_paid(order.id_typed()).unwrap();

        let err = orders
            .delete_item(order.id_typed(), order.items()[0].id_typed())
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvariantViolation);

        let err = orders
            .revise_order(
                order.id_typed(),
                &[ItemRevision {
                    item_id: Some(order.items()[0].id_typed()),
                    product_id: a.id_typed(),
                    quantity: 1,
                }],
            )
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvariantViolation);
        assert_eq!(stock_of(&store, &a), 4);
    }

    #[test]
    fn toggle_twice_restores_order_and_balance() {
        let (orders, store, _) = service(RestockPolicy::Restock);
        let a = seed_product(&store, "A", 5, 10);
        let c = seed_customer(&store, "C", "c@example.com");
        let order = orders.create_order(c.id_typed(), &[line(&a, 2)]).unwrap();

        let paid = orders.toggle_paid(order.id_typed()).unwrap();
        assert_eq!(paid.status(), OrderStatus::Paid);
        assert_eq!(balance_of(&store, &c), (0, DebtStatus::NoDebt));

        let unpaid = orders.toggle_paid(order.id_typed()).unwrap();
        assert_eq!(unpaid.status(), OrderStatus::NotPaid);
        assert_eq!(unpaid.items(), order.items());
        assert_eq!(balance_of(&store, &c), (20, DebtStatus::HasDebt));
        assert_eq!(stock_of(&store, &a), 3);
    }

    #[test]
    fn mark_paid_is_idempotent() {
        let (orders, store, _) = service(RestockPolicy::Restock);
        let a = seed_product(&store, "A", 5, 10);
        let c = seed_customer(&store, "C", "c@example.com");
        let order = orders.create_order(c.id_typed(), &[line(&a, 2)]).unwrap();

        let first = orders.mark_paid(order.id_typed()).unwrap();
        let second = orders.mark_paid(order.id_typed()).unwrap();
        assert_eq!(first.version(), second.version());
        assert_eq!(second.status(), OrderStatus::Paid);
        assert_eq!(balance_of(&store, &c).0, 0);

        orders.mark_unpaid(order.id_typed()).unwrap();
        assert_eq!(balance_of(&store, &c).0, 20);
    }

    #[test]
    fn reconcile_repairs_drifted_balance() {
        let (orders, store, bus) = service(RestockPolicy::Restock);
        let a = seed_product(&store, "A", 5, 10);
        let c = seed_customer(&store, "C", "c@example.com");
        orders.create_order(c.id_typed(), &[line(&a, 2)]).unwrap();

        // Corrupt the stored balance behind the service's back.
        let mut drifted = store.customer(c.id_typed()).unwrap().unwrap();
        drifted.reconcile_balance(999, now());
        let mut changes = ChangeSet::new();
        changes.put(drifted);
        store.commit(changes).unwrap();

        let sub = bus.subscribe();
        assert_eq!(orders.reconcile_all().unwrap(), 1);
        assert_eq!(balance_of(&store, &c), (20, DebtStatus::HasDebt));
        let envelope = sub.try_recv().unwrap();
        assert_eq!(envelope.event_type(), "parties.customer.balance_reconciled");

        assert_eq!(orders.reconcile_all().unwrap(), 0);
        assert_eq!(orders.reconcile_customer(c.id_typed()).unwrap().total_price(), 20);
    }

    #[test]
    fn committed_operations_publish_events() {
        let (orders, store, bus) = service(RestockPolicy::Restock);
        let a = seed_product(&store, "A", 5, 10);
        let c = seed_customer(&store, "C", "c@example.com");
        let sub = bus.subscribe();

        orders.create_order(c.id_typed(), &[line(&a, 2)]).unwrap();

        let types: Vec<String> = sub
            .drain()
            .iter()
            .map(|e| e.event_type().to_string())
            .collect();
        assert!(types.contains(&"sales.order.placed".to_string()));
        assert!(types.contains(&"products.product.stock_adjusted".to_string()));
        assert!(types.contains(&"parties.customer.balance_reconciled".to_string()));
    }

    #[test]
    fn orders_for_customer_lists_only_theirs() {
        let (orders, store, _) = service(RestockPolicy::Restock);
        let a = seed_product(&store, "A", 10, 10);
        let c = seed_customer(&store, "C", "c@example.com");
        let d = seed_customer(&store, "D", "d@example.com");
        orders.create_order(c.id_typed(), &[line(&a, 1)]).unwrap();
        orders.create_order(d.id_typed(), &[line(&a, 1)]).unwrap();
        orders.create_order(c.id_typed(), &[line(&a, 1)]).unwrap();

        assert_eq!(orders.orders().unwrap().len(), 3);
        assert_eq!(orders.orders_for_customer(c.id_typed()).unwrap().len(), 2);
        assert!(matches!(
            orders.orders_for_customer(CustomerId::generate()),
            Err(ServiceError::NotFound(_))
        ));
    }
}
