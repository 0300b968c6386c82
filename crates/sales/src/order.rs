use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::{AggregateRoot, DomainError, DomainResult, Entity};
use stockbook_events::Event;
use stockbook_parties::CustomerId;
use stockbook_products::{Product, ProductId, Shape};

use crate::pricing;

stockbook_core::aggregate_id!(
    /// Order identifier.
    OrderId,
    "OrderId"
);

stockbook_core::aggregate_id!(
    /// Identifier of a line inside an order.
    OrderItemId,
    "OrderItemId"
);

/// Order payment status.
///
/// Both transitions are allowed (toggle); there is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    NotPaid,
    Paid,
}

impl OrderStatus {
    pub fn toggled(self) -> Self {
        match self {
            OrderStatus::NotPaid => OrderStatus::Paid,
            OrderStatus::Paid => OrderStatus::NotPaid,
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            OrderStatus::NotPaid => write!(f, "not paid"),
            OrderStatus::Paid => write!(f, "paid"),
        }
    }
}

/// Order line with the product data captured when the line was created.
///
/// Name, shape, unit price and cost are snapshots: later catalogue changes
/// never reprice an existing line. Only `quantity` may change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    id: OrderItemId,
    product_id: ProductId,
    name: String,
    #[serde(flatten)]
    shape: Shape,
    quantity: u32,
    unit_price: u64,
    cost: u64,
}

impl OrderItem {
    /// Capture `product`'s current catalogue data for a new line.
    pub fn snapshot(product: &Product, quantity: u32) -> DomainResult<Self> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        pricing::line_total(quantity, product.unit_price())?;

        Ok(Self {
            id: OrderItemId::generate(),
            product_id: product.id_typed(),
            name: product.name().to_string(),
            shape: product.shape().clone(),
            quantity,
            unit_price: product.unit_price(),
            cost: product.cost(),
        })
    }

    pub fn id_typed(&self) -> OrderItemId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit_price(&self) -> u64 {
        self.unit_price
    }

    pub fn cost(&self) -> u64 {
        self.cost
    }

    pub fn line_total(&self) -> DomainResult<u64> {
        pricing::line_total(self.quantity, self.unit_price)
    }

    pub(crate) fn with_quantity(&self, quantity: u32) -> Self {
        Self {
            quantity,
            ..self.clone()
        }
    }
}

impl Entity for OrderItem {
    type Id = OrderItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Aggregate root: Order.
///
/// # Invariants
/// - The item list is never empty.
/// - `total()` is computed from the items on every call; there is no stored
///   total to drift. Every mutation validates that the total is representable.
/// - Items can only change while the order is not paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: OrderId,
    customer_id: CustomerId,
    #[serde(rename = "orderItems")]
    items: Vec<OrderItem>,
    status: OrderStatus,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Build a new, not-paid order from already-priced lines.
    pub fn place(
        id: OrderId,
        customer_id: CustomerId,
        items: Vec<OrderItem>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Self::validate_items(&items)?;

        Ok(Self {
            id,
            customer_id,
            items,
            status: OrderStatus::NotPaid,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn item(&self, item_id: OrderItemId) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Whether this order counts towards the customer's outstanding balance.
    pub fn is_outstanding(&self) -> bool {
        self.status == OrderStatus::NotPaid
    }

    pub fn is_modifiable(&self) -> bool {
        self.status == OrderStatus::NotPaid
    }

    /// Sum of line totals.
    pub fn total(&self) -> u64 {
        // Mutations reject item lists whose total overflows, so this never saturates.
        self.items
            .iter()
            .map(|item| item.unit_price.saturating_mul(u64::from(item.quantity)))
            .fold(0u64, u64::saturating_add)
    }

    /// Units of each product held by this order, in first-seen order.
    pub fn reserved_quantities(&self) -> Vec<(ProductId, u32)> {
        let mut out: Vec<(ProductId, u32)> = Vec::new();
        for item in &self.items {
            match out.iter_mut().find(|(id, _)| *id == item.product_id) {
                Some((_, qty)) => *qty = qty.saturating_add(item.quantity),
                None => out.push((item.product_id, item.quantity)),
            }
        }
        out
    }

    pub fn ensure_modifiable(&self) -> DomainResult<()> {
        if !self.is_modifiable() {
            return Err(DomainError::invariant("cannot modify items of a paid order"));
        }
        Ok(())
    }

    /// Replace the whole item list (result of a planned revision).
    pub fn replace_items(&mut self, items: Vec<OrderItem>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_modifiable()?;
        Self::validate_items(&items)?;
        self.items = items;
        self.updated_at = now;
        Ok(())
    }

    /// Remove one line and return it.
    ///
    /// The last line cannot be removed; delete the order instead.
    pub fn remove_item(&mut self, item_id: OrderItemId, now: DateTime<Utc>) -> DomainResult<OrderItem> {
        self.ensure_modifiable()?;
        let idx = self
            .items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or_else(|| DomainError::not_found(format!("order item {item_id}")))?;

        if self.items.len() == 1 {
            return Err(DomainError::validation(
                "cannot remove the last item of an order; delete the order instead",
            ));
        }

        let removed = self.items.remove(idx);
        self.updated_at = now;
        Ok(removed)
    }

    /// Move to `status`. Returns whether anything changed.
    pub fn set_status(&mut self, status: OrderStatus, now: DateTime<Utc>) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;
        self.updated_at = now;
        true
    }

    /// Flip between paid and not paid, returning the new status.
    pub fn toggle_paid(&mut self, now: DateTime<Utc>) -> OrderStatus {
        let next = self.status.toggled();
        self.set_status(next, now);
        next
    }

    fn validate_items(items: &[OrderItem]) -> DomainResult<()> {
        if items.is_empty() {
            return Err(DomainError::validation("an order needs at least one item"));
        }
        if items.iter().any(|item| item.quantity == 0) {
            return Err(DomainError::validation("quantity must be positive"));
        }
        pricing::order_total(items)?;
        Ok(())
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

/// Committed order change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    OrderPlaced {
        order_id: OrderId,
        customer_id: CustomerId,
        total: u64,
        occurred_at: DateTime<Utc>,
    },
    OrderRevised {
        order_id: OrderId,
        total: u64,
        occurred_at: DateTime<Utc>,
    },
    OrderItemRemoved {
        order_id: OrderId,
        item_id: OrderItemId,
        total: u64,
        occurred_at: DateTime<Utc>,
    },
    OrderDeleted {
        order_id: OrderId,
        customer_id: CustomerId,
        occurred_at: DateTime<Utc>,
    },
    PaymentStatusChanged {
        order_id: OrderId,
        status: OrderStatus,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced { .. } => "sales.order.placed",
            OrderEvent::OrderRevised { .. } => "sales.order.revised",
            OrderEvent::OrderItemRemoved { .. } => "sales.order.item_removed",
            OrderEvent::OrderDeleted { .. } => "sales.order.deleted",
            OrderEvent::PaymentStatusChanged { .. } => "sales.order.payment_status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced { occurred_at, .. }
            | OrderEvent::OrderRevised { occurred_at, .. }
            | OrderEvent::OrderItemRemoved { occurred_at, .. }
            | OrderEvent::OrderDeleted { occurred_at, .. }
            | OrderEvent::PaymentStatusChanged { occurred_at, .. } => *occurred_at,
        }
    }
}
