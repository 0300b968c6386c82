//! Planning a full replacement of an order's item list.
//!
//! Planning is pure: it checks the requested list against the current order
//! and works out the net stock movement per product. The caller loads the
//! products named in the plan, applies the deltas, prices the new lines and
//! commits everything together.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use stockbook_core::{DomainError, DomainResult};
use stockbook_products::ProductId;

use crate::order::{Order, OrderItem, OrderItemId};

/// One entry of a requested item list.
///
/// With `item_id` it refers to an existing line (only the quantity may
/// change); without it, it asks for a new line priced from the product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRevision {
    #[serde(default)]
    pub item_id: Option<OrderItemId>,
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A line of the revised order.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedItem {
    /// Existing line, snapshot kept, quantity possibly changed.
    Existing(OrderItem),
    /// New line still to be priced from the current product.
    New { product_id: ProductId, quantity: u32 },
}

/// Net stock movement per product. Positive goes back into stock, negative is
/// taken out.
pub type StockDeltas = BTreeMap<ProductId, i64>;

#[derive(Debug, Clone, PartialEq)]
pub struct RevisionPlan {
    /// Revised lines in requested order.
    pub items: Vec<PlannedItem>,
    /// Net movement per product; zero entries are dropped.
    pub stock_deltas: StockDeltas,
    /// Existing lines absent from the request.
    pub removed: Vec<OrderItem>,
}

impl RevisionPlan {
    /// Products that must be loaded to price new lines or move stock.
    pub fn touched_products(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = self.stock_deltas.keys().copied().collect();
        for item in &self.items {
            if let PlannedItem::New { product_id, .. } = item {
                if !ids.contains(product_id) {
                    ids.push(*product_id);
                }
            }
        }
        ids
    }
}

/// Check `requested` against `order` and compute the resulting stock deltas.
pub fn plan_revision(order: &Order, requested: &[ItemRevision]) -> DomainResult<RevisionPlan> {
    order.ensure_modifiable()?;

    if requested.is_empty() {
        return Err(DomainError::validation("an order needs at least one item"));
    }

    let mut seen: HashSet<OrderItemId> = HashSet::new();
    let mut deltas: StockDeltas = BTreeMap::new();
    let mut items = Vec::with_capacity(requested.len());

    for entry in requested {
        if entry.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        match entry.item_id {
            Some(item_id) => {
                if !seen.insert(item_id) {
                    return Err(DomainError::validation(format!(
                        "order item {item_id} listed more than once"
                    )));
                }
                let current = order.item(item_id).ok_or_else(|| {
                    DomainError::validation(format!("order item {item_id} is not part of this order"))
                })?;
                if current.product_id() != entry.product_id {
                    return Err(DomainError::validation(format!(
                        "order item {item_id} cannot change its product"
                    )));
                }

                let change = i64::from(current.quantity()) - i64::from(entry.quantity);
                *deltas.entry(entry.product_id).or_insert(0) += change;
                items.push(PlannedItem::Existing(current.with_quantity(entry.quantity)));
            }
            None => {
                *deltas.entry(entry.product_id).or_insert(0) -= i64::from(entry.quantity);
                items.push(PlannedItem::New {
                    product_id: entry.product_id,
                    quantity: entry.quantity,
                });
            }
        }
    }

    let removed: Vec<OrderItem> = order
        .items()
        .iter()
        .filter(|item| !seen.contains(&item.id_typed()))
        .cloned()
        .collect();
    for item in &removed {
        *deltas.entry(item.product_id()).or_insert(0) += i64::from(item.quantity());
    }

    deltas.retain(|_, delta| *delta != 0);

    Ok(RevisionPlan {
        items,
        stock_deltas: deltas,
        removed,
    })
}
