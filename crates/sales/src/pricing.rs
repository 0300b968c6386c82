//! Order pricing and the customer balance rule.
//!
//! All amounts are in the smallest currency unit. Arithmetic is checked: an
//! overflowing amount is rejected as invalid input rather than wrapped.

use stockbook_core::{DomainError, DomainResult};

use crate::order::{Order, OrderItem};

/// `quantity × unit_price`.
pub fn line_total(quantity: u32, unit_price: u64) -> DomainResult<u64> {
    unit_price
        .checked_mul(u64::from(quantity))
        .ok_or_else(|| DomainError::validation("line total overflows"))
}

/// Sum of line totals.
pub fn order_total(items: &[OrderItem]) -> DomainResult<u64> {
    items.iter().try_fold(0u64, |acc, item| {
        acc.checked_add(item.line_total()?)
            .ok_or_else(|| DomainError::validation("order total overflows"))
    })
}

/// What a customer owes: the sum of totals over their not-paid orders.
///
/// This is the single source of truth for `Customer::total_price`; it is
/// always recomputed from the orders, never adjusted incrementally.
pub fn outstanding_balance<'a, I>(orders: I) -> DomainResult<u64>
where
    I: IntoIterator<Item = &'a Order>,
{
    orders
        .into_iter()
        .filter(|order| order.is_outstanding())
        .try_fold(0u64, |acc, order| {
            acc.checked_add(order.total())
                .ok_or_else(|| DomainError::validation("outstanding balance overflows"))
        })
}
