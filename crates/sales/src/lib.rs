//! Sales orders domain module.
//!
//! Order pricing, the paid/not-paid status machine, and planning of item-list
//! revisions into per-product stock movements. Pure domain logic: the infra
//! layer loads documents, calls into this crate, and commits the result.

pub mod order;
pub mod pricing;
pub mod revision;

pub use order::{Order, OrderEvent, OrderId, OrderItem, OrderItemId, OrderStatus};
pub use pricing::{line_total, order_total, outstanding_balance};
pub use revision::{ItemRevision, PlannedItem, RevisionPlan, StockDeltas, plan_revision};
