//! Products domain module.
//!
//! Catalogue entries with shape-specific dimensions and the stock rules the
//! order engine relies on (reserve/release never drive stock negative). Pure
//! domain logic: no IO, no storage.

pub mod product;
pub mod shape;

pub use product::{NewProduct, Product, ProductEvent, ProductId};
pub use shape::{Shape, ShapeKind};
