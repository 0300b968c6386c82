use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::{AggregateRoot, DomainError, DomainResult};
use stockbook_events::Event;

use crate::shape::Shape;

stockbook_core::aggregate_id!(
    /// Product identifier.
    ProductId,
    "ProductId"
);

/// Input for registering a product in the catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub quantity: u32,
    /// Purchase cost in smallest currency unit.
    pub cost: u64,
    /// Sale price in smallest currency unit.
    pub unit_price: u64,
    #[serde(flatten)]
    pub shape: Shape,
}

/// Aggregate root: Product.
///
/// `quantity` is the stock on hand. It is unsigned and only changes through
/// [`Product::reserve`], [`Product::release`] and [`Product::adjust_stock`],
/// all of which refuse to go below zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    id: ProductId,
    name: String,
    quantity: u32,
    cost: u64,
    unit_price: u64,
    #[serde(flatten)]
    shape: Shape,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Product {
    /// Validate input and build a product that has not been committed yet.
    pub fn create(id: ProductId, input: NewProduct, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        input.shape.validate()?;

        Ok(Self {
            id,
            name: name.to_string(),
            quantity: input.quantity,
            cost: input.cost,
            unit_price: input.unit_price,
            shape: input.shape,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn cost(&self) -> u64 {
        self.cost
    }

    pub fn unit_price(&self) -> u64 {
        self.unit_price
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Take `quantity` units out of stock for an order line.
    pub fn reserve(&mut self, quantity: u32, now: DateTime<Utc>) -> DomainResult<()> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        let remaining = self.quantity.checked_sub(quantity).ok_or_else(|| {
            DomainError::out_of_stock(&self.name, u64::from(quantity), u64::from(self.quantity))
        })?;

        self.quantity = remaining;
        self.updated_at = now;
        Ok(())
    }

    /// Return `quantity` units to stock (cancelled or reduced order line).
    pub fn release(&mut self, quantity: u32, now: DateTime<Utc>) -> DomainResult<()> {
        if quantity == 0 {
            return Ok(());
        }
        self.quantity = self
            .quantity
            .checked_add(quantity)
            .ok_or_else(|| DomainError::validation("stock quantity overflow"))?;
        self.updated_at = now;
        Ok(())
    }

    /// Manual stock correction (goods received, shrinkage).
    pub fn adjust_stock(&mut self, delta: i64, now: DateTime<Utc>) -> DomainResult<()> {
        if delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }

        let new_stock = i64::from(self.quantity) + delta;
        if new_stock < 0 {
            return Err(DomainError::invariant("stock cannot go negative"));
        }
        self.quantity = u32::try_from(new_stock)
            .map_err(|_| DomainError::validation("stock quantity overflow"))?;
        self.updated_at = now;
        Ok(())
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

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

/// Committed catalogue change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductEvent {
    ProductCreated {
        product_id: ProductId,
        name: String,
        quantity: u32,
        occurred_at: DateTime<Utc>,
    },
    ProductDeleted {
        product_id: ProductId,
        occurred_at: DateTime<Utc>,
    },
    StockAdjusted {
        product_id: ProductId,
        delta: i64,
        quantity: u32,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated { .. } => "products.product.created",
            ProductEvent::ProductDeleted { .. } => "products.product.deleted",
            ProductEvent::StockAdjusted { .. } => "products.product.stock_adjusted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated { occurred_at, .. }
            | ProductEvent::ProductDeleted { occurred_at, .. }
            | ProductEvent::StockAdjusted { occurred_at, .. } => *occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn new_product(quantity: u32) -> NewProduct {
        NewProduct {
            name: "Oak board".to_string(),
            quantity,
            cost: 6,
            unit_price: 10,
            shape: Shape::Rectangular {
                width: 20.0,
                height: 200.0,
            },
        }
    }

    fn test_product(quantity: u32) -> Product {
        Product::create(ProductId::generate(), new_product(quantity), test_time()).unwrap()
    }

    #[test]
    fn create_trims_name_and_starts_uncommitted() {
        let mut input = new_product(5);
        input.name = "  Oak board ".to_string();
        let product = Product::create(ProductId::generate(), input, test_time()).unwrap();
        assert_eq!(product.name(), "Oak board");
        assert_eq!(product.version(), 0);
        assert_eq!(product.quantity(), 5);
    }

    #[test]
    fn create_rejects_empty_name() {
        let mut input = new_product(5);
        input.name = "   ".to_string();
        let err = Product::create(ProductId::generate(), input, test_time()).unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for empty name"),
        }
    }

    #[test]
    fn create_rejects_invalid_dimensions() {
        let mut input = new_product(5);
        input.shape = Shape::Circular { radius: 0.0 };
        assert!(Product::create(ProductId::generate(), input, test_time()).is_err());
    }

    #[test]
    fn reserve_decrements_stock() {
        let mut product = test_product(5);
        product.reserve(2, test_time()).unwrap();
        assert_eq!(product.quantity(), 3);
    }

    #[test]
    fn reserve_more_than_available_is_out_of_stock_and_leaves_stock_alone() {
        let mut product = test_product(3);
        let err = product.reserve(10, test_time()).unwrap_err();
        assert_eq!(
            err,
            DomainError::OutOfStock {
                product: "Oak board".to_string(),
                requested: 10,
                available: 3,
            }
        );
        assert_eq!(product.quantity(), 3);
    }

    #[test]
    fn reserve_all_remaining_stock_is_allowed() {
        let mut product = test_product(3);
        product.reserve(3, test_time()).unwrap();
        assert_eq!(product.quantity(), 0);
    }

    #[test]
    fn reserve_zero_is_rejected() {
        let mut product = test_product(3);
        assert!(matches!(
            product.reserve(0, test_time()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn release_restocks() {
        let mut product = test_product(3);
        product.release(4, test_time()).unwrap();
        assert_eq!(product.quantity(), 7);
    }

    #[test]
    fn adjust_stock_cannot_go_negative() {
        let mut product = test_product(3);
        let err = product.adjust_stock(-4, test_time()).unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) if msg.contains("stock cannot go negative") => {}
            _ => panic!("Expected InvariantViolation for negative stock"),
        }
        product.adjust_stock(-3, test_time()).unwrap();
        assert_eq!(product.quantity(), 0);
        product.adjust_stock(12, test_time()).unwrap();
        assert_eq!(product.quantity(), 12);
    }

    #[test]
    fn serialized_document_flattens_shape() {
        let product = test_product(1);
        let json = serde_json::to_value(&product).unwrap();
        assert_eq!(json["shape"], "Rectangular");
        assert_eq!(json["unitPrice"], 10);
        assert_eq!(json["width"], 20.0);

        let back: Product = serde_json::from_value(json).unwrap();
        assert_eq!(back, product);
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum StockOp {
            Reserve(u32),
            Release(u32),
            Adjust(i64),
        }

        fn stock_op() -> impl Strategy<Value = StockOp> {
            prop_oneof![
                (0u32..50).prop_map(StockOp::Reserve),
                (0u32..50).prop_map(StockOp::Release),
                (-50i64..50).prop_map(StockOp::Adjust),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 512,
                ..ProptestConfig::default()
            })]

            /// Property: a failed stock operation leaves stock untouched, and
            /// a successful one moves it by exactly the requested amount.
            #[test]
            fn stock_moves_exactly_or_not_at_all(
                initial in 0u32..100,
                ops in prop::collection::vec(stock_op(), 1..40)
            ) {
                let mut product = test_product(initial);
                for op in ops {
                    let before = i64::from(product.quantity());
                    let (result, delta) = match op {
                        StockOp::Reserve(q) => (product.reserve(q, test_time()), -i64::from(q)),
                        StockOp::Release(q) => (product.release(q, test_time()), i64::from(q)),
                        StockOp::Adjust(d) => (product.adjust_stock(d, test_time()), d),
                    };
                    let after = i64::from(product.quantity());
                    if result.is_ok() {
                        prop_assert_eq!(after, before + delta);
                    } else {
                        prop_assert_eq!(after, before);
                    }
                }
            }
        }
    }
}
