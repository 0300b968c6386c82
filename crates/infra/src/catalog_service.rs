//! Product catalogue.

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::instrument;

use stockbook_core::AggregateRoot;
use stockbook_events::{EventBus, EventEnvelope};
use stockbook_products::{NewProduct, Product, ProductEvent, ProductId, ShapeKind};

use crate::dispatcher::{Dispatcher, Outcome};
use crate::error::ServiceError;
use crate::store::DocumentStore;

pub struct CatalogService<S, B> {
    dispatcher: Dispatcher<S, B>,
}

impl<S, B> CatalogService<S, B> {
    pub fn new(dispatcher: Dispatcher<S, B>) -> Self {
        Self { dispatcher }
    }
}

impl<S, B> CatalogService<S, B>
where
    S: DocumentStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    #[instrument(skip(self, input), fields(name = %input.name), err)]
    pub fn create_product(&self, input: NewProduct) -> Result<Product, ServiceError> {
        let (mut product, receipt) = self.dispatcher.execute("product.create", |_| {
            let now = Utc::now();
            let product = Product::create(ProductId::generate(), input.clone(), now)?;

            let mut outcome = Outcome::new(product.clone());
            outcome.event(
                product.id_typed(),
                &ProductEvent::ProductCreated {
                    product_id: product.id_typed(),
                    name: product.name().to_string(),
                    quantity: product.quantity(),
                    occurred_at: now,
                },
            )?;
            outcome.put(product);
            Ok(outcome)
        })?;

        receipt.stamp(&mut product);
        tracing::info!(product_id = %product.id_typed(), "product created");
        Ok(product)
    }

    /// Remove a product from the catalogue.
    ///
    /// Existing order lines keep their snapshot; deleting their order later
    /// simply has no stock to return.
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub fn delete_product(&self, product_id: ProductId) -> Result<Product, ServiceError> {
        let (product, _) = self.dispatcher.execute("product.delete", |store| {
            let product = store
                .product(product_id)?
                .ok_or_else(|| ServiceError::not_found(format!("product {product_id}")))?;

            let mut outcome = Outcome::new(product.clone());
            outcome.delete(product_id, product.version());
            outcome.event(
                product_id,
                &ProductEvent::ProductDeleted {
                    product_id,
                    occurred_at: Utc::now(),
                },
            )?;
            Ok(outcome)
        })?;

        tracing::info!("product deleted");
        Ok(product)
    }

    /// Receive goods (positive) or correct shrinkage (negative).
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub fn adjust_stock(&self, product_id: ProductId, delta: i64) -> Result<Product, ServiceError> {
        let (mut product, receipt) = self.dispatcher.execute("product.adjust_stock", |store| {
            let now = Utc::now();
            let mut product = store
                .product(product_id)?
                .ok_or_else(|| ServiceError::not_found(format!("product {product_id}")))?;
            product.adjust_stock(delta, now)?;

            let mut outcome = Outcome::new(product.clone());
            outcome.event(
                product_id,
                &ProductEvent::StockAdjusted {
                    product_id,
                    delta,
                    quantity: product.quantity(),
                    occurred_at: now,
                },
            )?;
            outcome.put(product);
            Ok(outcome)
        })?;

        receipt.stamp(&mut product);
        tracing::info!(quantity = product.quantity(), "stock adjusted");
        Ok(product)
    }

    pub fn product(&self, product_id: ProductId) -> Result<Product, ServiceError> {
        self.dispatcher
            .store()
            .product(product_id)?
            .ok_or_else(|| ServiceError::not_found(format!("product {product_id}")))
    }

    pub fn products(&self) -> Result<Vec<Product>, ServiceError> {
        Ok(self.dispatcher.store().products()?)
    }

    pub fn products_by_shape(&self, kind: ShapeKind) -> Result<Vec<Product>, ServiceError> {
        let mut products = self.dispatcher.store().products()?;
        products.retain(|p| p.shape().kind() == kind);
        Ok(products)
    }
}
