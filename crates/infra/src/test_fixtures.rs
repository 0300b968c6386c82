//! Document builders shared by the infra tests.

use chrono::{DateTime, Utc};

use stockbook_parties::{ContactInfo, Customer, CustomerId, NewCustomer};
use stockbook_products::{NewProduct, Product, ProductId, Shape};
use stockbook_sales::{Order, OrderId, OrderItem};

use crate::store::{ChangeSet, DocumentStore};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn new_product(name: &str, quantity: u32, unit_price: u64) -> NewProduct {
    NewProduct {
        name: name.to_string(),
        quantity,
        cost: unit_price / 2,
        unit_price,
        shape: Shape::Rectangular {
            width: 10.0,
            height: 20.0,
        },
    }
}

pub fn product(name: &str, quantity: u32, unit_price: u64) -> Product {
    Product::create(ProductId::generate(), new_product(name, quantity, unit_price), now()).unwrap()
}

pub fn new_customer(name: &str, email: &str) -> NewCustomer {
    NewCustomer {
        name: name.to_string(),
        contact: ContactInfo {
            address: "1 Market Street".to_string(),
            email: email.to_string(),
            phone_number: "555-0100".to_string(),
        },
    }
}

pub fn customer(name: &str, email: &str) -> Customer {
    Customer::register(CustomerId::generate(), new_customer(name, email), now()).unwrap()
}

/// Order built directly from snapshots; stock is not touched.
pub fn order_for(customer: &Customer, lines: &[(&Product, u32)]) -> Order {
    let items = lines
        .iter()
        .map(|(product, qty)| OrderItem::snapshot(product, *qty).unwrap())
        .collect();
    Order::place(OrderId::generate(), customer.id_typed(), items, now()).unwrap()
}

pub fn seed_product(store: &impl DocumentStore, name: &str, quantity: u32, unit_price: u64) -> Product {
    let mut product = product(name, quantity, unit_price);
    let mut changes = ChangeSet::new();
    changes.put(product.clone());
    store.commit(changes).unwrap().stamp(&mut product);
    product
}

pub fn seed_customer(store: &impl DocumentStore, name: &str, email: &str) -> Customer {
    let mut customer = customer(name, email);
    let mut changes = ChangeSet::new();
    changes.put(customer.clone());
    store.commit(changes).unwrap().stamp(&mut customer);
    customer
}
