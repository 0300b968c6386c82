//! Parties domain module (customers).
//!
//! A customer's debt status is never stored: it is derived from the
//! outstanding balance, which only the order engine may reconcile.

pub mod customer;

pub use customer::{
    ContactInfo, Customer, CustomerEvent, CustomerId, CustomerUpdate, DebtStatus, NewCustomer,
};
