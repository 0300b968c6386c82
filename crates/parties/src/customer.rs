use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::{AggregateRoot, DomainError, DomainResult};
use stockbook_events::Event;

stockbook_core::aggregate_id!(
    /// Customer identifier.
    CustomerId,
    "CustomerId"
);

/// Debt status, derived from the outstanding balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtStatus {
    HasDebt,
    NoDebt,
}

impl DebtStatus {
    pub fn from_outstanding(total_price: u64) -> Self {
        if total_price > 0 {
            DebtStatus::HasDebt
        } else {
            DebtStatus::NoDebt
        }
    }
}

/// Contact information for a customer. All fields are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub address: String,
    pub email: String,
    pub phone_number: String,
}

impl ContactInfo {
    /// Trim every field, lowercase the email, and reject blanks.
    fn normalized(self) -> DomainResult<Self> {
        let address = self.address.trim().to_string();
        let email = self.email.trim().to_lowercase();
        let phone_number = self.phone_number.trim().to_string();

        if address.is_empty() {
            return Err(DomainError::validation("address cannot be empty"));
        }
        if phone_number.is_empty() {
            return Err(DomainError::validation("phone number cannot be empty"));
        }
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(DomainError::validation("email is not valid")),
        }

        Ok(Self {
            address,
            email,
            phone_number,
        })
    }
}

/// Input for registering a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    pub name: String,
    #[serde(flatten)]
    pub contact: ContactInfo,
}

/// Partial update of a customer's details (`None` keeps the current value).
///
/// The balance is deliberately absent: it is owned by order reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

/// Aggregate root: Customer.
///
/// # Invariants
/// - `total_price` is the sum of the customer's unpaid order totals; it only
///   changes through [`Customer::reconcile_balance`].
/// - `status()` is `HasDebt` iff `total_price > 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    id: CustomerId,
    name: String,
    #[serde(flatten)]
    contact: ContactInfo,
    total_price: u64,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Customer {
    /// Validate input and build a customer with no outstanding debt.
    pub fn register(id: CustomerId, input: NewCustomer, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(Self {
            id,
            name: name.to_string(),
            contact: input.contact.normalized()?,
            total_price: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id_typed(&self) -> CustomerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn email(&self) -> &str {
        &self.contact.email
    }

    pub fn total_price(&self) -> u64 {
        self.total_price
    }

    pub fn status(&self) -> DebtStatus {
        DebtStatus::from_outstanding(self.total_price)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Apply a partial details update. Fails without mutating on invalid input.
    pub fn update_details(&mut self, update: CustomerUpdate, now: DateTime<Utc>) -> DomainResult<()> {
        let name = update.name.unwrap_or_else(|| self.name.clone());
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        let contact = ContactInfo {
            address: update.address.unwrap_or_else(|| self.contact.address.clone()),
            email: update.email.unwrap_or_else(|| self.contact.email.clone()),
            phone_number: update
                .phone_number
                .unwrap_or_else(|| self.contact.phone_number.clone()),
        }
        .normalized()?;

        self.name = name.to_string();
        self.contact = contact;
        self.updated_at = now;
        Ok(())
    }

    /// Set the outstanding balance to the recomputed sum of unpaid orders.
    ///
    /// Returns the previous balance when it changed, `None` when it was
    /// already consistent.
    pub fn reconcile_balance(&mut self, outstanding: u64, now: DateTime<Utc>) -> Option<u64> {
        if self.total_price == outstanding {
            return None;
        }
        let previous = self.total_price;
        self.total_price = outstanding;
        self.updated_at = now;
        Some(previous)
    }
}

impl AggregateRoot for Customer {
    type Id = CustomerId;

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

/// Committed customer change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CustomerEvent {
    CustomerRegistered {
        customer_id: CustomerId,
        name: String,
        occurred_at: DateTime<Utc>,
    },
    CustomerUpdated {
        customer_id: CustomerId,
        occurred_at: DateTime<Utc>,
    },
    CustomerDeleted {
        customer_id: CustomerId,
        occurred_at: DateTime<Utc>,
    },
    BalanceReconciled {
        customer_id: CustomerId,
        previous: u64,
        total_price: u64,
        status: DebtStatus,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for CustomerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CustomerEvent::CustomerRegistered { .. } => "parties.customer.registered",
            CustomerEvent::CustomerUpdated { .. } => "parties.customer.updated",
            CustomerEvent::CustomerDeleted { .. } => "parties.customer.deleted",
            CustomerEvent::BalanceReconciled { .. } => "parties.customer.balance_reconciled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CustomerEvent::CustomerRegistered { occurred_at, .. }
            | CustomerEvent::CustomerUpdated { occurred_at, .. }
            | CustomerEvent::CustomerDeleted { occurred_at, .. }
            | CustomerEvent::BalanceReconciled { occurred_at, .. } => *occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn new_customer() -> NewCustomer {
        NewCustomer {
            name: "Test Customer".to_string(),
            contact: ContactInfo {
                address: "123 Main St".to_string(),
                email: " Test@Example.com ".to_string(),
                phone_number: "+123456789".to_string(),
            },
        }
    }

    fn test_customer() -> Customer {
        Customer::register(CustomerId::generate(), new_customer(), test_time()).unwrap()
    }

    #[test]
    fn register_starts_without_debt() {
        let customer = test_customer();
        assert_eq!(customer.total_price(), 0);
        assert_eq!(customer.status(), DebtStatus::NoDebt);
        assert_eq!(customer.email(), "test@example.com");
        assert_eq!(customer.version(), 0);
    }

    #[test]
    fn register_rejects_empty_name() {
        let mut input = new_customer();
        input.name = "   ".to_string();
        let err = Customer::register(CustomerId::generate(), input, test_time()).unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for empty name"),
        }
    }

    #[test]
    fn register_rejects_malformed_email() {
        for email in ["", "no-at-sign", "@example.com", "user@"] {
            let mut input = new_customer();
            input.contact.email = email.to_string();
            assert!(
                Customer::register(CustomerId::generate(), input, test_time()).is_err(),
                "{email:?} should be rejected"
            );
        }
    }

    #[test]
    fn status_follows_balance() {
        let mut customer = test_customer();

        assert_eq!(customer.reconcile_balance(20, test_time()), Some(0));
        assert_eq!(customer.status(), DebtStatus::HasDebt);

        assert_eq!(customer.reconcile_balance(20, test_time()), None);

        assert_eq!(customer.reconcile_balance(0, test_time()), Some(20));
        assert_eq!(customer.status(), DebtStatus::NoDebt);
    }

    #[test]
    fn update_details_keeps_unspecified_fields() {
        let mut customer = test_customer();
        customer
            .update_details(
                CustomerUpdate {
                    phone_number: Some("555-0100".to_string()),
                    ..CustomerUpdate::default()
                },
                test_time(),
            )
            .unwrap();

        assert_eq!(customer.name(), "Test Customer");
        assert_eq!(customer.contact().phone_number, "555-0100");
        assert_eq!(customer.contact().address, "123 Main St");
    }

    #[test]
    fn invalid_update_leaves_customer_untouched() {
        let mut customer = test_customer();
        let before = customer.clone();
        let err = customer
            .update_details(
                CustomerUpdate {
                    name: Some("Renamed".to_string()),
                    email: Some("broken".to_string()),
                    ..CustomerUpdate::default()
                },
                test_time(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(customer, before);
    }

    #[test]
    fn serialized_document_has_no_status_field() {
        let json = serde_json::to_value(test_customer()).unwrap();
        assert_eq!(json["totalPrice"], 0);
        assert_eq!(json["phoneNumber"], "+123456789");
        assert!(json.get("status").is_none());
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: after any sequence of reconciliations, status is
            /// HasDebt exactly when the balance is positive.
            #[test]
            fn status_is_derived_from_balance(
                balances in prop::collection::vec(0u64..1_000, 1..20)
            ) {
                let mut customer = test_customer();
                for balance in balances {
                    customer.reconcile_balance(balance, test_time());
                    prop_assert_eq!(customer.total_price(), balance);
                    prop_assert_eq!(
                        customer.status() == DebtStatus::HasDebt,
                        customer.total_price() > 0
                    );
                }
            }
        }
    }
}
