//! Request payloads and response shapes of the bridge.
//!
//! Everything here is plain serde data. Field names are camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use stockbook_auth::{User, UserId};
use stockbook_infra::{ErrorKind, NewOrderLine};
use stockbook_parties::{Customer, CustomerId, CustomerUpdate, DebtStatus};
use stockbook_products::{ProductId, ShapeKind};
use stockbook_sales::{ItemRevision, Order, OrderId, OrderItemId};

/// One bridge request: `{"channel": "order:create", "payload": {...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub channel: String,
    #[serde(default)]
    pub payload: JsonValue,
}

/// Every channel answers with this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    pub success: bool,
    pub message: String,
    pub data: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>, data: JsonValue) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error_kind: None,
        }
    }

    pub fn failure(message: impl Into<String>, error_kind: Option<ErrorKind>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error_kind,
        }
    }
}

/// Order with its computed total.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub total: u64,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        Self {
            total: order.total(),
            order,
        }
    }
}

/// Customer with the debt status derived from their balance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerView {
    #[serde(flatten)]
    pub customer: Customer,
    pub status: DebtStatus,
}

impl From<Customer> for CustomerView {
    fn from(customer: Customer) -> Self {
        Self {
            status: customer.status(),
            customer,
        }
    }
}

/// User as shown to the frontend: never the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id_typed(),
            name: user.name().to_string(),
            created_at: user.created_at(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ById<I> {
    pub id: I,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ByShape {
    pub shape: ShapeKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdjustStock {
    pub id: ProductId,
    pub delta: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCustomer {
    pub id: CustomerId,
    #[serde(flatten)]
    pub update: CustomerUpdate,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrder {
    pub customer_id: CustomerId,
    pub items: Vec<NewOrderLine>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateOrder {
    pub id: OrderId,
    pub items: Vec<ItemRevision>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOrderItem {
    pub order_id: OrderId,
    pub item_id: OrderItemId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByCustomer {
    pub customer_id: CustomerId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub name: String,
    pub password: String,
}
