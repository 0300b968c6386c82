//! Channel router: `{channel, payload}` in, `{success, message, data}` out.
//!
//! Every error stops here and becomes a failure response.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::instrument;

use stockbook_infra::ErrorKind;
use stockbook_parties::CustomerId;
use stockbook_products::ProductId;
use stockbook_sales::OrderId;

use crate::commands::{self, AppState, CommandError};
use crate::types::{
    AdjustStock, ById, ByCustomer, ByShape, CommandResponse, CreateOrder, Credentials,
    DeleteOrderItem, Request, UpdateCustomer, UpdateOrder,
};

/// Handle one raw request line.
pub async fn handle_line(state: &AppState, line: &str) -> CommandResponse {
    match serde_json::from_str::<Request>(line) {
        Ok(request) => dispatch(state, request).await,
        Err(err) => {
            tracing::warn!(error = %err, "malformed request");
            CommandResponse::failure(format!("malformed request: {err}"), Some(ErrorKind::InvalidInput))
        }
    }
}

#[instrument(skip_all, fields(channel = %request.channel))]
pub async fn dispatch(state: &AppState, request: Request) -> CommandResponse {
    match route(state, &request.channel, request.payload).await {
        Ok((message, data)) => CommandResponse::ok(message, data),
        Err(err) => {
            tracing::warn!(error = %err, "request failed");
            CommandResponse::failure(err.to_string(), err.kind())
        }
    }
}

type Reply = Result<(&'static str, JsonValue), CommandError>;

async fn route(state: &AppState, channel: &str, payload: JsonValue) -> Reply {
    match channel {
        "product:create" => reply(
            "product created",
            commands::create_product(state, parse(payload)?).await?,
        ),
        "product:delete" => {
            let ById { id } = parse::<ById<ProductId>>(payload)?;
            reply("product deleted", commands::delete_product(state, id).await?)
        }
        "product:fetchById" => {
            let ById { id } = parse::<ById<ProductId>>(payload)?;
            reply("product fetched", commands::fetch_product(state, id).await?)
        }
        "product:fetchAll" => reply("products fetched", commands::fetch_products(state).await?),
        "product:fetchByType" => {
            let ByShape { shape } = parse(payload)?;
            reply(
                "products fetched",
                commands::fetch_products_by_shape(state, shape).await?,
            )
        }
        "product:adjustStock" => {
            let AdjustStock { id, delta } = parse(payload)?;
            reply("stock adjusted", commands::adjust_stock(state, id, delta).await?)
        }

        "customer:create" => reply(
            "customer created",
            commands::create_customer(state, parse(payload)?).await?,
        ),
        "customer:update" => {
            let UpdateCustomer { id, update } = parse(payload)?;
            reply(
                "customer updated",
                commands::update_customer(state, id, update).await?,
            )
        }
        "customer:delete" => {
            let ById { id } = parse::<ById<CustomerId>>(payload)?;
            reply("customer deleted", commands::delete_customer(state, id).await?)
        }
        "customer:fetchById" => {
            let ById { id } = parse::<ById<CustomerId>>(payload)?;
            reply("customer fetched", commands::fetch_customer(state, id).await?)
        }
        "customer:fetchAll" => reply("customers fetched", commands::fetch_customers(state).await?),
        "customer:reconcile" => {
            let ById { id } = parse::<ById<CustomerId>>(payload)?;
            reply(
                "customer balance reconciled",
                commands::reconcile_customer(state, id).await?,
            )
        }

        "order:create" => {
            let CreateOrder { customer_id, items } = parse(payload)?;
            reply(
                "order created",
                commands::create_order(state, customer_id, items).await?,
            )
        }
        "order:update" => {
            let UpdateOrder { id, items } = parse(payload)?;
            reply("order updated", commands::update_order(state, id, items).await?)
        }
        "order:delete" => {
            let ById { id } = parse::<ById<OrderId>>(payload)?;
            reply("order deleted", commands::delete_order(state, id).await?)
        }
        "order:deleteItem" => {
            let DeleteOrderItem { order_id, item_id } = parse(payload)?;
            reply(
                "order item deleted",
                commands::delete_order_item(state, order_id, item_id).await?,
            )
        }
        "order:togglePaid" => {
            let ById { id } = parse::<ById<OrderId>>(payload)?;
            reply("payment status changed", commands::toggle_paid(state, id).await?)
        }
        "order:markPaid" => {
            let ById { id } = parse::<ById<OrderId>>(payload)?;
            reply("order marked as paid", commands::mark_paid(state, id).await?)
        }
        "order:markUnpaid" => {
            let ById { id } = parse::<ById<OrderId>>(payload)?;
            reply("order marked as not paid", commands::mark_unpaid(state, id).await?)
        }
        "order:fetchById" => {
            let ById { id } = parse::<ById<OrderId>>(payload)?;
            reply("order fetched", commands::fetch_order(state, id).await?)
        }
        "order:fetchAll" => reply("orders fetched", commands::fetch_orders(state).await?),
        "order:fetchByCustomer" => {
            let ByCustomer { customer_id } = parse(payload)?;
            reply(
                "orders fetched",
                commands::fetch_orders_by_customer(state, customer_id).await?,
            )
        }

        "user:create" => {
            let Credentials { name, password } = parse(payload)?;
            reply("user created", commands::create_user(state, name, password).await?)
        }
        "user:auth" => {
            let Credentials { name, password } = parse(payload)?;
            reply("authenticated", commands::authenticate(state, name, password).await?)
        }

        other => Err(CommandError::UnknownChannel(other.to_string())),
    }
}

fn parse<T: DeserializeOwned>(payload: JsonValue) -> Result<T, CommandError> {
    serde_json::from_value(payload).map_err(CommandError::InvalidPayload)
}

fn reply<T: Serialize>(message: &'static str, value: T) -> Reply {
    let data = serde_json::to_value(value).map_err(CommandError::Encode)?;
    Ok((message, data))
}
