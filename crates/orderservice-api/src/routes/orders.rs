//! Routes for the `Order` aggregate.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Json, Router, routing::get};
use orderservice_core::error::DomainError;
use orderservice_core::model::{Order, Orderline, Version};
use orderservice_core::repository::{Predicate, UpdateOutcome};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// One line in a create or update request.
#[derive(Debug, Deserialize)]
pub struct OrderlineRequest {
    /// Identifier of an existing line to keep; omitted for a new line.
    #[serde(default)]
    pub id: Option<i32>,
    /// Product name. A missing product is rejected by the store.
    #[serde(default)]
    pub product: Option<String>,
    /// Price per unit.
    #[serde(default)]
    pub unit_price: f64,
    /// Number of units.
    #[serde(default)]
    pub quantity: i32,
}

impl From<OrderlineRequest> for Orderline {
    fn from(request: OrderlineRequest) -> Self {
        Self {
            id: request.id,
            product: request.product,
            unit_price: request.unit_price,
            quantity: request.quantity,
        }
    }
}

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    /// Name of the ordering customer.
    pub customer_name: String,
    /// Lines to create with the order. Any `id` given here is ignored.
    #[serde(default)]
    pub orderlines: Vec<OrderlineRequest>,
}

/// Request body for PUT /{id}.
///
/// `orderlines` is the complete desired set: persisted lines left out are
/// deleted, lines without an `id` are inserted.
#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    /// New customer name.
    pub customer_name: String,
    /// Version token from the read this edit is based on.
    #[serde(default)]
    pub version: Option<i64>,
    /// Desired lines.
    #[serde(default)]
    pub orderlines: Vec<OrderlineRequest>,
}

/// Query string for GET /.
#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    /// Only return orders for this customer.
    pub customer_name: Option<String>,
}

/// Query string for DELETE /{id}.
#[derive(Debug, Deserialize)]
pub struct DeleteOrderQuery {
    /// Version token the delete is based on. Defaults to the stored one.
    pub version: Option<i64>,
}

/// GET /
#[instrument(skip(state))]
async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let predicate: Option<Box<Predicate<Order>>> = query.customer_name.map(|name| {
        Box::new(move |order: &Order| order.customer_name == name) as Box<Predicate<Order>>
    });

    let orders = state.orders.read(predicate.as_deref()).await?;

    Ok(Json(orders))
}

/// GET /{id}
#[instrument(skip(state))]
async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Order>, ApiError> {
    let order = state
        .orders
        .find(id)
        .await?
        .ok_or(DomainError::AggregateNotFound(id))?;

    Ok(Json(order))
}

/// POST /
#[instrument(skip(state, request), fields(customer_name = %request.customer_name))]
async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let mut order = Order::new(request.customer_name);
    order.orderlines = request
        .orderlines
        .into_iter()
        .map(|line| Orderline {
            id: None,
            ..Orderline::from(line)
        })
        .collect();

    state.orders.create(&mut order).await?;

    info!(order_id = ?order.id, lines = order.orderlines.len(), "order created");
    Ok((StatusCode::CREATED, Json(order)))
}

/// PUT /{id}
#[instrument(skip(state, request), fields(version = ?request.version))]
async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(request): Json<UpdateOrderRequest>,
) -> Result<Json<Order>, ApiError> {
    let mut order = Order {
        id: Some(id),
        customer_name: request.customer_name,
        orderlines: request.orderlines.into_iter().map(Orderline::from).collect(),
        version: request.version.map(Version::from_raw),
    };

    match state.orders.update(&mut order).await? {
        UpdateOutcome::Applied => Ok(Json(order)),
        UpdateOutcome::Conflict => {
            warn!("order update rejected");
            Err(ApiError::Conflict { order_id: id })
        }
    }
}

/// DELETE /{id}
#[instrument(skip(state))]
async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(query): Query<DeleteOrderQuery>,
) -> Result<StatusCode, ApiError> {
    let mut order = state
        .orders
        .find(id)
        .await?
        .ok_or(DomainError::AggregateNotFound(id))?;
    if let Some(version) = query.version {
        order.version = Some(Version::from_raw(version));
    }

    match state.orders.delete(&order).await? {
        UpdateOutcome::Applied => Ok(StatusCode::NO_CONTENT),
        UpdateOutcome::Conflict => {
            warn!("order delete rejected");
            Err(ApiError::Conflict { order_id: id })
        }
    }
}

/// Returns the router for orders, to be nested under a collection path.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route(
            "/{id}",
            get(get_order).put(update_order).delete(delete_order),
        )
}
