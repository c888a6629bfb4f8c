use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use quickorder_core::Principal;
use quickorder_order::{checkout, CustomerDetails, Order};
use quickorder_shared::OrderEvent;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub delivery_address: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/orders", get(list_orders).post(place_order))
        .route("/v1/orders/{id}", get(get_order))
}

/// Fill blank contact fields from the caller's profile, if they have one.
async fn customer_details(
    state: &AppState,
    principal: &Principal,
    req: CheckoutRequest,
) -> Result<CustomerDetails, AppError> {
    let mut details = CustomerDetails {
        name: req.customer_name,
        phone: req.customer_phone,
        email: req.customer_email,
        delivery_address: req.delivery_address,
        payment_method: req.payment_method,
        notes: req.notes,
    };

    if let Some(user_id) = principal.user_id() {
        if let Some(user) = state.users.get_user(user_id).await? {
            if details.name.trim().is_empty() {
                details.name = user.name;
            }
            if details.phone.trim().is_empty() {
                details.phone = user.phone.unwrap_or_default();
            }
            if details.email.is_none() {
                details.email = Some(user.email);
            }
            if details.delivery_address.is_none() {
                details.delivery_address = user.address;
            }
        }
    }
    Ok(details)
}

/// POST /v1/orders
async fn place_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let details = customer_details(&state, &principal, req).await?;
    let cart = state.carts.get_or_create_cart(&principal.owner).await?;
    let products = state.products.get_products(&cart.product_ids()).await?;

    let order = checkout(&cart, &products, details)?;
    state.orders.create_order(&order, Some(&cart)).await?;

    info!(
        order_id = %order.id,
        order_number = %order.order_number,
        owner = %principal.owner,
        total = %order.total_amount,
        phone = %order.customer_phone,
        "Order placed"
    );
    state.publish(OrderEvent::placed(
        order.id,
        &order.order_number,
        order.status.as_str(),
        order.total_amount,
    ));

    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /v1/orders
async fn list_orders(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.orders.list_orders_for(&principal.owner).await?))
}

/// GET /v1/orders/{id}
async fn get_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    // Someone else's order looks exactly like a missing one.
    state
        .orders
        .get_order(id)
        .await?
        .filter(|o| o.is_owned_by(&principal.owner))
        .map(Json)
        .ok_or_else(|| AppError::NotFoundError(format!("Order {} not found", id)))
}
