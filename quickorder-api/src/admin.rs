use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post, put},
    Extension, Json, Router,
};
use futures_util::stream::{Stream, StreamExt};
use quickorder_catalog::{Ingredient, PriceTiers, Product, Store};
use quickorder_core::{Principal, User};
use quickorder_order::{apply_status, Order, OrderStatus};
use quickorder_shared::{OrderEvent, OrderEventKind};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

const RECENT_ORDERS: i64 = 10;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct IngredientInput {
    pub name: String,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool { true }

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub special_price: Decimal,
    #[serde(default)]
    pub cold_price: Decimal,
    #[serde(default)]
    pub hot_price: Decimal,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub ingredients: Vec<IngredientInput>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub special_price: Option<Decimal>,
    pub cold_price: Option<Decimal>,
    pub hot_price: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateIngredientRequest {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct StoreRequest {
    pub name: String,
    pub description: Option<String>,
    pub work_time: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub product_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<OrderStatus>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub product_count: i64,
    pub order_count: i64,
    pub user_count: i64,
    pub pending_orders: i64,
    pub recent_orders: Vec<Order>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/products", get(list_products).post(create_product))
        .route("/products/{id}", get(get_product).put(update_product).delete(delete_product))
        .route("/products/{id}/ingredients", post(add_ingredient))
        .route("/products/{id}/ingredients/{ingredient_id}", put(update_ingredient))
        .route("/stores", get(list_stores).post(create_store))
        .route("/stores/{id}", get(get_store).put(update_store))
        .route("/orders", get(list_orders))
        .route("/orders/events", get(order_events))
        .route("/orders/{id}", get(get_order))
        .route("/orders/{id}/status", post(update_order_status))
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", axum::routing::delete(delete_user))
}

fn non_negative(field: &str, value: Decimal) -> Result<Decimal, AppError> {
    if value < Decimal::ZERO {
        return Err(AppError::ValidationError(format!("{} must not be negative", field)));
    }
    Ok(value)
}

async fn load_product(state: &AppState, id: Uuid) -> Result<Product, AppError> {
    state
        .products
        .get_product(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("Product {} not found", id)))
}

// ============================================================================
// Dashboard
// ============================================================================

/// GET /v1/admin/dashboard
async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardResponse>, AppError> {
    Ok(Json(DashboardResponse {
        product_count: state.products.count_products().await?,
        order_count: state.orders.count_orders(None).await?,
        user_count: state.users.count_users().await?,
        pending_orders: state.orders.count_orders(Some(OrderStatus::Pending)).await?,
        recent_orders: state.orders.list_orders(None, Some(RECENT_ORDERS)).await?,
    }))
}

// ============================================================================
// Product Management Handlers
// ============================================================================

/// GET /v1/admin/products
async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.products.list_products(false).await?))
}

/// POST /v1/admin/products
async fn create_product(
    State(state): State<AppState>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let mut product = Product::new(req.name.trim(), req.price);
    product.description = req.description;
    product.set_tiers(PriceTiers {
        regular: req.price,
        special: req.special_price,
        cold: req.cold_price,
        hot: req.hot_price,
    });
    product.is_active = req.is_active;
    for input in req.ingredients {
        if input.name.trim().is_empty() {
            return Err(AppError::ValidationError("ingredient name is required".into()));
        }
        let mut ingredient = Ingredient::new(
            product.id,
            input.name.trim(),
            non_negative("ingredient price", input.price)?,
        );
        ingredient.is_active = input.is_active;
        product.ingredients.push(ingredient);
    }
    product.validate()?;

    state.products.create_product(&product).await?;
    info!(product_id = %product.id, name = %product.name, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /v1/admin/products/{id}
async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(load_product(&state, id).await?))
}

/// PUT /v1/admin/products/{id}
async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<Product>, AppError> {
    let mut product = load_product(&state, id).await?;

    if let Some(name) = req.name {
        product.name = name.trim().to_string();
    }
    if req.description.is_some() {
        product.description = req.description;
    }
    let mut tiers = product.tiers();
    tiers.regular = req.price.unwrap_or(tiers.regular);
    tiers.special = req.special_price.unwrap_or(tiers.special);
    tiers.cold = req.cold_price.unwrap_or(tiers.cold);
    tiers.hot = req.hot_price.unwrap_or(tiers.hot);
    product.set_tiers(tiers);
    if let Some(is_active) = req.is_active {
        product.is_active = is_active;
    }
    product.validate()?;
    product.updated_at = chrono::Utc::now();

    state.products.update_product(&product).await?;
    info!(product_id = %product.id, "Product updated");
    Ok(Json(product))
}

/// DELETE /v1/admin/products/{id}
///
/// Soft delete: placed orders keep pointing at the product.
async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let mut product = load_product(&state, id).await?;
    product.is_active = false;
    product.updated_at = chrono::Utc::now();
    state.products.update_product(&product).await?;
    info!(product_id = %id, "Product deactivated");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/admin/products/{id}/ingredients
async fn add_ingredient(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<IngredientInput>,
) -> Result<(StatusCode, Json<Ingredient>), AppError> {
    let product = load_product(&state, id).await?;
    if req.name.trim().is_empty() {
        return Err(AppError::ValidationError("ingredient name is required".into()));
    }
    let mut ingredient = Ingredient::new(product.id, req.name.trim(), non_negative("price", req.price)?);
    ingredient.is_active = req.is_active;

    state.products.save_ingredient(&ingredient).await?;
    Ok((StatusCode::CREATED, Json(ingredient)))
}

/// PUT /v1/admin/products/{id}/ingredients/{ingredient_id}
async fn update_ingredient(
    State(state): State<AppState>,
    Path((id, ingredient_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateIngredientRequest>,
) -> Result<Json<Ingredient>, AppError> {
    let product = load_product(&state, id).await?;
    let mut ingredient = product
        .ingredient(ingredient_id)
        .cloned()
        .ok_or_else(|| AppError::NotFoundError(format!("Ingredient {} not found", ingredient_id)))?;

    if let Some(name) = req.name {
        if name.trim().is_empty() {
            return Err(AppError::ValidationError("ingredient name is required".into()));
        }
        ingredient.name = name.trim().to_string();
    }
    if let Some(price) = req.price {
        ingredient.price = non_negative("price", price)?;
    }
    if let Some(is_active) = req.is_active {
        ingredient.is_active = is_active;
    }

    state.products.save_ingredient(&ingredient).await?;
    Ok(Json(ingredient))
}

// ============================================================================
// Store Management Handlers
// ============================================================================

/// Copy the request onto `store`, checking every linked product exists.
async fn apply_store_request(state: &AppState, store: &mut Store, req: StoreRequest) -> Result<(), AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::ValidationError("store name is required".into()));
    }
    let found = state.products.get_products(&req.product_ids).await?;
    if let Some(missing) = req.product_ids.iter().find(|id| !found.iter().any(|p| p.id == **id)) {
        return Err(AppError::ValidationError(format!("Unknown product {}", missing)));
    }

    store.name = req.name.trim().to_string();
    store.description = req.description;
    store.work_time = req.work_time;
    store.address = req.address;
    store.phone = req.phone;
    store.is_active = req.is_active;
    store.link_products(req.product_ids);
    Ok(())
}

/// GET /v1/admin/stores
async fn list_stores(State(state): State<AppState>) -> Result<Json<Vec<Store>>, AppError> {
    Ok(Json(state.stores.list_stores(false).await?))
}

/// POST /v1/admin/stores
async fn create_store(
    State(state): State<AppState>,
    Json(req): Json<StoreRequest>,
) -> Result<(StatusCode, Json<Store>), AppError> {
    let mut store = Store::new(req.name.trim());
    apply_store_request(&state, &mut store, req).await?;
    state.stores.create_store(&store).await?;
    info!(store_id = %store.id, name = %store.name, "Store created");
    Ok((StatusCode::CREATED, Json(store)))
}

/// GET /v1/admin/stores/{id}
async fn get_store(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Store>, AppError> {
    state
        .stores
        .get_store(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFoundError(format!("Store {} not found", id)))
}

/// PUT /v1/admin/stores/{id}
async fn update_store(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StoreRequest>,
) -> Result<Json<Store>, AppError> {
    let mut store = state
        .stores
        .get_store(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("Store {} not found", id)))?;
    apply_store_request(&state, &mut store, req).await?;
    store.updated_at = chrono::Utc::now();
    state.stores.update_store(&store).await?;
    Ok(Json(store))
}

// ============================================================================
// Order Management Handlers
// ============================================================================

/// GET /v1/admin/orders
async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.orders.list_orders(query.status, query.limit).await?))
}

/// GET /v1/admin/orders/{id}
async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    state
        .orders
        .get_order(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFoundError(format!("Order {} not found", id)))
}

/// POST /v1/admin/orders/{id}/status
async fn update_order_status(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, AppError> {
    let mut order = state
        .orders
        .get_order(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("Order {} not found", id)))?;

    let previous = apply_status(&mut order, req.status)?;
    if previous == order.status {
        return Ok(Json(order));
    }

    // Only lands if the status is still `previous`; a concurrent change gives 409.
    state.orders.update_order(&order, previous).await?;
    info!(
        order_id = %order.id,
        from = %previous,
        to = %order.status,
        by = %principal.owner,
        "Order status changed"
    );
    state.publish(OrderEvent::status_changed(
        order.id,
        &order.order_number,
        previous.as_str(),
        order.status.as_str(),
        order.total_amount,
    ));

    Ok(Json(order))
}

/// GET /v1/admin/orders/events
///
/// Server-sent events for every order placed or moved from now on.
async fn order_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events_tx.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => {
                let name = match event.kind {
                    OrderEventKind::Placed => "order_placed",
                    OrderEventKind::StatusChanged => "order_status_changed",
                };
                Event::default()
                    .event(name)
                    .json_data(&event)
                    .ok()
                    .map(Ok::<_, Infallible>)
            }
            Err(e) => {
                warn!("Order feed subscriber lagged: {}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ============================================================================
// User Management Handlers
// ============================================================================

/// GET /v1/admin/users
async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.users.list_users().await?))
}

/// POST /v1/admin/users
async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let mut user = User::new(&req.name, &req.email, &req.password)?;
    user.phone = req.phone.filter(|p| !p.trim().is_empty());
    user.address = req.address.filter(|a| !a.trim().is_empty());
    user.is_admin = req.is_admin;

    state.users.create_user(&user).await?;
    info!(user_id = %user.id, is_admin = user.is_admin, "User created by admin");
    Ok((StatusCode::CREATED, Json(user)))
}

/// DELETE /v1/admin/users/{id}
async fn delete_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if principal.user_id() == Some(id) {
        return Err(AppError::ValidationError("You cannot delete your own account".into()));
    }
    let user = state
        .users
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("User {} not found", id)))?;
    if user.is_admin {
        return Err(AppError::AuthorizationError("Administrator accounts cannot be deleted".into()));
    }

    state.users.delete_user(id).await?;
    info!(user_id = %id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
