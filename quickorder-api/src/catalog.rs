use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use quickorder_catalog::{Product, Store};
use serde::Serialize;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Serialize)]
pub struct StoreView {
    #[serde(flatten)]
    pub store: Store,
    pub products: Vec<Product>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/products", get(list_products))
        .route("/v1/products/{id}", get(get_product))
        .route("/v1/stores", get(list_stores))
        .route("/v1/stores/{id}", get(get_store))
}

/// Shopper-facing copy of a product: inactive add-ons are hidden.
pub fn public_product(mut product: Product) -> Product {
    product.ingredients.retain(|i| i.is_active);
    product
}

async fn store_view(state: &AppState, store: Store) -> Result<StoreView, AppError> {
    let mut products: Vec<Product> = state
        .products
        .get_products(&store.product_ids)
        .await?
        .into_iter()
        .filter(|p| p.is_active)
        .map(public_product)
        .collect();
    // Keep the store's own ordering.
    products.sort_by_key(|p| store.product_ids.iter().position(|id| *id == p.id));
    Ok(StoreView { store, products })
}

/// GET /v1/products
async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, AppError> {
    let products = state.products.list_products(true).await?;
    Ok(Json(products.into_iter().map(public_product).collect()))
}

/// GET /v1/products/{id}
async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    state
        .products
        .get_product(id)
        .await?
        .filter(|p| p.is_active)
        .map(|p| Json(public_product(p)))
        .ok_or_else(|| AppError::NotFoundError(format!("Product {} not found", id)))
}

/// GET /v1/stores
async fn list_stores(State(state): State<AppState>) -> Result<Json<Vec<StoreView>>, AppError> {
    let stores = state.stores.list_stores(true).await?;
    let mut views = Vec::with_capacity(stores.len());
    for store in stores {
        views.push(store_view(&state, store).await?);
    }
    Ok(Json(views))
}

/// GET /v1/stores/{id}
async fn get_store(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StoreView>, AppError> {
    let store = state
        .stores
        .get_store(id)
        .await?
        .filter(|s| s.is_active)
        .ok_or_else(|| AppError::NotFoundError(format!("Store {} not found", id)))?;
    Ok(Json(store_view(&state, store).await?))
}
