use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use quickorder_catalog::{
    aggregate_total, order_snapshot, IngredientIndex, IngredientSelection, PricedItem, Product,
    Temperature,
};
use quickorder_core::Principal;
use quickorder_order::Cart;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub temperature: Temperature,
    /// Ids of the product's add-on ingredients.
    #[serde(default)]
    pub ingredient_ids: Vec<Uuid>,
}

fn default_quantity() -> i64 { 1 }

#[derive(Debug, Deserialize)]
pub struct UpdateCartItemRequest {
    pub quantity: i64,
}

#[derive(Debug, Serialize)]
pub struct CartLineView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub temperature: Temperature,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    /// Add-ons with their current names and prices.
    pub ingredients: Vec<IngredientSelection>,
    /// False once the product is gone or deactivated; such lines block checkout.
    pub available: bool,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub id: Uuid,
    pub items: Vec<CartLineView>,
    pub total_items: u32,
    pub total_amount: Decimal,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/cart", get(get_cart))
        .route("/v1/cart/items", post(add_item))
        .route("/v1/cart/items/{id}", put(update_item).delete(remove_item))
}

/// Price every line of `cart` against the catalog as it is now.
pub async fn cart_view(state: &AppState, cart: &Cart) -> Result<CartView, AppError> {
    let products = state.products.get_products(&cart.product_ids()).await?;
    let index = IngredientIndex::from_products(products.iter());
    let by_id: HashMap<Uuid, &Product> = products.iter().map(|p| (p.id, p)).collect();

    let mut priced: Vec<PricedItem> = Vec::new();
    let mut items = Vec::with_capacity(cart.items.len());
    for line in &cart.items {
        match by_id.get(&line.product_id).filter(|p| p.is_active) {
            Some(product) => {
                let item = line.priced(product);
                let snapshot = order_snapshot(&item, &product.name, &index);
                items.push(CartLineView {
                    id: line.id,
                    product_id: line.product_id,
                    product_name: Some(snapshot.product_name),
                    temperature: line.temperature,
                    quantity: line.quantity,
                    unit_price: snapshot.unit_price,
                    line_total: snapshot.line_total,
                    ingredients: snapshot.ingredients,
                    available: true,
                });
                priced.push(item);
            }
            None => items.push(CartLineView {
                id: line.id,
                product_id: line.product_id,
                product_name: by_id.get(&line.product_id).map(|p| p.name.clone()),
                temperature: line.temperature,
                quantity: line.quantity,
                unit_price: Decimal::ZERO,
                line_total: Decimal::ZERO,
                ingredients: line.ingredients.clone(),
                available: false,
            }),
        }
    }

    Ok(CartView {
        id: cart.id,
        items,
        total_items: cart.total_items(),
        total_amount: aggregate_total(&priced, &index),
    })
}

/// Turn requested ingredient ids into cart selections, rejecting anything that
/// is not an active add-on of `product`. Order-insensitive so that the same
/// choice always merges into the same line.
fn selections_for(product: &Product, ingredient_ids: &[Uuid]) -> Result<Vec<IngredientSelection>, AppError> {
    let mut ids = ingredient_ids.to_vec();
    ids.sort();
    ids.dedup();
    for id in &ids {
        if !product.ingredient(*id).is_some_and(|i| i.is_active) {
            return Err(AppError::ValidationError(format!(
                "Ingredient {} is not available for {}",
                id, product.name
            )));
        }
    }
    Ok(ids.into_iter().map(IngredientSelection::Reference).collect())
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/cart
async fn get_cart(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<CartView>, AppError> {
    let cart = state.carts.get_or_create_cart(&principal.owner).await?;
    Ok(Json(cart_view(&state, &cart).await?))
}

/// POST /v1/cart/items
async fn add_item(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<AddCartItemRequest>,
) -> Result<(StatusCode, Json<CartView>), AppError> {
    let product = state
        .products
        .get_product(req.product_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFoundError(format!("Product {} not found", req.product_id)))?;
    let selections = selections_for(&product, &req.ingredient_ids)?;

    let (cart, line_id) = state
        .carts
        .add_cart_item(&principal.owner, product.id, req.quantity, req.temperature, selections)
        .await?;

    tracing::debug!(owner = %principal.owner, line = %line_id, product = %product.name, "Cart line added");
    Ok((StatusCode::CREATED, Json(cart_view(&state, &cart).await?)))
}

/// PUT /v1/cart/items/{id}
async fn update_item(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(item_id): Path<Uuid>,
    Json(req): Json<UpdateCartItemRequest>,
) -> Result<Json<CartView>, AppError> {
    let cart = state
        .carts
        .update_cart_item(&principal.owner, item_id, req.quantity)
        .await?;
    Ok(Json(cart_view(&state, &cart).await?))
}

/// DELETE /v1/cart/items/{id}
async fn remove_item(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<CartView>, AppError> {
    let cart = state.carts.remove_cart_item(&principal.owner, item_id).await?;
    Ok(Json(cart_view(&state, &cart).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickorder_catalog::Ingredient;
    use rust_decimal_macros::dec;

    #[test]
    fn test_selections_are_sorted_and_checked() {
        let mut product = Product::new("Oolong Tea", dec!(20.00));
        let lemon = Ingredient::new(product.id, "Lemon", dec!(2.00));
        let honey = Ingredient::new(product.id, "Honey", dec!(3.00));
        let (lemon_id, honey_id) = (lemon.id, honey.id);
        product.ingredients = vec![lemon, honey];

        let a = selections_for(&product, &[lemon_id, honey_id]).unwrap();
        let b = selections_for(&product, &[honey_id, lemon_id, honey_id]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);

        assert!(selections_for(&product, &[Uuid::new_v4()]).is_err());
        product.ingredients[0].is_active = false;
        assert!(selections_for(&product, &[lemon_id]).is_err());
    }
}
