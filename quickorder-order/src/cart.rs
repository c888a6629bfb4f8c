use chrono::{DateTime, Utc};
use quickorder_catalog::{IngredientSelection, PricedItem, Product, Temperature};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Maximum quantity allowed per cart line.
pub const MAX_QUANTITY_PER_LINE: u32 = 99;

/// Who a cart (and the orders placed from it) belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum CartOwner {
    User(Uuid),
    /// Ephemeral guest session id.
    Guest(String),
}

impl CartOwner {
    /// Unique key the carts table is constrained on.
    pub fn key(&self) -> String {
        match self {
            CartOwner::User(id) => format!("user:{}", id),
            CartOwner::Guest(session) => format!("guest:{}", session),
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            CartOwner::User(id) => Some(*id),
            CartOwner::Guest(_) => None,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            CartOwner::User(_) => None,
            CartOwner::Guest(session) => Some(session),
        }
    }
}

impl fmt::Display for CartOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: u32,
    pub temperature: Temperature,
    pub ingredients: Vec<IngredientSelection>,
    pub created_at: DateTime<Utc>,
}

impl CartItem {
    /// Pricing input for this line against the product's current prices.
    pub fn priced(&self, product: &Product) -> PricedItem {
        PricedItem::for_product(product, self.temperature, self.quantity, self.ingredients.clone())
    }
}

/// A shopping cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub id: Uuid,
    pub owner: CartOwner,
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(owner: CartOwner) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a line, merging into an existing line with the same product,
    /// temperature and ingredient selection.
    pub fn add_item(
        &mut self,
        product_id: Uuid,
        quantity: i64,
        temperature: Temperature,
        ingredients: Vec<IngredientSelection>,
    ) -> Result<Uuid, CartError> {
        let quantity = checked_quantity(quantity)?;

        if let Some(existing) = self.items.iter_mut().find(|item| {
            item.product_id == product_id
                && item.temperature == temperature
                && item.ingredients == ingredients
        }) {
            let merged = existing.quantity + quantity;
            if merged > MAX_QUANTITY_PER_LINE {
                return Err(CartError::QuantityExceedsLimit(merged, MAX_QUANTITY_PER_LINE));
            }
            existing.quantity = merged;
            self.updated_at = Utc::now();
            return Ok(existing.id);
        }

        let item = CartItem {
            id: Uuid::new_v4(),
            product_id,
            quantity,
            temperature,
            ingredients,
            created_at: Utc::now(),
        };
        let id = item.id;
        self.items.push(item);
        self.updated_at = Utc::now();
        Ok(id)
    }

    /// Set a line's quantity. Zero or below removes the line and returns `None`.
    pub fn update_quantity(&mut self, item_id: Uuid, quantity: i64) -> Result<Option<u32>, CartError> {
        if quantity <= 0 {
            self.remove_item(item_id)?;
            return Ok(None);
        }
        let quantity = checked_quantity(quantity)?;
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or(CartError::ItemNotFound(item_id))?;
        item.quantity = quantity;
        self.updated_at = Utc::now();
        Ok(Some(quantity))
    }

    pub fn remove_item(&mut self, item_id: Uuid) -> Result<CartItem, CartError> {
        let position = self
            .items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or(CartError::ItemNotFound(item_id))?;
        self.updated_at = Utc::now();
        Ok(self.items.remove(position))
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.updated_at = Utc::now();
    }

    pub fn total_items(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn product_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.items.iter().map(|item| item.product_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

fn checked_quantity(quantity: i64) -> Result<u32, CartError> {
    if quantity <= 0 {
        return Err(CartError::InvalidQuantity(quantity));
    }
    let quantity = u32::try_from(quantity)
        .map_err(|_| CartError::QuantityExceedsLimit(u32::MAX, MAX_QUANTITY_PER_LINE))?;
    if quantity > MAX_QUANTITY_PER_LINE {
        return Err(CartError::QuantityExceedsLimit(quantity, MAX_QUANTITY_PER_LINE));
    }
    Ok(quantity)
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CartError {
    #[error("Quantity must be positive, got {0}")]
    InvalidQuantity(i64),

    #[error("Quantity {0} exceeds the per-line limit of {1}")]
    QuantityExceedsLimit(u32, u32),

    #[error("Cart item not found: {0}")]
    ItemNotFound(Uuid),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn guest_cart() -> Cart {
        Cart::new(CartOwner::Guest("session-1".into()))
    }

    #[test]
    fn test_same_configuration_merges() {
        let mut cart = guest_cart();
        let product = Uuid::new_v4();
        let milk = IngredientSelection::Reference(Uuid::new_v4());

        let first = cart.add_item(product, 1, Temperature::Cold, vec![milk.clone()]).unwrap();
        let second = cart.add_item(product, 2, Temperature::Cold, vec![milk]).unwrap();
        assert_eq!(first, second);
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.total_items(), 3);
    }

    #[test]
    fn test_different_configuration_adds_line() {
        let mut cart = guest_cart();
        let product = Uuid::new_v4();
        cart.add_item(product, 1, Temperature::Cold, vec![]).unwrap();
        cart.add_item(product, 1, Temperature::Hot, vec![]).unwrap();
        cart.add_item(
            product,
            1,
            Temperature::Hot,
            vec![IngredientSelection::Inline { id: None, name: None, price: dec!(1) }],
        )
        .unwrap();
        assert_eq!(cart.items.len(), 3);
        assert_eq!(cart.product_ids(), vec![product]);
    }

    #[test]
    fn test_rejects_bad_quantities() {
        let mut cart = guest_cart();
        let product = Uuid::new_v4();
        assert_eq!(
            cart.add_item(product, 0, Temperature::Normal, vec![]),
            Err(CartError::InvalidQuantity(0))
        );
        assert_eq!(
            cart.add_item(product, 100, Temperature::Normal, vec![]),
            Err(CartError::QuantityExceedsLimit(100, MAX_QUANTITY_PER_LINE))
        );
        cart.add_item(product, 90, Temperature::Normal, vec![]).unwrap();
        assert_eq!(
            cart.add_item(product, 10, Temperature::Normal, vec![]),
            Err(CartError::QuantityExceedsLimit(100, MAX_QUANTITY_PER_LINE))
        );
        assert_eq!(cart.total_items(), 90);
    }

    #[test]
    fn test_update_to_zero_removes_line() {
        let mut cart = guest_cart();
        let id = cart.add_item(Uuid::new_v4(), 2, Temperature::Normal, vec![]).unwrap();
        assert_eq!(cart.update_quantity(id, 5), Ok(Some(5)));
        assert_eq!(cart.update_quantity(id, 0), Ok(None));
        assert!(cart.is_empty());
        assert_eq!(cart.update_quantity(id, 1), Err(CartError::ItemNotFound(id)));
    }

    #[test]
    fn test_negative_update_removes_line() {
        let mut cart = guest_cart();
        let id = cart.add_item(Uuid::new_v4(), 2, Temperature::Normal, vec![]).unwrap();
        assert_eq!(cart.update_quantity(id, -3), Ok(None));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_owner_keys() {
        let user = Uuid::new_v4();
        assert_eq!(CartOwner::User(user).key(), format!("user:{}", user));
        assert_eq!(CartOwner::Guest("abc".into()).key(), "guest:abc");
        assert_eq!(CartOwner::Guest("abc".into()).session_id(), Some("abc"));
        assert_eq!(CartOwner::User(user).user_id(), Some(user));
    }
}
