use async_trait::async_trait;
use quickorder_catalog::{Ingredient, IngredientSelection, Product, Store, Temperature};
use quickorder_core::repository::{
    CartRepository, OrderRepository, ProductRepository, RepoResult, StoreRepository,
    UserRepository,
};
use quickorder_core::{RepositoryError, User};
use quickorder_order::{Cart, CartOwner, Order, OrderStatus};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-local backend implementing every repository trait.
///
/// Used by the test suites and by the service when no database URL is set.
/// Data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    products: RwLock<HashMap<Uuid, Product>>,
    stores: RwLock<HashMap<Uuid, Store>>,
    /// Keyed by `CartOwner::key()`, one cart per owner.
    carts: RwLock<HashMap<String, Cart>>,
    orders: RwLock<HashMap<Uuid, Order>>,
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Same line ids with the same quantities, in any order.
fn same_lines(stored: &Cart, consumed: &Cart) -> bool {
    let mut a: Vec<(Uuid, u32)> = stored.items.iter().map(|i| (i.id, i.quantity)).collect();
    let mut b: Vec<(Uuid, u32)> = consumed.items.iter().map(|i| (i.id, i.quantity)).collect();
    a.sort();
    b.sort();
    a == b
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn create_product(&self, product: &Product) -> RepoResult<Uuid> {
        let mut products = self.products.write().await;
        if products.contains_key(&product.id) {
            return Err(RepositoryError::Conflict(format!("product {}", product.id)));
        }
        products.insert(product.id, product.clone());
        Ok(product.id)
    }

    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn get_products(&self, ids: &[Uuid]) -> RepoResult<Vec<Product>> {
        let products = self.products.read().await;
        let mut found: Vec<Product> = Vec::new();
        for id in ids {
            if let Some(product) = products.get(id) {
                if !found.iter().any(|p| p.id == *id) {
                    found.push(product.clone());
                }
            }
        }
        Ok(found)
    }

    async fn list_products(&self, active_only: bool) -> RepoResult<Vec<Product>> {
        let products = self.products.read().await;
        let mut listed: Vec<Product> = products
            .values()
            .filter(|p| !active_only || p.is_active)
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listed)
    }

    async fn update_product(&self, product: &Product) -> RepoResult<()> {
        let mut products = self.products.write().await;
        let existing = products
            .get_mut(&product.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("product {}", product.id)))?;
        let ingredients = std::mem::take(&mut existing.ingredients);
        *existing = Product {
            ingredients,
            ..product.clone()
        };
        Ok(())
    }

    async fn save_ingredient(&self, ingredient: &Ingredient) -> RepoResult<()> {
        let mut products = self.products.write().await;
        let product = products.get_mut(&ingredient.product_id).ok_or_else(|| {
            RepositoryError::NotFound(format!("product {}", ingredient.product_id))
        })?;
        match product.ingredients.iter_mut().find(|i| i.id == ingredient.id) {
            Some(existing) => *existing = ingredient.clone(),
            None => product.ingredients.push(ingredient.clone()),
        }
        Ok(())
    }

    async fn count_products(&self) -> RepoResult<i64> {
        Ok(self.products.read().await.len() as i64)
    }
}

#[async_trait]
impl StoreRepository for MemoryStore {
    async fn create_store(&self, store: &Store) -> RepoResult<Uuid> {
        let mut stores = self.stores.write().await;
        if stores.contains_key(&store.id) {
            return Err(RepositoryError::Conflict(format!("store {}", store.id)));
        }
        stores.insert(store.id, store.clone());
        Ok(store.id)
    }

    async fn get_store(&self, id: Uuid) -> RepoResult<Option<Store>> {
        Ok(self.stores.read().await.get(&id).cloned())
    }

    async fn list_stores(&self, active_only: bool) -> RepoResult<Vec<Store>> {
        let stores = self.stores.read().await;
        let mut listed: Vec<Store> = stores
            .values()
            .filter(|s| !active_only || s.is_active)
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listed)
    }

    async fn update_store(&self, store: &Store) -> RepoResult<()> {
        let mut stores = self.stores.write().await;
        match stores.get_mut(&store.id) {
            Some(existing) => {
                *existing = store.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!("store {}", store.id))),
        }
    }
}

#[async_trait]
impl CartRepository for MemoryStore {
    async fn get_or_create_cart(&self, owner: &CartOwner) -> RepoResult<Cart> {
        // Single write lock covers the check and the insert.
        let mut carts = self.carts.write().await;
        let cart = carts
            .entry(owner.key())
            .or_insert_with(|| Cart::new(owner.clone()));
        Ok(cart.clone())
    }

    async fn add_cart_item(
        &self,
        owner: &CartOwner,
        product_id: Uuid,
        quantity: i64,
        temperature: Temperature,
        ingredients: Vec<IngredientSelection>,
    ) -> RepoResult<(Cart, Uuid)> {
        let mut carts = self.carts.write().await;
        let cart = carts
            .entry(owner.key())
            .or_insert_with(|| Cart::new(owner.clone()));
        let line_id = cart.add_item(product_id, quantity, temperature, ingredients)?;
        Ok((cart.clone(), line_id))
    }

    async fn update_cart_item(&self, owner: &CartOwner, item_id: Uuid, quantity: i64) -> RepoResult<Cart> {
        let mut carts = self.carts.write().await;
        let cart = carts
            .entry(owner.key())
            .or_insert_with(|| Cart::new(owner.clone()));
        cart.update_quantity(item_id, quantity)?;
        Ok(cart.clone())
    }

    async fn remove_cart_item(&self, owner: &CartOwner, item_id: Uuid) -> RepoResult<Cart> {
        let mut carts = self.carts.write().await;
        let cart = carts
            .entry(owner.key())
            .or_insert_with(|| Cart::new(owner.clone()));
        cart.remove_item(item_id)?;
        Ok(cart.clone())
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn create_order(&self, order: &Order, consumed_cart: Option<&Cart>) -> RepoResult<Uuid> {
        // Both locks are held so the order and the emptied cart appear together.
        let mut orders = self.orders.write().await;
        let mut carts = self.carts.write().await;

        if orders.contains_key(&order.id) {
            return Err(RepositoryError::Conflict(format!("order {}", order.id)));
        }
        if let Some(consumed) = consumed_cart {
            let cart = carts
                .get_mut(&consumed.owner.key())
                .filter(|c| c.id == consumed.id)
                .ok_or_else(|| RepositoryError::NotFound(format!("cart {}", consumed.id)))?;
            if !same_lines(cart, consumed) {
                return Err(RepositoryError::Conflict(
                    "cart changed during checkout, please review it and try again".to_string(),
                ));
            }
            cart.items.retain(|item| !consumed.items.iter().any(|c| c.id == item.id));
            cart.updated_at = chrono::Utc::now();
        }
        orders.insert(order.id, order.clone());
        Ok(order.id)
    }

    async fn get_order(&self, id: Uuid) -> RepoResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn list_orders_for(&self, owner: &CartOwner) -> RepoResult<Vec<Order>> {
        let orders = self.orders.read().await;
        let owned = orders
            .values()
            .filter(|o| o.is_owned_by(owner))
            .cloned()
            .collect();
        Ok(newest_first(owned))
    }

    async fn list_orders(&self, status: Option<OrderStatus>, limit: Option<i64>) -> RepoResult<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut listed = newest_first(
            orders
                .values()
                .filter(|o| status.map_or(true, |s| o.status == s))
                .cloned()
                .collect(),
        );
        if let Some(limit) = limit {
            listed.truncate(usize::try_from(limit).unwrap_or(0));
        }
        Ok(listed)
    }

    async fn update_order(&self, order: &Order, expected: OrderStatus) -> RepoResult<()> {
        let mut orders = self.orders.write().await;
        let existing = orders
            .get_mut(&order.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("order {}", order.id)))?;
        if existing.status != expected {
            return Err(RepositoryError::Conflict(format!(
                "order {} is no longer {}",
                order.order_number, expected
            )));
        }
        existing.status = order.status;
        existing.payment_status = order.payment_status;
        existing.updated_at = order.updated_at;
        Ok(())
    }

    async fn count_orders(&self, status: Option<OrderStatus>) -> RepoResult<i64> {
        let orders = self.orders.read().await;
        let count = orders
            .values()
            .filter(|o| status.map_or(true, |s| o.status == s))
            .count();
        Ok(count as i64)
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: &User) -> RepoResult<Uuid> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(RepositoryError::Conflict(format!(
                "email {} is already registered",
                user.email
            )));
        }
        users.insert(user.id, user.clone());
        Ok(user.id)
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let email = email.trim().to_lowercase();
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let users = self.users.read().await;
        let mut listed: Vec<User> = users.values().cloned().collect();
        listed.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(listed)
    }

    async fn update_user(&self, user: &User) -> RepoResult<()> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.id != user.id && u.email == user.email) {
            return Err(RepositoryError::Conflict(format!(
                "email {} is already registered",
                user.email
            )));
        }
        match users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!("user {}", user.id))),
        }
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self.users.write().await.remove(&id).is_some())
    }

    async fn count_users(&self) -> RepoResult<i64> {
        Ok(self.users.read().await.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickorder_catalog::{IngredientSelection, Temperature};
    use quickorder_order::{apply_status, checkout, CustomerDetails};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn customer() -> CustomerDetails {
        CustomerDetails {
            name: "Mei".into(),
            phone: "0912345678".into(),
            email: None,
            delivery_address: None,
            payment_method: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_concurrent_cart_creation_yields_one_cart() {
        let store = Arc::new(MemoryStore::new());
        let owner = CartOwner::User(Uuid::new_v4());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let owner = owner.clone();
            handles.push(tokio::spawn(async move {
                store.get_or_create_cart(&owner).await.unwrap().id
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn test_checkout_empties_cart_with_order() {
        let store = MemoryStore::new();
        let product = Product::new("Cheesecake", dec!(35.00));
        store.create_product(&product).await.unwrap();

        let owner = CartOwner::Guest("guest-1".into());
        let (cart, _) = store
            .add_cart_item(&owner, product.id, 2, Temperature::Normal, vec![])
            .await
            .unwrap();

        let order = checkout(&cart, &[product], customer()).unwrap();
        store.create_order(&order, Some(&cart)).await.unwrap();

        let cart = store.get_or_create_cart(&owner).await.unwrap();
        assert!(cart.is_empty());
        let mine = store.list_orders_for(&owner).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].total_amount, dec!(70.00));
        assert!(store
            .list_orders_for(&CartOwner::Guest("guest-2".into()))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.count_orders(Some(OrderStatus::Pending)).await.unwrap(), 1);
        assert_eq!(store.count_orders(Some(OrderStatus::Ready)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_cart_adds_keep_every_line() {
        let store = Arc::new(MemoryStore::new());
        let owner = CartOwner::Guest("guest-busy".into());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let owner = owner.clone();
            handles.push(tokio::spawn(async move {
                store
                    .add_cart_item(&owner, Uuid::new_v4(), 1, Temperature::Normal, vec![])
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let cart = store.get_or_create_cart(&owner).await.unwrap();
        assert_eq!(cart.items.len(), 8);
    }

    #[tokio::test]
    async fn test_cart_change_rules_apply_to_stored_cart() {
        let store = MemoryStore::new();
        let owner = CartOwner::User(Uuid::new_v4());
        let product = Uuid::new_v4();

        let (_, line) = store
            .add_cart_item(&owner, product, 60, Temperature::Cold, vec![])
            .await
            .unwrap();
        // a stale caller adding on top still hits the per-line cap
        assert!(matches!(
            store.add_cart_item(&owner, product, 60, Temperature::Cold, vec![]).await,
            Err(RepositoryError::Rejected(_))
        ));

        let cart = store.update_cart_item(&owner, line, 0).await.unwrap();
        assert!(cart.is_empty());
        assert!(matches!(
            store.remove_cart_item(&owner, line).await,
            Err(RepositoryError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn test_checkout_keeps_lines_added_after_cart_was_read() {
        let store = MemoryStore::new();
        let cake = Product::new("Cheesecake", dec!(35.00));
        let tea = Product::new("Oolong Tea", dec!(20.00));
        store.create_product(&cake).await.unwrap();
        store.create_product(&tea).await.unwrap();

        let owner = CartOwner::Guest("guest-late".into());
        let (read, _) = store
            .add_cart_item(&owner, cake.id, 1, Temperature::Normal, vec![])
            .await
            .unwrap();
        let order = checkout(&read, &[cake.clone(), tea.clone()], customer()).unwrap();

        // another request adds a line before the order is stored
        store
            .add_cart_item(&owner, tea.id, 1, Temperature::Hot, vec![])
            .await
            .unwrap();

        assert!(matches!(
            store.create_order(&order, Some(&read)).await,
            Err(RepositoryError::Conflict(_))
        ));
        let cart = store.get_or_create_cart(&owner).await.unwrap();
        assert_eq!(cart.items.len(), 2);
        assert!(store.list_orders_for(&owner).await.unwrap().is_empty());

        let order = checkout(&cart, &[cake, tea], customer()).unwrap();
        store.create_order(&order, Some(&cart)).await.unwrap();
        assert!(store.get_or_create_cart(&owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stale_status_write_cannot_reopen_terminal_order() {
        let store = MemoryStore::new();
        let product = Product::new("Cheesecake", dec!(35.00));
        let owner = CartOwner::Guest("guest-admin".into());
        let (cart, _) = store
            .add_cart_item(&owner, product.id, 1, Temperature::Normal, vec![])
            .await
            .unwrap();
        let order = checkout(&cart, &[product], customer()).unwrap();
        store.create_order(&order, Some(&cart)).await.unwrap();

        // two admins load the same pending order
        let mut first = store.get_order(order.id).await.unwrap().unwrap();
        let mut second = store.get_order(order.id).await.unwrap().unwrap();

        let previous = apply_status(&mut first, OrderStatus::Completed).unwrap();
        store.update_order(&first, previous).await.unwrap();

        let previous = apply_status(&mut second, OrderStatus::Cancelled).unwrap();
        assert_eq!(previous, OrderStatus::Pending);
        assert!(matches!(
            store.update_order(&second, previous).await,
            Err(RepositoryError::Conflict(_))
        ));

        let stored = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn test_list_orders_filters_by_status_and_limit() {
        let store = MemoryStore::new();
        let product = Product::new("Cheesecake", dec!(35.00));
        let owner = CartOwner::Guest("guest-many".into());
        for _ in 0..3 {
            let (cart, _) = store
                .add_cart_item(&owner, product.id, 1, Temperature::Normal, vec![])
                .await
                .unwrap();
            let order = checkout(&cart, std::slice::from_ref(&product), customer()).unwrap();
            store.create_order(&order, Some(&cart)).await.unwrap();
        }
        let mut ready = store.list_orders(None, Some(1)).await.unwrap().remove(0);
        let previous = apply_status(&mut ready, OrderStatus::Ready).unwrap();
        store.update_order(&ready, previous).await.unwrap();

        assert_eq!(store.list_orders(None, None).await.unwrap().len(), 3);
        assert_eq!(store.list_orders(Some(OrderStatus::Pending), None).await.unwrap().len(), 2);
        assert_eq!(store.list_orders(Some(OrderStatus::Pending), Some(1)).await.unwrap().len(), 1);
        let only_ready = store.list_orders(Some(OrderStatus::Ready), None).await.unwrap();
        assert_eq!(only_ready.len(), 1);
        assert_eq!(only_ready[0].id, ready.id);
    }

    #[tokio::test]
    async fn test_update_product_keeps_ingredients() {
        let store = MemoryStore::new();
        let mut product = Product::new("Oolong Tea", dec!(20.00));
        store.create_product(&product).await.unwrap();

        let lemon = Ingredient::new(product.id, "Lemon", dec!(2.00));
        store.save_ingredient(&lemon).await.unwrap();

        product.price = dec!(21.00);
        store.update_product(&product).await.unwrap();

        let stored = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(stored.price, dec!(21.00));
        assert_eq!(stored.ingredients.len(), 1);

        let mut lemon = lemon;
        lemon.price = dec!(2.50);
        store.save_ingredient(&lemon).await.unwrap();
        let stored = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(stored.ingredients[0].price, dec!(2.50));
    }

    #[tokio::test]
    async fn test_saved_cart_round_trips_selections() {
        let store = MemoryStore::new();
        let owner = CartOwner::User(Uuid::new_v4());
        let milk = Uuid::new_v4();
        let (cart, _) = store
            .add_cart_item(
                &owner,
                Uuid::new_v4(),
                1,
                Temperature::Hot,
                vec![IngredientSelection::Reference(milk)],
            )
            .await
            .unwrap();

        let reloaded = store.get_or_create_cart(&owner).await.unwrap();
        assert_eq!(reloaded.items, cart.items);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        let user = User::new("Mei", "mei@example.com", "secret1").unwrap();
        store.create_user(&user).await.unwrap();

        let twin = User::new("Mei Again", "MEI@example.com", "secret2").unwrap();
        assert!(matches!(
            store.create_user(&twin).await,
            Err(RepositoryError::Conflict(_))
        ));
        assert!(store.find_by_email(" Mei@Example.com").await.unwrap().is_some());
        assert!(store.delete_user(user.id).await.unwrap());
        assert!(!store.delete_user(user.id).await.unwrap());
    }
}
