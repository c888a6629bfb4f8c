use async_trait::async_trait;
use quickorder_catalog::{Ingredient, IngredientSelection, Product, Store, Temperature};
use quickorder_order::{Cart, CartOwner, Order, OrderStatus};
use uuid::Uuid;

use crate::identity::User;
use crate::RepositoryError;

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository trait for the product catalog.
///
/// Products are returned with their ingredients attached.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn create_product(&self, product: &Product) -> RepoResult<Uuid>;

    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>>;

    /// Fetch many products at once; unknown ids are skipped.
    async fn get_products(&self, ids: &[Uuid]) -> RepoResult<Vec<Product>>;

    async fn list_products(&self, active_only: bool) -> RepoResult<Vec<Product>>;

    /// Overwrite the product's own columns. Ingredients go through `save_ingredient`.
    async fn update_product(&self, product: &Product) -> RepoResult<()>;

    /// Insert or update a single ingredient row.
    async fn save_ingredient(&self, ingredient: &Ingredient) -> RepoResult<()>;

    async fn count_products(&self) -> RepoResult<i64>;
}

#[async_trait]
pub trait StoreRepository: Send + Sync {
    async fn create_store(&self, store: &Store) -> RepoResult<Uuid>;

    async fn get_store(&self, id: Uuid) -> RepoResult<Option<Store>>;

    async fn list_stores(&self, active_only: bool) -> RepoResult<Vec<Store>>;

    /// Overwrite the store, including its product links.
    async fn update_store(&self, store: &Store) -> RepoResult<()>;
}

/// Cart storage. Every change is applied to the stored cart under a per-cart
/// lock and written line by line, so concurrent requests never drop a line.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Return the owner's cart, creating an empty one on first use.
    /// Concurrent first calls for the same owner must yield the same cart.
    async fn get_or_create_cart(&self, owner: &CartOwner) -> RepoResult<Cart>;

    /// Add a line, merging with an equal line as `Cart::add_item` does.
    /// Returns the updated cart and the id of the touched line.
    async fn add_cart_item(
        &self,
        owner: &CartOwner,
        product_id: Uuid,
        quantity: i64,
        temperature: Temperature,
        ingredients: Vec<IngredientSelection>,
    ) -> RepoResult<(Cart, Uuid)>;

    /// Set a line's quantity; zero or below removes it.
    async fn update_cart_item(&self, owner: &CartOwner, item_id: Uuid, quantity: i64) -> RepoResult<Cart>;

    async fn remove_cart_item(&self, owner: &CartOwner, item_id: Uuid) -> RepoResult<Cart>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist a new order with its items. When `consumed_cart` is given, the
    /// lines it holds are removed from the stored cart in the same unit of work.
    /// Fails with `Conflict` if the stored cart no longer matches those lines.
    async fn create_order(&self, order: &Order, consumed_cart: Option<&Cart>) -> RepoResult<Uuid>;

    async fn get_order(&self, id: Uuid) -> RepoResult<Option<Order>>;

    /// Orders placed by the owner, newest first.
    async fn list_orders_for(&self, owner: &CartOwner) -> RepoResult<Vec<Order>>;

    /// All orders, newest first, optionally restricted to one status.
    async fn list_orders(&self, status: Option<OrderStatus>, limit: Option<i64>) -> RepoResult<Vec<Order>>;

    /// Persist header changes (status, payment status). Items are immutable.
    /// Only applies while the stored status is still `expected`; otherwise
    /// fails with `Conflict`.
    async fn update_order(&self, order: &Order, expected: OrderStatus) -> RepoResult<()>;

    async fn count_orders(&self, status: Option<OrderStatus>) -> RepoResult<i64>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the email is already registered.
    async fn create_user(&self, user: &User) -> RepoResult<Uuid>;

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;

    async fn list_users(&self) -> RepoResult<Vec<User>>;

    async fn update_user(&self, user: &User) -> RepoResult<()>;

    /// Returns false if no such user existed.
    async fn delete_user(&self, id: Uuid) -> RepoResult<bool>;

    async fn count_users(&self) -> RepoResult<i64>;
}
