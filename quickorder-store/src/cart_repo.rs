use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quickorder_catalog::{IngredientSelection, Temperature};
use quickorder_core::repository::{CartRepository, RepoResult};
use quickorder_core::RepositoryError;
use quickorder_order::{Cart, CartItem, CartOwner};
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use tracing::debug;
use uuid::Uuid;

use crate::database::{decode_err, map_err, to_quantity};

pub struct PgCartRepository {
    pool: PgPool,
}

impl PgCartRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Make sure the owner has a cart row. Two first requests for the same owner
/// race here; the unique owner_key lets exactly one insert win.
async fn ensure_cart(conn: &mut PgConnection, owner: &CartOwner) -> RepoResult<()> {
    let key = owner.key();
    let inserted = sqlx::query(
        r#"
        INSERT INTO carts (id, owner_key, user_id, session_id)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (owner_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&key)
    .bind(owner.user_id())
    .bind(owner.session_id())
    .execute(&mut *conn)
    .await
    .map_err(map_err)?;

    if inserted.rows_affected() == 1 {
        debug!(owner = %key, "created cart");
    }
    Ok(())
}

/// Read the owner's cart. With `for_update` the cart row stays locked until the
/// surrounding transaction ends, serializing changes to that cart.
async fn load_cart(conn: &mut PgConnection, owner: &CartOwner, for_update: bool) -> RepoResult<Cart> {
    let sql = if for_update {
        "SELECT id, created_at, updated_at FROM carts WHERE owner_key = $1 FOR UPDATE"
    } else {
        "SELECT id, created_at, updated_at FROM carts WHERE owner_key = $1"
    };
    let row: CartRow = sqlx::query_as(sql)
        .bind(owner.key())
        .fetch_one(&mut *conn)
        .await
        .map_err(map_err)?;

    let item_rows: Vec<CartItemRow> = sqlx::query_as(
        "SELECT id, product_id, quantity, temperature, ingredients, created_at FROM cart_items WHERE cart_id = $1 ORDER BY created_at",
    )
    .bind(row.id)
    .fetch_all(&mut *conn)
    .await
    .map_err(map_err)?;

    let items = item_rows
        .into_iter()
        .map(CartItem::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Cart {
        id: row.id,
        owner: owner.clone(),
        items,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

async fn insert_line(conn: &mut PgConnection, cart_id: Uuid, item: &CartItem) -> RepoResult<()> {
    let ingredients = serde_json::to_value(&item.ingredients).map_err(decode_err)?;
    sqlx::query(
        r#"
        INSERT INTO cart_items (id, cart_id, product_id, quantity, temperature, ingredients, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(item.id)
    .bind(cart_id)
    .bind(item.product_id)
    .bind(item.quantity as i32)
    .bind(item.temperature.as_str())
    .bind(ingredients)
    .bind(item.created_at)
    .execute(&mut *conn)
    .await
    .map_err(map_err)?;
    Ok(())
}

async fn set_line_quantity(conn: &mut PgConnection, item_id: Uuid, quantity: u32) -> RepoResult<()> {
    sqlx::query("UPDATE cart_items SET quantity = $2 WHERE id = $1")
        .bind(item_id)
        .bind(quantity as i32)
        .execute(&mut *conn)
        .await
        .map_err(map_err)?;
    Ok(())
}

async fn delete_line(conn: &mut PgConnection, item_id: Uuid) -> RepoResult<()> {
    sqlx::query("DELETE FROM cart_items WHERE id = $1")
        .bind(item_id)
        .execute(&mut *conn)
        .await
        .map_err(map_err)?;
    Ok(())
}

async fn touch(conn: &mut PgConnection, cart: &Cart) -> RepoResult<()> {
    sqlx::query("UPDATE carts SET updated_at = $2 WHERE id = $1")
        .bind(cart.id)
        .bind(cart.updated_at)
        .execute(&mut *conn)
        .await
        .map_err(map_err)?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct CartRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CartItemRow {
    id: Uuid,
    product_id: Uuid,
    quantity: i32,
    temperature: String,
    ingredients: Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = quickorder_core::RepositoryError;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        let temperature: Temperature = row.temperature.parse().map_err(decode_err)?;
        let ingredients: Vec<IngredientSelection> =
            serde_json::from_value(row.ingredients).map_err(decode_err)?;
        Ok(CartItem {
            id: row.id,
            product_id: row.product_id,
            quantity: to_quantity(row.quantity),
            temperature,
            ingredients,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl CartRepository for PgCartRepository {
    async fn get_or_create_cart(&self, owner: &CartOwner) -> RepoResult<Cart> {
        let mut conn = self.pool.acquire().await.map_err(map_err)?;
        ensure_cart(&mut conn, owner).await?;
        load_cart(&mut conn, owner, false).await
    }

    async fn add_cart_item(
        &self,
        owner: &CartOwner,
        product_id: Uuid,
        quantity: i64,
        temperature: Temperature,
        ingredients: Vec<IngredientSelection>,
    ) -> RepoResult<(Cart, Uuid)> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;
        ensure_cart(&mut tx, owner).await?;
        let mut cart = load_cart(&mut tx, owner, true).await?;

        let existed: Vec<Uuid> = cart.items.iter().map(|item| item.id).collect();
        let line_id = cart.add_item(product_id, quantity, temperature, ingredients)?;
        let line = cart
            .items
            .iter()
            .find(|item| item.id == line_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("cart item {}", line_id)))?;

        if existed.contains(&line_id) {
            set_line_quantity(&mut tx, line_id, line.quantity).await?;
        } else {
            insert_line(&mut tx, cart.id, line).await?;
        }
        touch(&mut tx, &cart).await?;

        tx.commit().await.map_err(map_err)?;
        Ok((cart, line_id))
    }

    async fn update_cart_item(&self, owner: &CartOwner, item_id: Uuid, quantity: i64) -> RepoResult<Cart> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;
        ensure_cart(&mut tx, owner).await?;
        let mut cart = load_cart(&mut tx, owner, true).await?;

        match cart.update_quantity(item_id, quantity)? {
            Some(quantity) => set_line_quantity(&mut tx, item_id, quantity).await?,
            None => delete_line(&mut tx, item_id).await?,
        }
        touch(&mut tx, &cart).await?;

        tx.commit().await.map_err(map_err)?;
        Ok(cart)
    }

    async fn remove_cart_item(&self, owner: &CartOwner, item_id: Uuid) -> RepoResult<Cart> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;
        ensure_cart(&mut tx, owner).await?;
        let mut cart = load_cart(&mut tx, owner, true).await?;

        cart.remove_item(item_id)?;
        delete_line(&mut tx, item_id).await?;
        touch(&mut tx, &cart).await?;

        tx.commit().await.map_err(map_err)?;
        Ok(cart)
    }
}
