use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quickorder_catalog::IngredientSelection;
use quickorder_core::repository::{OrderRepository, RepoResult};
use quickorder_core::RepositoryError;
use quickorder_order::{Cart, CartOwner, Order, OrderItem, OrderStatus};
use quickorder_shared::Masked;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::database::{decode_err, map_err, to_quantity};

pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn with_items(&self, rows: Vec<OrderRow>) -> RepoResult<Vec<Order>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let item_rows: Vec<OrderItemRow> = sqlx::query_as(
            r#"
            SELECT id, order_id, product_id, product_name, unit_price, quantity, line_total, temperature, ingredients, created_at
            FROM order_items WHERE order_id = ANY($1) ORDER BY created_at
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            by_order.entry(row.order_id).or_default().push(row.try_into()?);
        }

        rows.into_iter()
            .map(|row| {
                let items = by_order.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect()
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    user_id: Option<Uuid>,
    session_id: Option<String>,
    customer_name: String,
    customer_phone: String,
    customer_email: Option<String>,
    delivery_address: Option<String>,
    payment_method: String,
    payment_status: String,
    notes: Option<String>,
    status: String,
    total_amount: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> RepoResult<Order> {
        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            user_id: self.user_id,
            session_id: self.session_id,
            customer_name: self.customer_name,
            customer_phone: Masked(self.customer_phone),
            customer_email: self.customer_email.map(Masked),
            delivery_address: self.delivery_address,
            payment_method: self.payment_method,
            payment_status: self.payment_status.parse().map_err(decode_err)?,
            notes: self.notes,
            status: self.status.parse().map_err(decode_err)?,
            total_amount: self.total_amount,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    product_name: String,
    unit_price: Decimal,
    quantity: i32,
    line_total: Decimal,
    temperature: String,
    ingredients: Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let ingredients: Vec<IngredientSelection> =
            serde_json::from_value(row.ingredients).map_err(decode_err)?;
        Ok(OrderItem {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            product_name: row.product_name,
            unit_price: row.unit_price,
            quantity: to_quantity(row.quantity),
            line_total: row.line_total,
            temperature: row.temperature.parse().map_err(decode_err)?,
            ingredients,
            created_at: row.created_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, order_number, user_id, session_id, customer_name, customer_phone, customer_email, delivery_address, payment_method, payment_status, notes, status, total_amount, created_at, updated_at";

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create_order(&self, order: &Order, consumed_cart: Option<&Cart>) -> RepoResult<Uuid> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, user_id, session_id, customer_name, customer_phone, customer_email,
                                delivery_address, payment_method, payment_status, notes, status, total_amount, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.user_id)
        .bind(&order.session_id)
        .bind(&order.customer_name)
        .bind(&order.customer_phone.0)
        .bind(order.customer_email.as_ref().map(|email| email.0.as_str()))
        .bind(&order.delivery_address)
        .bind(&order.payment_method)
        .bind(order.payment_status.as_str())
        .bind(&order.notes)
        .bind(order.status.as_str())
        .bind(order.total_amount)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_err)?;

        for item in &order.items {
            let ingredients = serde_json::to_value(&item.ingredients).map_err(decode_err)?;
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, product_name, unit_price, quantity, line_total, temperature, ingredients, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(item.id)
            .bind(order.id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(item.unit_price)
            .bind(item.quantity as i32)
            .bind(item.line_total)
            .bind(item.temperature.as_str())
            .bind(ingredients)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        }

        if let Some(cart) = consumed_cart {
            // Lock the cart so no line can be added or changed until commit.
            sqlx::query("SELECT id FROM carts WHERE id = $1 FOR UPDATE")
                .bind(cart.id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_err)?
                .ok_or_else(|| RepositoryError::NotFound(format!("cart {}", cart.id)))?;

            let mut stored: Vec<(Uuid, i32)> =
                sqlx::query_as("SELECT id, quantity FROM cart_items WHERE cart_id = $1")
                    .bind(cart.id)
                    .fetch_all(&mut *tx)
                    .await
                    .map_err(map_err)?;
            let mut ordered: Vec<(Uuid, i32)> = cart
                .items
                .iter()
                .map(|item| (item.id, item.quantity as i32))
                .collect();
            stored.sort();
            ordered.sort();
            if stored != ordered {
                return Err(RepositoryError::Conflict(
                    "cart changed during checkout, please review it and try again".to_string(),
                ));
            }

            let line_ids: Vec<Uuid> = cart.items.iter().map(|item| item.id).collect();
            sqlx::query("DELETE FROM cart_items WHERE id = ANY($1)")
                .bind(&line_ids)
                .execute(&mut *tx)
                .await
                .map_err(map_err)?;
            sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
                .bind(cart.id)
                .execute(&mut *tx)
                .await
                .map_err(map_err)?;
        }

        tx.commit().await.map_err(map_err)?;
        Ok(order.id)
    }

    async fn get_order(&self, id: Uuid) -> RepoResult<Option<Order>> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_err)?;

        match row {
            Some(row) => Ok(self.with_items(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_orders_for(&self, owner: &CartOwner) -> RepoResult<Vec<Order>> {
        let rows: Vec<OrderRow> = match owner {
            CartOwner::User(user_id) => sqlx::query_as::<_, OrderRow>(&format!(
                "SELECT {} FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
                ORDER_COLUMNS
            ))
            .bind(user_id)
            .fetch_all(&self.pool)
            .await,
            CartOwner::Guest(session_id) => sqlx::query_as::<_, OrderRow>(&format!(
                "SELECT {} FROM orders WHERE session_id = $1 ORDER BY created_at DESC",
                ORDER_COLUMNS
            ))
            .bind(session_id)
            .fetch_all(&self.pool)
            .await,
        }
        .map_err(map_err)?;

        self.with_items(rows).await
    }

    async fn list_orders(&self, status: Option<OrderStatus>, limit: Option<i64>) -> RepoResult<Vec<Order>> {
        // LIMIT NULL means no limit in PostgreSQL
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {} FROM orders WHERE ($1::TEXT IS NULL OR status = $1) ORDER BY created_at DESC LIMIT $2",
            ORDER_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .bind(limit.map(|l| l.max(0)))
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        self.with_items(rows).await
    }

    async fn update_order(&self, order: &Order, expected: OrderStatus) -> RepoResult<()> {
        let result = sqlx::query(
            "UPDATE orders SET status = $2, payment_status = $3, updated_at = $4 WHERE id = $1 AND status = $5",
        )
        .bind(order.id)
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.updated_at)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_err)?;

        if result.rows_affected() == 0 {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE id = $1)")
                .bind(order.id)
                .fetch_one(&self.pool)
                .await
                .map_err(map_err)?;
            if !exists {
                return Err(RepositoryError::NotFound(format!("order {}", order.id)));
            }
            return Err(RepositoryError::Conflict(format!(
                "order {} is no longer {}",
                order.order_number, expected
            )));
        }
        Ok(())
    }

    async fn count_orders(&self, status: Option<OrderStatus>) -> RepoResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE ($1::TEXT IS NULL OR status = $1)")
            .bind(status.map(|s| s.as_str()))
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)
    }
}
