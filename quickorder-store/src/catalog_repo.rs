use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quickorder_catalog::{Ingredient, Product};
use quickorder_core::repository::{ProductRepository, RepoResult};
use quickorder_core::RepositoryError;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::database::map_err;

pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Attach every ingredient (active or not) to the given product rows.
    async fn with_ingredients(&self, rows: Vec<ProductRow>) -> RepoResult<Vec<Product>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let ingredient_rows: Vec<IngredientRow> = sqlx::query_as(
            "SELECT id, product_id, name, price, is_active, created_at FROM ingredients WHERE product_id = ANY($1) ORDER BY created_at, name",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        let mut by_product: HashMap<Uuid, Vec<Ingredient>> = HashMap::new();
        for row in ingredient_rows {
            by_product.entry(row.product_id).or_default().push(row.into());
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let ingredients = by_product.remove(&row.id).unwrap_or_default();
                row.into_product(ingredients)
            })
            .collect())
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    price: Decimal,
    special_price: Decimal,
    cold_price: Decimal,
    hot_price: Decimal,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_product(self, ingredients: Vec<Ingredient>) -> Product {
        Product {
            id: self.id,
            name: self.name,
            description: self.description,
            price: self.price,
            special_price: self.special_price,
            cold_price: self.cold_price,
            hot_price: self.hot_price,
            is_active: self.is_active,
            ingredients,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct IngredientRow {
    id: Uuid,
    product_id: Uuid,
    name: String,
    price: Decimal,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<IngredientRow> for Ingredient {
    fn from(row: IngredientRow) -> Self {
        Ingredient {
            id: row.id,
            product_id: row.product_id,
            name: row.name,
            price: row.price,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, special_price, cold_price, hot_price, is_active, created_at, updated_at";

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn create_product(&self, product: &Product) -> RepoResult<Uuid> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;

        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price, special_price, cold_price, hot_price, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.special_price)
        .bind(product.cold_price)
        .bind(product.hot_price)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_err)?;

        for ingredient in &product.ingredients {
            sqlx::query(
                "INSERT INTO ingredients (id, product_id, name, price, is_active, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(ingredient.id)
            .bind(product.id)
            .bind(&ingredient.name)
            .bind(ingredient.price)
            .bind(ingredient.is_active)
            .bind(ingredient.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        }

        tx.commit().await.map_err(map_err)?;
        Ok(product.id)
    }

    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_err)?;

        match row {
            Some(row) => Ok(self.with_ingredients(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn get_products(&self, ids: &[Uuid]) -> RepoResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<ProductRow> =
            sqlx::query_as(&format!("SELECT {} FROM products WHERE id = ANY($1)", PRODUCT_COLUMNS))
                .bind(ids)
                .fetch_all(&self.pool)
                .await
                .map_err(map_err)?;

        self.with_ingredients(rows).await
    }

    async fn list_products(&self, active_only: bool) -> RepoResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {} FROM products WHERE ($1 = FALSE OR is_active) ORDER BY name",
            PRODUCT_COLUMNS
        ))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        self.with_ingredients(rows).await
    }

    async fn update_product(&self, product: &Product) -> RepoResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = $2, description = $3, price = $4, special_price = $5,
                cold_price = $6, hot_price = $7, is_active = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.special_price)
        .bind(product.cold_price)
        .bind(product.hot_price)
        .bind(product.is_active)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("product {}", product.id)));
        }
        Ok(())
    }

    async fn save_ingredient(&self, ingredient: &Ingredient) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ingredients (id, product_id, name, price, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, price = EXCLUDED.price, is_active = EXCLUDED.is_active
            "#,
        )
        .bind(ingredient.id)
        .bind(ingredient.product_id)
        .bind(&ingredient.name)
        .bind(ingredient.price)
        .bind(ingredient.is_active)
        .bind(ingredient.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn count_products(&self) -> RepoResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)
    }
}
