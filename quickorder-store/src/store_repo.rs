use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quickorder_catalog::Store;
use quickorder_core::repository::{RepoResult, StoreRepository};
use quickorder_core::RepositoryError;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use crate::database::map_err;

pub struct PgStoreRepository {
    pool: PgPool,
}

impl PgStoreRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn with_products(&self, rows: Vec<StoreRow>) -> RepoResult<Vec<Store>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let links: Vec<(Uuid, Uuid)> = sqlx::query_as(
            "SELECT store_id, product_id FROM store_products WHERE store_id = ANY($1) ORDER BY position",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        let mut by_store: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for (store_id, product_id) in links {
            by_store.entry(store_id).or_default().push(product_id);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let product_ids = by_store.remove(&row.id).unwrap_or_default();
                row.into_store(product_ids)
            })
            .collect())
    }
}

async fn replace_links(
    tx: &mut Transaction<'_, Postgres>,
    store: &Store,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM store_products WHERE store_id = $1")
        .bind(store.id)
        .execute(&mut **tx)
        .await?;

    for (position, product_id) in store.product_ids.iter().enumerate() {
        sqlx::query("INSERT INTO store_products (store_id, product_id, position) VALUES ($1, $2, $3)")
            .bind(store.id)
            .bind(product_id)
            .bind(position as i32)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

#[derive(sqlx::FromRow)]
struct StoreRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    work_time: Option<String>,
    address: Option<String>,
    phone: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StoreRow {
    fn into_store(self, product_ids: Vec<Uuid>) -> Store {
        Store {
            id: self.id,
            name: self.name,
            description: self.description,
            work_time: self.work_time,
            address: self.address,
            phone: self.phone,
            is_active: self.is_active,
            product_ids,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const STORE_COLUMNS: &str =
    "id, name, description, work_time, address, phone, is_active, created_at, updated_at";

#[async_trait]
impl StoreRepository for PgStoreRepository {
    async fn create_store(&self, store: &Store) -> RepoResult<Uuid> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;

        sqlx::query(
            r#"
            INSERT INTO stores (id, name, description, work_time, address, phone, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(store.id)
        .bind(&store.name)
        .bind(&store.description)
        .bind(&store.work_time)
        .bind(&store.address)
        .bind(&store.phone)
        .bind(store.is_active)
        .bind(store.created_at)
        .bind(store.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_err)?;

        replace_links(&mut tx, store).await.map_err(map_err)?;
        tx.commit().await.map_err(map_err)?;
        Ok(store.id)
    }

    async fn get_store(&self, id: Uuid) -> RepoResult<Option<Store>> {
        let row: Option<StoreRow> =
            sqlx::query_as(&format!("SELECT {} FROM stores WHERE id = $1", STORE_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_err)?;

        match row {
            Some(row) => Ok(self.with_products(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_stores(&self, active_only: bool) -> RepoResult<Vec<Store>> {
        let rows: Vec<StoreRow> = sqlx::query_as(&format!(
            "SELECT {} FROM stores WHERE ($1 = FALSE OR is_active) ORDER BY name",
            STORE_COLUMNS
        ))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        self.with_products(rows).await
    }

    async fn update_store(&self, store: &Store) -> RepoResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;

        let result = sqlx::query(
            r#"
            UPDATE stores
            SET name = $2, description = $3, work_time = $4, address = $5,
                phone = $6, is_active = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(store.id)
        .bind(&store.name)
        .bind(&store.description)
        .bind(&store.work_time)
        .bind(&store.address)
        .bind(&store.phone)
        .bind(store.is_active)
        .bind(store.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("store {}", store.id)));
        }

        replace_links(&mut tx, store).await.map_err(map_err)?;
        tx.commit().await.map_err(map_err)?;
        Ok(())
    }
}
