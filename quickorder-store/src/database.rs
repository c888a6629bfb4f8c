use quickorder_core::RepositoryError;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

/// Map a driver error onto the repository error space. Unique violations
/// become `Conflict`; everything else is a backend failure.
pub(crate) fn map_err(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Conflict(db.message().to_string())
        }
        sqlx::Error::RowNotFound => RepositoryError::NotFound("row".to_string()),
        _ => RepositoryError::Backend(Box::new(err)),
    }
}

pub(crate) fn decode_err(err: impl std::error::Error + Send + Sync + 'static) -> RepositoryError {
    RepositoryError::Backend(Box::new(err))
}

/// Quantities are `u32` in the domain and `INTEGER` in the schema.
pub(crate) fn to_quantity(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}
