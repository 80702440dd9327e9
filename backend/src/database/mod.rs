use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use studio_platform_shared::constants::{
    DB_CONNECT_TIMEOUT_SECONDS, DB_MAX_CONNECTIONS, DB_MIN_CONNECTIONS,
};
use tracing::info;

use crate::error::AppError;

/// Database instance with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database instance with connection pooling
    pub async fn new(database_url: &str) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(DB_MAX_CONNECTIONS)
            .min_connections(DB_MIN_CONNECTIONS)
            .acquire_timeout(Duration::from_secs(DB_CONNECT_TIMEOUT_SECONDS))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run embedded migrations
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }
}
