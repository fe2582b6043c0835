//! Database Module
//!
//! PostgreSQL connection pool management and idempotent schema bootstrap.
//! Monetary columns are NUMERIC(15,2); that column type is the reference
//! for all fixed-point arithmetic in the service.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Pool configuration. Tuned for a request-serving workload with a small
/// background worker pool sharing the same connections.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn from_env(database_url: &str) -> Self {
        Self {
            url: database_url.to_string(),
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            min_connections: std::env::var("DB_MIN_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
            acquire_timeout_secs: std::env::var("DB_ACQUIRE_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
        }
    }
}

/// Database connection wrapper.
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    /// Connect and ensure the schema exists.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let config = DatabaseConfig::from_env(database_url);
        tracing::info!(
            "Connecting to database with pool config: max={}, min={}, acquire_timeout={}s",
            config.max_connections,
            config.min_connections,
            config.acquire_timeout_secs
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// Creates the three tables if they do not exist. Safe to run on every
    /// startup.
    async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users(
                user_id         BIGSERIAL PRIMARY KEY,
                login           TEXT NOT NULL UNIQUE,
                password_hash   VARCHAR(64) NOT NULL,
                current         NUMERIC(15,2) NOT NULL DEFAULT 0.00,
                withdrawn       NUMERIC(15,2) NOT NULL DEFAULT 0.00
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders(
                order_id        TEXT NOT NULL UNIQUE,
                user_id         BIGINT NOT NULL,
                status          VARCHAR(10) NOT NULL,
                accrual         NUMERIC(15,2) NOT NULL DEFAULT 0.00,
                uploaded_at     TIMESTAMP WITH TIME ZONE NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS withdrawals(
                order_id        TEXT NOT NULL,
                user_id         BIGINT NOT NULL,
                sum             NUMERIC(15,2) NOT NULL,
                processed_at    TIMESTAMP WITH TIME ZONE NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
