use anyhow::Result;
use rust_decimal::prelude::*;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

/// SQLite-backed store for accounts, ledgers, targets and snapshots.
#[derive(Clone)]
pub struct PortfolioDb {
    pool: SqlitePool,
}

impl PortfolioDb {
    /// Create a new database connection and apply the schema.
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // An in-memory database lives only as long as its connection.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        tracing::info!("Database ready at {}", database_url);

        Ok(db)
    }

    async fn init_schema(&self) -> Result<()> {
        let schema = include_str!("../schema.sql");

        // sqlx executes one statement per query
        for statement in schema.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&self.pool).await?;
            }
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

pub(crate) fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

pub(crate) fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

#[cfg(test)]
pub(crate) async fn memory_db() -> PortfolioDb {
    PortfolioDb::new("sqlite::memory:").await.unwrap()
}
