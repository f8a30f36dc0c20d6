use crate::db::{to_decimal, to_f64, PortfolioDb};
use anyhow::Result;
use chrono::{NaiveDate, Utc};
use portfolio_core::AccountId;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuePoint {
    pub account_id: AccountId,
    pub date: String,
    pub value: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct ValuePointRow {
    account_id: i64,
    date: String,
    value: f64,
}

impl PortfolioDb {
    /// Portfolio total stored by the previous summary run.
    pub async fn last_total_value(&self) -> Result<Option<Decimal>> {
        let row: Option<(f64,)> = sqlx::query_as("SELECT value FROM value_since_last WHERE id = 1")
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(|(value,)| to_decimal(value)))
    }

    pub async fn update_last_total_value(&self, value: Decimal) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO value_since_last (id, value, updated_at) VALUES (1, ?, ?)
            ON CONFLICT(id) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(to_f64(value))
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn record_value_over_time(
        &self,
        account_id: AccountId,
        date: NaiveDate,
        value: Decimal,
    ) -> Result<()> {
        sqlx::query("INSERT INTO value_over_time (account_id, date, value) VALUES (?, ?, ?)")
            .bind(account_id)
            .bind(date.format("%Y-%m-%d").to_string())
            .bind(to_f64(value))
            .execute(self.pool())
            .await?;

        Ok(())
    }

    pub async fn value_over_time(&self, account_id: AccountId) -> Result<Vec<ValuePoint>> {
        let rows = sqlx::query_as::<_, ValuePointRow>(
            "SELECT account_id, date, value FROM value_over_time WHERE account_id = ? ORDER BY date, id",
        )
        .bind(account_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ValuePoint {
                account_id: row.account_id,
                date: row.date,
                value: to_decimal(row.value),
            })
            .collect())
    }
}
