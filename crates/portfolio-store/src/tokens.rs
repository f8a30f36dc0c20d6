use crate::db::PortfolioDb;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use portfolio_core::{ProviderToken, StoreResult, TokenStore, ValuationError};

impl PortfolioDb {
    pub async fn load_kron_token(&self) -> Result<Option<ProviderToken>> {
        let row: Option<(String, String, Option<String>)> = sqlx::query_as(
            "SELECT access_token, refresh_token, token_type FROM kron_token WHERE id = 1",
        )
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|(access_token, refresh_token, token_type)| ProviderToken {
            access_token,
            refresh_token,
            token_type,
        }))
    }

    pub async fn save_kron_token(&self, token: &ProviderToken) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kron_token (id, access_token, refresh_token, token_type, updated_at)
            VALUES (1, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                token_type = excluded.token_type,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&token.access_token)
        .bind(&token.refresh_token)
        .bind(&token.token_type)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;

        Ok(())
    }
}

#[async_trait]
impl TokenStore for PortfolioDb {
    async fn load_token(&self) -> StoreResult<Option<ProviderToken>> {
        self.load_kron_token().await.map_err(ValuationError::store)
    }

    async fn save_token(&self, token: &ProviderToken) -> StoreResult<()> {
        self.save_kron_token(token).await.map_err(ValuationError::store)
    }
}
