use crate::db::{to_decimal, to_f64, PortfolioDb};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portfolio_core::{AccessInfo, Account, AccountId, AccountStore, StoreResult, ValuationError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Input for creating or replacing an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub name: String,
    pub account_type: String,
    #[serde(default)]
    pub is_automatic: bool,
    #[serde(default)]
    pub total_value: Option<Decimal>,
    #[serde(default)]
    pub access_info: Option<AccessInfo>,
}

impl NewAccount {
    /// Automatic accounts must carry a credential shape the dispatcher knows.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(anyhow!("Account name is required"));
        }
        if self.is_automatic
            && self
                .access_info
                .as_ref()
                .and_then(AccessInfo::credentials)
                .is_none()
        {
            return Err(anyhow!(
                "Automatic accounts need an account key or a username and password"
            ));
        }
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: i64,
    created_at: String,
    name: String,
    account_type: String,
    total_value: f64,
    is_automatic: bool,
    has_access: Option<i64>,
    access_key: Option<String>,
    account_key: Option<String>,
    username: Option<String>,
    password: Option<String>,
    last_edited: Option<DateTime<Utc>>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        let access_info = row.has_access.map(|_| AccessInfo {
            access_key: row.access_key,
            account_key: row.account_key,
            username: row.username,
            password: row.password,
            last_edited: row.last_edited,
        });
        Account {
            id: row.id,
            created_at: row.created_at,
            name: row.name,
            account_type: row.account_type,
            total_value: to_decimal(row.total_value),
            is_automatic: row.is_automatic,
            access_info,
        }
    }
}

const SELECT_ACCOUNT: &str = r#"
    SELECT a.id, a.created_at, a.name, a.account_type, a.total_value, a.is_automatic,
           ai.account_id AS has_access, ai.access_key, ai.account_key, ai.username,
           ai.password, ai.last_edited
    FROM account a
    LEFT JOIN access_info ai ON ai.account_id = a.id
"#;

impl PortfolioDb {
    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!("{} ORDER BY a.id", SELECT_ACCOUNT))
            .fetch_all(self.pool())
            .await?;

        Ok(rows.into_iter().map(Account::from).collect())
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!("{} WHERE a.id = ?", SELECT_ACCOUNT))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(Account::from))
    }

    /// Accounts whose `account_type` matches, ignoring case.
    pub async fn list_accounts_by_type(&self, account_type: &str) -> Result<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            "{} WHERE UPPER(a.account_type) = UPPER(?) ORDER BY a.id",
            SELECT_ACCOUNT
        ))
        .bind(account_type)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Account::from).collect())
    }

    pub async fn create_account(&self, account: &NewAccount) -> Result<AccountId> {
        account.validate()?;
        let mut tx = self.pool().begin().await?;

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO account (created_at, name, account_type, total_value, is_automatic)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(account.name.trim())
        .bind(account.account_type.trim())
        .bind(to_f64(account.total_value.unwrap_or_default()))
        .bind(account.is_automatic)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(info) = &account.access_info {
            upsert_access_info(&mut tx, id, info).await?;
        }

        tx.commit().await?;
        tracing::info!("Created account {} ({})", account.name, id);
        Ok(id)
    }

    /// Replace an account's fields. Access info is replaced when given and
    /// kept otherwise. Returns false when the account does not exist.
    pub async fn update_account(&self, id: AccountId, account: &NewAccount) -> Result<bool> {
        if account.name.trim().is_empty() {
            return Err(anyhow!("Account name is required"));
        }
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE account
            SET name = ?, account_type = ?, is_automatic = ?,
                total_value = COALESCE(?, total_value)
            WHERE id = ?
            "#,
        )
        .bind(account.name.trim())
        .bind(account.account_type.trim())
        .bind(account.is_automatic)
        .bind(account.total_value.map(to_f64))
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        if let Some(info) = &account.access_info {
            upsert_access_info(&mut tx, id, info).await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    pub async fn delete_account(&self, id: AccountId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM account WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn update_account_total_value(&self, id: AccountId, value: Decimal) -> Result<()> {
        let result = sqlx::query("UPDATE account SET total_value = ? WHERE id = ?")
            .bind(to_f64(value))
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            tracing::warn!("No account {} to update total value for", id);
        }
        Ok(())
    }
}

async fn upsert_access_info(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    account_id: AccountId,
    info: &AccessInfo,
) -> Result<()> {
    let last_edited = info.last_edited.unwrap_or_else(Utc::now);
    sqlx::query(
        r#"
        INSERT INTO access_info (account_id, access_key, account_key, username, password, last_edited)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(account_id) DO UPDATE SET
            access_key = excluded.access_key,
            account_key = excluded.account_key,
            username = excluded.username,
            password = excluded.password,
            last_edited = excluded.last_edited
        "#,
    )
    .bind(account_id)
    .bind(&info.access_key)
    .bind(&info.account_key)
    .bind(&info.username)
    .bind(&info.password)
    .bind(last_edited)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[async_trait]
impl AccountStore for PortfolioDb {
    async fn list_accounts(&self) -> StoreResult<Vec<Account>> {
        PortfolioDb::list_accounts(self)
            .await
            .map_err(ValuationError::store)
    }

    async fn get_account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        PortfolioDb::get_account(self, id)
            .await
            .map_err(ValuationError::store)
    }

    async fn update_account_total_value(&self, id: AccountId, value: Decimal) -> StoreResult<()> {
        PortfolioDb::update_account_total_value(self, id, value)
            .await
            .map_err(ValuationError::store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_db;
    use rust_decimal_macros::dec;

    fn manual(name: &str, account_type: &str) -> NewAccount {
        NewAccount {
            name: name.to_string(),
            account_type: account_type.to_string(),
            is_automatic: false,
            total_value: None,
            access_info: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_account_with_access_info() {
        let db = memory_db().await;
        let mut account = manual("Kron", "FUND");
        account.is_automatic = true;
        account.access_info = Some(AccessInfo::token_pair("acc-1", Some("key".to_string())));

        let id = db.create_account(&account).await.unwrap();
        let stored = db.get_account(id).await.unwrap().unwrap();

        assert_eq!(stored.name, "Kron");
        assert!(stored.is_automatic);
        let info = stored.access_info.unwrap();
        assert_eq!(info.account_key.as_deref(), Some("acc-1"));
        assert!(info.last_edited.is_some());
    }

    #[tokio::test]
    async fn test_manual_account_has_no_access_info() {
        let db = memory_db().await;
        let id = db.create_account(&manual("Aksjer", "STOCK")).await.unwrap();
        let stored = db.get_account(id).await.unwrap().unwrap();
        assert!(stored.access_info.is_none());
        assert_eq!(stored.total_value, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_automatic_account_requires_credentials() {
        let db = memory_db().await;
        let mut account = manual("Bare Bitcoin", "CRYPTOCURRENCY");
        account.is_automatic = true;
        assert!(db.create_account(&account).await.is_err());
        assert!(db.list_accounts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_total_value_snapshot() {
        let db = memory_db().await;
        let id = db.create_account(&manual("Aksjer", "STOCK")).await.unwrap();
        db.update_account_total_value(id, dec!(1234.56)).await.unwrap();
        let stored = db.get_account(id).await.unwrap().unwrap();
        assert_eq!(stored.total_value, dec!(1234.56));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let db = memory_db().await;
        let id = db.create_account(&manual("Old", "STOCK")).await.unwrap();

        assert!(db.update_account(id, &manual("New", "FUND")).await.unwrap());
        assert!(!db.update_account(999, &manual("Nope", "FUND")).await.unwrap());
        let stored = db.get_account(id).await.unwrap().unwrap();
        assert_eq!(stored.name, "New");
        assert_eq!(stored.account_type, "FUND");

        assert!(db.delete_account(id).await.unwrap());
        assert!(db.get_account(id).await.unwrap().is_none());
        assert!(!db.delete_account(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_by_type_ignores_case() {
        let db = memory_db().await;
        db.create_account(&manual("A", "STOCK")).await.unwrap();
        db.create_account(&manual("B", "Fund")).await.unwrap();
        let funds = db.list_accounts_by_type("FUND").await.unwrap();
        assert_eq!(funds.len(), 1);
        assert_eq!(funds[0].name, "B");
    }
}
