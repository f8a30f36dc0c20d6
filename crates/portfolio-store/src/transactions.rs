use crate::db::{to_decimal, to_f64, PortfolioDb};
use anyhow::Result;
use async_trait::async_trait;
use portfolio_core::{AccountId, StoreResult, Transaction, TransactionStore, ValuationError};

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    amount: f64,
    name: String,
    transaction_type: String,
    transaction_date: String,
    unit_price: f64,
    ticker_id: String,
    total_shares: f64,
    equity_type: String,
    account_id: i64,
}

impl From<TransactionRow> for Transaction {
    fn from(row: TransactionRow) -> Self {
        Transaction {
            id: Some(row.id),
            amount: to_decimal(row.amount),
            name: row.name,
            transaction_type: row.transaction_type.into(),
            transaction_date: row.transaction_date,
            unit_price: to_decimal(row.unit_price),
            ticker_id: row.ticker_id,
            total_shares: to_decimal(row.total_shares),
            equity_type: row.equity_type,
            account_id: row.account_id,
        }
    }
}

const SELECT_TRANSACTION: &str = r#"
    SELECT id, amount, name, transaction_type, transaction_date, unit_price,
           ticker_id, total_shares, equity_type, account_id
    FROM account_transaction
"#;

impl PortfolioDb {
    /// Ledger for one account, oldest first.
    pub async fn list_transactions(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "{} WHERE account_id = ? ORDER BY transaction_date, id",
            SELECT_TRANSACTION
        ))
        .bind(account_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Transaction::from).collect())
    }

    pub async fn list_all_transactions(&self) -> Result<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "{} ORDER BY transaction_date, id",
            SELECT_TRANSACTION
        ))
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Transaction::from).collect())
    }

    pub async fn get_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!("{} WHERE id = ?", SELECT_TRANSACTION))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(Transaction::from))
    }

    pub async fn create_transaction(&self, transaction: &Transaction) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO account_transaction
                (amount, name, transaction_type, transaction_date, unit_price,
                 ticker_id, total_shares, equity_type, account_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(to_f64(transaction.amount))
        .bind(&transaction.name)
        .bind(transaction.transaction_type.as_str())
        .bind(&transaction.transaction_date)
        .bind(to_f64(transaction.unit_price))
        .bind(&transaction.ticker_id)
        .bind(to_f64(transaction.total_shares))
        .bind(&transaction.equity_type)
        .bind(transaction.account_id)
        .fetch_one(self.pool())
        .await?;

        Ok(id)
    }

    pub async fn update_transaction(&self, id: i64, transaction: &Transaction) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE account_transaction
            SET amount = ?, name = ?, transaction_type = ?, transaction_date = ?,
                unit_price = ?, ticker_id = ?, total_shares = ?, equity_type = ?,
                account_id = ?
            WHERE id = ?
            "#,
        )
        .bind(to_f64(transaction.amount))
        .bind(&transaction.name)
        .bind(transaction.transaction_type.as_str())
        .bind(&transaction.transaction_date)
        .bind(to_f64(transaction.unit_price))
        .bind(&transaction.ticker_id)
        .bind(to_f64(transaction.total_shares))
        .bind(&transaction.equity_type)
        .bind(transaction.account_id)
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_transaction(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM account_transaction WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TransactionStore for PortfolioDb {
    async fn list_transactions(&self, account_id: AccountId) -> StoreResult<Vec<Transaction>> {
        PortfolioDb::list_transactions(self, account_id)
            .await
            .map_err(ValuationError::store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::NewAccount;
    use crate::db::memory_db;
    use portfolio_core::TransactionType;
    use rust_decimal_macros::dec;

    async fn account(db: &PortfolioDb) -> AccountId {
        db.create_account(&NewAccount {
            name: "Aksjer".to_string(),
            account_type: "STOCK".to_string(),
            is_automatic: false,
            total_value: None,
            access_info: None,
        })
        .await
        .unwrap()
    }

    fn buy(account_id: AccountId, ticker: &str, date: &str) -> Transaction {
        Transaction {
            id: None,
            amount: dec!(1500.5),
            name: ticker.to_string(),
            transaction_type: TransactionType::Buy,
            transaction_date: date.to_string(),
            unit_price: dec!(150.05),
            ticker_id: ticker.to_string(),
            total_shares: dec!(10),
            equity_type: "STOCK".to_string(),
            account_id,
        }
    }

    #[tokio::test]
    async fn test_ledger_is_ordered_by_date() {
        let db = memory_db().await;
        let account_id = account(&db).await;
        db.create_transaction(&buy(account_id, "EQNR", "2024-03-01")).await.unwrap();
        db.create_transaction(&buy(account_id, "NHY", "2024-01-01")).await.unwrap();

        let ledger = db.list_transactions(account_id).await.unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[0].ticker_id, "NHY");
        assert_eq!(ledger[1].amount, dec!(1500.5));
        assert_eq!(ledger[1].transaction_type, TransactionType::Buy);
    }

    #[tokio::test]
    async fn test_unknown_transaction_type_survives_storage() {
        let db = memory_db().await;
        let account_id = account(&db).await;
        let mut tx = buy(account_id, "EQNR", "2024-03-01");
        tx.transaction_type = TransactionType::Other("SPLIT".to_string());
        let id = db.create_transaction(&tx).await.unwrap();

        let stored = db.get_transaction(id).await.unwrap().unwrap();
        assert_eq!(stored.transaction_type, TransactionType::Other("SPLIT".to_string()));
    }

    #[tokio::test]
    async fn test_update_delete_and_cascade() {
        let db = memory_db().await;
        let account_id = account(&db).await;
        let id = db.create_transaction(&buy(account_id, "EQNR", "2024-03-01")).await.unwrap();

        let mut changed = buy(account_id, "EQNR", "2024-03-02");
        changed.total_shares = dec!(12);
        assert!(db.update_transaction(id, &changed).await.unwrap());
        assert_eq!(db.get_transaction(id).await.unwrap().unwrap().total_shares, dec!(12));

        db.create_transaction(&buy(account_id, "NHY", "2024-01-01")).await.unwrap();
        assert!(db.delete_transaction(id).await.unwrap());
        assert_eq!(db.list_all_transactions().await.unwrap().len(), 1);

        db.delete_account(account_id).await.unwrap();
        assert!(db.list_all_transactions().await.unwrap().is_empty());
    }
}
