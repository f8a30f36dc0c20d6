use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{
    Account, AccountId, EquityType, HoldingGoal, ProviderToken, Transaction, ValuationError,
};

pub type StoreResult<T> = Result<T, ValuationError>;

/// Read access to accounts plus the snapshot write-back.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn list_accounts(&self) -> StoreResult<Vec<Account>>;

    async fn get_account(&self, id: AccountId) -> StoreResult<Option<Account>>;

    async fn update_account_total_value(&self, id: AccountId, value: Decimal) -> StoreResult<()>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn list_transactions(&self, account_id: AccountId) -> StoreResult<Vec<Transaction>>;
}

#[async_trait]
pub trait EquityTypeStore: Send + Sync {
    async fn get_equity_type(&self, name: &str) -> StoreResult<Option<EquityType>>;

    async fn list_equity_types(&self) -> StoreResult<Vec<EquityType>>;
}

/// Per-account, per-holding goal percentages.
#[async_trait]
pub trait GoalStore: Send + Sync {
    async fn get_goal_percentage(
        &self,
        account_id: AccountId,
        holding_name: &str,
    ) -> StoreResult<Option<Decimal>>;

    async fn list_goals(&self, account_id: AccountId) -> StoreResult<Vec<HoldingGoal>>;
}

/// Persistence for the token-pair provider's OAuth tokens.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load_token(&self) -> StoreResult<Option<ProviderToken>>;

    async fn save_token(&self, token: &ProviderToken) -> StoreResult<()>;
}

/// Everything the valuation engine reads from storage.
pub trait PortfolioStore: AccountStore + TransactionStore + EquityTypeStore + GoalStore {}

impl<T> PortfolioStore for T where T: AccountStore + TransactionStore + EquityTypeStore + GoalStore {}
