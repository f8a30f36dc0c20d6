use anyhow::{anyhow, Result};
use async_trait::async_trait;
use portfolio_core::{
    AccessInfo, Account, AccountId, AccountStore, EquityCategory, EquityType, EquityTypeStore,
    GoalStore, Holding, HoldingGoal, StoreResult, TotalValue, Transaction, TransactionStore,
    TransactionType, ValuationError,
};
use provider_trait::{PriceSource, ValuationProvider};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct MockStore {
    accounts: Mutex<Vec<Account>>,
    transactions: Mutex<Vec<Transaction>>,
    equity_types: Mutex<Vec<EquityType>>,
    goals: Mutex<Vec<HoldingGoal>>,
    pub unavailable: AtomicBool,
    /// Fail only goal lookups.
    pub goals_unavailable: AtomicBool,
}

impl MockStore {
    pub fn add_account(&self, account: Account) {
        self.accounts.lock().unwrap().push(account);
    }

    pub fn add_transaction(&self, transaction: Transaction) {
        self.transactions.lock().unwrap().push(transaction);
    }

    pub fn set_target(&self, name: &str, wanted: Decimal) {
        self.equity_types.lock().unwrap().push(EquityType {
            id: None,
            name: name.to_string(),
            wanted_allocation: wanted,
        });
    }

    pub fn set_goal(&self, account_id: AccountId, holding: &str, goal: Decimal) {
        self.goals.lock().unwrap().push(HoldingGoal {
            account_id,
            holding_name: holding.to_string(),
            goal_percentage: goal,
        });
    }

    fn check(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ValuationError::StoreUnavailable("database is locked".to_string()));
        }
        Ok(())
    }

    fn check_goals(&self) -> StoreResult<()> {
        self.check()?;
        if self.goals_unavailable.load(Ordering::SeqCst) {
            return Err(ValuationError::StoreUnavailable("goal table is locked".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MockStore {
    async fn list_accounts(&self) -> StoreResult<Vec<Account>> {
        self.check()?;
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn get_account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        self.check()?;
        Ok(self.accounts.lock().unwrap().iter().find(|a| a.id == id).cloned())
    }

    async fn update_account_total_value(&self, id: AccountId, value: Decimal) -> StoreResult<()> {
        self.check()?;
        if let Some(account) = self.accounts.lock().unwrap().iter_mut().find(|a| a.id == id) {
            account.total_value = value;
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for MockStore {
    async fn list_transactions(&self, account_id: AccountId) -> StoreResult<Vec<Transaction>> {
        self.check()?;
        Ok(self
            .transactions
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EquityTypeStore for MockStore {
    async fn get_equity_type(&self, name: &str) -> StoreResult<Option<EquityType>> {
        self.check()?;
        Ok(self
            .equity_types
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.name == name)
            .cloned())
    }

    async fn list_equity_types(&self) -> StoreResult<Vec<EquityType>> {
        self.check()?;
        Ok(self.equity_types.lock().unwrap().clone())
    }
}

#[async_trait]
impl GoalStore for MockStore {
    async fn get_goal_percentage(
        &self,
        account_id: AccountId,
        holding_name: &str,
    ) -> StoreResult<Option<Decimal>> {
        self.check_goals()?;
        Ok(self
            .goals
            .lock()
            .unwrap()
            .iter()
            .find(|g| g.account_id == account_id && g.holding_name == holding_name)
            .map(|g| g.goal_percentage))
    }

    async fn list_goals(&self, account_id: AccountId) -> StoreResult<Vec<HoldingGoal>> {
        self.check_goals()?;
        Ok(self
            .goals
            .lock()
            .unwrap()
            .iter()
            .filter(|g| g.account_id == account_id)
            .cloned()
            .collect())
    }
}

pub struct FixedPrices(HashMap<String, Decimal>);

impl FixedPrices {
    pub fn new(prices: &[(&str, Decimal)]) -> Self {
        Self(prices.iter().map(|(t, p)| (t.to_string(), *p)).collect())
    }
}

#[async_trait]
impl PriceSource for FixedPrices {
    async fn unit_price(&self, ticker: &str) -> Result<Decimal> {
        self.0
            .get(ticker)
            .copied()
            .ok_or_else(|| anyhow!("no price for {}", ticker))
    }

    fn source_name(&self) -> &str {
        "fixed"
    }
}

/// Provider answering from a per-account table. Accounts not in the table
/// fail. An optional delay per account scrambles completion order.
#[derive(Default)]
pub struct MockProvider {
    values: Mutex<HashMap<AccountId, (Decimal, EquityCategory)>>,
    holdings: Mutex<HashMap<AccountId, Vec<Holding>>>,
    delays: Mutex<HashMap<AccountId, u64>>,
    pub calls: AtomicUsize,
}

impl MockProvider {
    pub fn with_value(self, account_id: AccountId, value: Decimal, category: EquityCategory) -> Self {
        self.values.lock().unwrap().insert(account_id, (value, category));
        self
    }

    pub fn with_holdings(self, account_id: AccountId, holdings: Vec<Holding>) -> Self {
        self.holdings.lock().unwrap().insert(account_id, holdings);
        self
    }

    pub fn with_delay(self, account_id: AccountId, millis: u64) -> Self {
        self.delays.lock().unwrap().insert(account_id, millis);
        self
    }
}

#[async_trait]
impl ValuationProvider for MockProvider {
    async fn fetch_total_value(&self, account: &Account) -> Result<TotalValue> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays.lock().unwrap().get(&account.id).copied();
        if let Some(millis) = delay {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
        let entry = self.values.lock().unwrap().get(&account.id).copied();
        let (value, category) = entry.ok_or_else(|| anyhow!("provider down for {}", account.name))?;
        Ok(TotalValue {
            account_name: account.name.clone(),
            account_id: Some(account.id),
            market_value: value,
            yield_amount: Decimal::ZERO,
            return_amount: Decimal::ZERO,
            equity_type: category,
        })
    }

    async fn fetch_holdings(&self, account: &Account) -> Result<Vec<Holding>> {
        self.holdings
            .lock()
            .unwrap()
            .get(&account.id)
            .cloned()
            .ok_or_else(|| anyhow!("no holdings for {}", account.name))
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

pub fn manual_account(id: AccountId, name: &str, account_type: &str) -> Account {
    Account {
        id,
        created_at: "2024-01-01T00:00:00Z".to_string(),
        name: name.to_string(),
        account_type: account_type.to_string(),
        total_value: Decimal::ZERO,
        is_automatic: false,
        access_info: None,
    }
}

pub fn automatic_account(id: AccountId, name: &str, account_type: &str, info: AccessInfo) -> Account {
    Account {
        is_automatic: true,
        access_info: Some(info),
        ..manual_account(id, name, account_type)
    }
}

pub fn ledger_entry(
    account_id: AccountId,
    ticker: &str,
    transaction_type: TransactionType,
    amount: Decimal,
    shares: Decimal,
) -> Transaction {
    Transaction {
        id: None,
        amount,
        name: ticker.to_string(),
        transaction_type,
        transaction_date: "2024-01-01".to_string(),
        unit_price: Decimal::ZERO,
        ticker_id: ticker.to_string(),
        total_shares: shares,
        equity_type: String::new(),
        account_id,
    }
}

pub fn holding(account_id: AccountId, name: &str, value: Decimal, goal: Option<Decimal>) -> Holding {
    Holding {
        name: name.to_string(),
        account_id,
        equity_share: Decimal::ONE,
        equity_type: EquityCategory::Fund,
        value,
        goal_percentage: goal,
        current_percentage: None,
        yield_amount: Decimal::ZERO,
        isin: String::new(),
    }
}
