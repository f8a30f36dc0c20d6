use crate::dispatch::{ProviderKind, ProviderSet};
use crate::policy::ThresholdPolicy;
use crate::summary;
use futures_util::future::join_all;
use portfolio_core::{
    Account, AccountId, EquityCategory, Holding, InvestmentSummary, KronRebalance,
    PortfolioStore, TotalValue, ValuationError,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-holding summary of a single account.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub account_id: AccountId,
    pub account_name: String,
    pub total_value: Decimal,
    pub rows: Vec<InvestmentSummary>,
}

pub struct ValuationEngine {
    store: Arc<dyn PortfolioStore>,
    providers: ProviderSet,
    equity_policy: ThresholdPolicy,
    holding_policy: ThresholdPolicy,
}

/// Store failures surfacing through a provider end the pass; anything else
/// is contained to the account.
fn fatal_cause(err: &anyhow::Error) -> Option<ValuationError> {
    err.downcast_ref::<ValuationError>()
        .filter(|e| e.is_fatal())
        .cloned()
}

impl ValuationEngine {
    pub fn new(store: Arc<dyn PortfolioStore>, providers: ProviderSet) -> Self {
        Self {
            store,
            providers,
            equity_policy: ThresholdPolicy::default(),
            holding_policy: ThresholdPolicy::Sliding,
        }
    }

    pub fn with_policies(mut self, equity: ThresholdPolicy, holding: ThresholdPolicy) -> Self {
        self.equity_policy = equity;
        self.holding_policy = holding;
        self
    }

    /// Value a single account. `Ok(None)` when no provider matches.
    async fn value_account(&self, account: &Account) -> Result<Option<TotalValue>, ValuationError> {
        let Some(kind) = ProviderKind::for_account(account) else {
            warn!("No provider matches account {} ({}), skipping", account.name, account.id);
            return Ok(None);
        };

        let provider = self.providers.get(kind);
        debug!("Fetching data for {} via {}", account.name, provider.provider_name());

        match provider.fetch_total_value(account).await {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                if let Some(fatal) = fatal_cause(&e) {
                    return Err(fatal);
                }
                warn!(
                    "{} failed for account {}: {:#}. Valuing it at zero",
                    provider.provider_name(),
                    account.name,
                    e
                );
                Ok(Some(TotalValue::zero(account, kind.category())))
            }
        }
    }

    /// Value every account concurrently. Results follow input order; accounts
    /// without a provider are left out and failing providers yield a zero
    /// entry.
    pub async fn calculate_account_values(
        &self,
        accounts: &[Account],
    ) -> Result<Vec<TotalValue>, ValuationError> {
        let results = join_all(accounts.iter().map(|a| self.value_account(a))).await;

        let mut values = Vec::with_capacity(results.len());
        for result in results {
            if let Some(value) = result? {
                values.push(value);
            }
        }
        info!("Valued {} of {} accounts", values.len(), accounts.len());
        Ok(values)
    }

    pub async fn calculate_all_values(&self) -> Result<Vec<TotalValue>, ValuationError> {
        let accounts = self.store.list_accounts().await?;
        self.calculate_account_values(&accounts).await
    }

    async fn targets(&self) -> Result<HashMap<EquityCategory, Decimal>, ValuationError> {
        let mut targets = HashMap::new();
        for equity_type in self.store.list_equity_types().await? {
            let category = equity_type.category();
            if !category.is_known() {
                warn!("Equity type {} is not a known asset class", equity_type.name);
            }
            targets.insert(category, equity_type.wanted_allocation);
        }
        Ok(targets)
    }

    /// Portfolio-level rebalance decision per asset class.
    pub async fn calculate_investment_summary(
        &self,
        accounts: &[Account],
    ) -> Result<Vec<InvestmentSummary>, ValuationError> {
        let targets = self.targets().await?;
        let values = self.calculate_account_values(accounts).await?;

        for value in &values {
            if !targets.contains_key(&value.equity_type) {
                if !value.equity_type.is_known() {
                    warn!("Account {} has an unknown asset class", value.account_name);
                }
                return Err(ValuationError::MissingTargetAllocation(
                    value.equity_type.to_string(),
                ));
            }
        }

        Ok(summary::summarize_by_equity_type(
            &values,
            &targets,
            self.equity_policy,
        ))
    }

    pub async fn calculate_portfolio_summary(&self) -> Result<Vec<InvestmentSummary>, ValuationError> {
        let accounts = self.store.list_accounts().await?;
        self.calculate_investment_summary(&accounts).await
    }

    async fn find_account(&self, account_id: AccountId) -> Result<Account, ValuationError> {
        self.store
            .get_account(account_id)
            .await?
            .ok_or(ValuationError::AccountNotFound(account_id))
    }

    /// Holdings of one account with goal percentages filled in from the goal
    /// store where the provider did not supply them.
    pub async fn account_holdings(&self, account: &Account) -> Result<Vec<Holding>, ValuationError> {
        let kind = ProviderKind::for_account(account).ok_or_else(|| {
            ValuationError::Provider(format!("No provider matches account {}", account.name))
        })?;

        let mut holdings = self
            .providers
            .get(kind)
            .fetch_holdings(account)
            .await
            .map_err(|e| fatal_cause(&e).unwrap_or_else(|| ValuationError::Provider(format!("{:#}", e))))?;

        for holding in holdings.iter_mut().filter(|h| h.goal_percentage.is_none()) {
            let goal = self
                .store
                .get_goal_percentage(account.id, &holding.name)
                .await?;
            if goal.is_none() {
                warn!("No goal percentage for {} in {}, using 0", holding.name, account.name);
            }
            holding.goal_percentage = Some(goal.unwrap_or_default());
        }
        Ok(holdings)
    }

    /// Suggested purchases per holding when `new_money` is added to the
    /// account.
    pub async fn calculate_holding_rebalance(
        &self,
        account_id: AccountId,
        new_money: Decimal,
    ) -> Result<Vec<KronRebalance>, ValuationError> {
        let account = self.find_account(account_id).await?;
        let holdings = self.account_holdings(&account).await?;
        Ok(summary::holding_rebalance(&holdings, new_money))
    }

    /// Per-holding rebalance decision for one account.
    pub async fn summarize_account(&self, account: &Account) -> Result<AccountSummary, ValuationError> {
        let holdings = self.account_holdings(account).await?;
        let (total_value, rows) = summary::summarize_holdings(&holdings, self.holding_policy);
        Ok(AccountSummary {
            account_id: account.id,
            account_name: account.name.clone(),
            total_value,
            rows,
        })
    }
}
