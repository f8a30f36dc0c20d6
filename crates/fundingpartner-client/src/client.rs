use crate::models::*;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use portfolio_core::numeric::sum;
use portfolio_core::{
    Account, AccountId, Credentials, EquityCategory, Holding, TotalValue, Transaction,
    TransactionType,
};
use provider_trait::ValuationProvider;
use reqwest::{header, Client};
use rust_decimal::Decimal;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://fundingpartner.no";
const HISTORY_START: &str = "2018-01-01";

/// Peer-to-peer lending client. Every valuation logs in again; sessions are
/// short-lived and never cached.
pub struct FundingPartnerClient {
    client: Client,
    base_url: String,
}

impl FundingPartnerClient {
    pub fn new(base_url: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self { client, base_url })
    }

    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("FUNDINGPARTNER_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Self::new(base_url)
    }

    /// Log in and return the session token.
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let url = format!("{}/api/v2/login", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("FundingPartner login failed: {}", error_text));
        }

        let login = response.json::<LoginResponse>().await?;
        Ok(login.token)
    }

    /// Full lending history from the start of the platform until today.
    pub async fn get_transactions(&self, token: &str) -> Result<Vec<LendingTransaction>> {
        let url = format!(
            "{}/api/v2/transactions-unified?startDate={}&endDate={}&lastILTID=&lastIFTID=",
            self.base_url,
            HISTORY_START,
            Utc::now().format("%Y-%m-%d")
        );

        let response = self
            .client
            .get(&url)
            .header(header::COOKIE, format!("token={}", token))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("FundingPartner transactions failed: {}", error_text));
        }

        let body = response.json::<TransactionsResponse>().await?;
        Ok(body.message.payload.trans_list)
    }

    async fn all_holdings(&self, account: &Account) -> Result<Vec<Holding>> {
        let (username, password) = match account.credentials() {
            Some(Credentials::Login { username, password }) => (username, password),
            _ => {
                return Err(anyhow!(
                    "Account {} has no FundingPartner login",
                    account.name
                ))
            }
        };

        let token = self.login(username, password).await?;
        let records = self.get_transactions(&token).await?;
        let transactions = classify_transactions(records, account.id);
        tracing::debug!(
            "FundingPartner account {}: {} ledger entries",
            account.name,
            transactions.len()
        );
        Ok(holdings_from_transactions(&transactions, account.id))
    }
}

fn loan_transaction(
    record: &LendingTransaction,
    account_id: AccountId,
    transaction_type: TransactionType,
    amount: Decimal,
    unit_price: Decimal,
) -> Transaction {
    Transaction {
        id: None,
        amount,
        name: record.instrument_name(),
        transaction_type,
        transaction_date: record.transaction_date.clone(),
        unit_price,
        ticker_id: String::new(),
        total_shares: Decimal::ONE,
        equity_type: EquityCategory::Loan.as_str().to_string(),
        account_id,
    }
}

/// Turn raw lending records into ledger transactions. A single record can
/// produce up to three entries: repaid principal (SELL), net interest
/// (YIELD) and loan funding (BUY).
pub fn classify_transactions(
    records: Vec<LendingTransaction>,
    account_id: AccountId,
) -> Vec<Transaction> {
    let mut out = Vec::new();
    for record in records.iter().filter(|r| !r.is_excluded()) {
        if let Some(principal) = record.principal.filter(|p| !p.is_zero()) {
            out.push(loan_transaction(
                record,
                account_id,
                TransactionType::Sell,
                -principal,
                -principal,
            ));
        }
        if let Some(interest) = record.net_interest {
            out.push(loan_transaction(
                record,
                account_id,
                TransactionType::Yield,
                interest,
                Decimal::ZERO,
            ));
        }
        if record.classification == LOAN_FUNDING {
            let amount = record.amount.unwrap_or_default().abs();
            out.push(loan_transaction(
                record,
                account_id,
                TransactionType::Buy,
                amount,
                amount,
            ));
        }
    }
    out
}

/// Group transactions by loan in first-seen order. Value is the outstanding
/// principal (BUY and SELL amounts), yield is the interest received.
pub fn holdings_from_transactions(transactions: &[Transaction], account_id: AccountId) -> Vec<Holding> {
    let mut names: Vec<&str> = Vec::new();
    for t in transactions {
        if !names.contains(&t.name.as_str()) {
            names.push(&t.name);
        }
    }

    names
        .into_iter()
        .map(|name| {
            let loan: Vec<&Transaction> = transactions.iter().filter(|t| t.name == name).collect();
            let value = sum(loan
                .iter()
                .filter(|t| t.transaction_type.affects_cost_basis())
                .map(|t| t.amount));
            let yield_amount = sum(loan
                .iter()
                .filter(|t| t.transaction_type == TransactionType::Yield)
                .map(|t| t.amount));
            Holding {
                name: name.to_string(),
                account_id,
                equity_share: Decimal::ONE,
                equity_type: EquityCategory::Loan,
                value,
                goal_percentage: None,
                current_percentage: None,
                yield_amount,
                isin: String::new(),
            }
        })
        .collect()
}

/// Loans with at least one currency unit outstanding.
pub fn is_current(holding: &Holding) -> bool {
    holding.value >= Decimal::ONE
}

/// Market value counts only current loans; return counts interest from
/// every loan ever held.
pub fn total_value_from_holdings(account: &Account, holdings: &[Holding]) -> TotalValue {
    let market_value = sum(holdings.iter().filter(|h| is_current(h)).map(|h| h.value));
    let total_yield = sum(holdings.iter().map(|h| h.yield_amount));
    TotalValue {
        account_name: account.name.clone(),
        account_id: Some(account.id),
        market_value: market_value.ceil(),
        yield_amount: Decimal::ZERO,
        return_amount: total_yield.ceil(),
        equity_type: EquityCategory::Loan,
    }
}

#[async_trait]
impl ValuationProvider for FundingPartnerClient {
    async fn fetch_total_value(&self, account: &Account) -> Result<TotalValue> {
        let holdings = self.all_holdings(account).await?;
        Ok(total_value_from_holdings(account, &holdings))
    }

    async fn fetch_holdings(&self, account: &Account) -> Result<Vec<Holding>> {
        let holdings = self.all_holdings(account).await?;
        Ok(holdings.into_iter().filter(is_current).collect())
    }

    fn provider_name(&self) -> &str {
        "fundingpartner"
    }
}
