use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type AccountId = i64;

// ---------------------------------------------------------------------------
// Asset classes
// ---------------------------------------------------------------------------

/// Asset-class bucket used for grouping valuations and looking up targets.
///
/// Category strings coming from storage are parsed leniently; anything that
/// does not match a known class lands in `Unknown` so a typo shows up as its
/// own bucket (and a missing target) instead of a silently new summary row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EquityCategory {
    Fund,
    Stock,
    Cryptocurrency,
    Loan,
    Unknown,
}

impl EquityCategory {
    pub const KNOWN: [EquityCategory; 4] = [
        EquityCategory::Fund,
        EquityCategory::Stock,
        EquityCategory::Cryptocurrency,
        EquityCategory::Loan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EquityCategory::Fund => "FUND",
            EquityCategory::Stock => "STOCK",
            EquityCategory::Cryptocurrency => "CRYPTOCURRENCY",
            EquityCategory::Loan => "LOAN",
            EquityCategory::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "FUND" | "FUNDS" => EquityCategory::Fund,
            "STOCK" | "STOCKS" => EquityCategory::Stock,
            "CRYPTOCURRENCY" | "CRYPTO" => EquityCategory::Cryptocurrency,
            "LOAN" | "LOANS" => EquityCategory::Loan,
            _ => EquityCategory::Unknown,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, EquityCategory::Unknown)
    }
}

impl fmt::Display for EquityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessInfo {
    pub access_key: Option<String>,
    pub account_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub last_edited: Option<DateTime<Utc>>,
}

/// Credential shape recognized by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credentials<'a> {
    TokenPair {
        account_key: &'a str,
        access_key: Option<&'a str>,
    },
    Login {
        username: &'a str,
        password: &'a str,
    },
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl AccessInfo {
    pub fn token_pair(account_key: impl Into<String>, access_key: Option<String>) -> Self {
        Self {
            account_key: Some(account_key.into()),
            access_key,
            ..Default::default()
        }
    }

    pub fn login(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            ..Default::default()
        }
    }

    /// Token-pair fields take precedence over username/password.
    pub fn credentials(&self) -> Option<Credentials<'_>> {
        if let Some(account_key) = non_empty(&self.account_key) {
            return Some(Credentials::TokenPair {
                account_key,
                access_key: non_empty(&self.access_key),
            });
        }
        match (non_empty(&self.username), non_empty(&self.password)) {
            (Some(username), Some(password)) => Some(Credentials::Login { username, password }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub created_at: String,
    pub name: String,
    pub account_type: String,
    pub total_value: Decimal,
    pub is_automatic: bool,
    pub access_info: Option<AccessInfo>,
}

impl Account {
    pub fn category(&self) -> EquityCategory {
        EquityCategory::parse(&self.account_type)
    }

    pub fn credentials(&self) -> Option<Credentials<'_>> {
        self.access_info.as_ref().and_then(AccessInfo::credentials)
    }

    /// Copy without credentials, for anything leaving the process.
    pub fn redacted(&self) -> Account {
        Account {
            access_info: None,
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionType {
    Buy,
    Sell,
    Yield,
    Deposit,
    Withdrawal,
    Fee,
    Other(String),
}

impl TransactionType {
    pub fn as_str(&self) -> &str {
        match self {
            TransactionType::Buy => "BUY",
            TransactionType::Sell => "SELL",
            TransactionType::Yield => "YIELD",
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::Fee => "FEE",
            TransactionType::Other(other) => other,
        }
    }

    /// BUY and SELL move cost basis; everything else is cash flow around it.
    pub fn affects_cost_basis(&self) -> bool {
        matches!(self, TransactionType::Buy | TransactionType::Sell)
    }
}

impl From<String> for TransactionType {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "BUY" => TransactionType::Buy,
            "SELL" => TransactionType::Sell,
            "YIELD" => TransactionType::Yield,
            "DEPOSIT" => TransactionType::Deposit,
            "WITHDRAWAL" => TransactionType::Withdrawal,
            "FEE" => TransactionType::Fee,
            _ => TransactionType::Other(value),
        }
    }
}

impl From<TransactionType> for String {
    fn from(value: TransactionType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Option<i64>,
    pub amount: Decimal,
    pub name: String,
    pub transaction_type: TransactionType,
    pub transaction_date: String,
    pub unit_price: Decimal,
    pub ticker_id: String,
    pub total_shares: Decimal,
    pub equity_type: String,
    pub account_id: AccountId,
}

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityType {
    pub id: Option<i64>,
    pub name: String,
    pub wanted_allocation: Decimal,
}

impl EquityType {
    pub fn category(&self) -> EquityCategory {
        EquityCategory::parse(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingGoal {
    pub account_id: AccountId,
    pub holding_name: String,
    pub goal_percentage: Decimal,
}

// ---------------------------------------------------------------------------
// Valuation output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub name: String,
    pub account_id: AccountId,
    pub equity_share: Decimal,
    pub equity_type: EquityCategory,
    pub value: Decimal,
    pub goal_percentage: Option<Decimal>,
    pub current_percentage: Option<Decimal>,
    #[serde(rename = "yield")]
    pub yield_amount: Decimal,
    pub isin: String,
}

/// The one shape every valuation provider produces for an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalValue {
    pub account_name: String,
    pub account_id: Option<AccountId>,
    pub market_value: Decimal,
    #[serde(rename = "yield")]
    pub yield_amount: Decimal,
    #[serde(rename = "return")]
    pub return_amount: Decimal,
    pub equity_type: EquityCategory,
}

impl TotalValue {
    pub fn zero(account: &Account, equity_type: EquityCategory) -> Self {
        Self {
            account_name: account.name.clone(),
            account_id: Some(account.id),
            market_value: Decimal::ZERO,
            yield_amount: Decimal::ZERO,
            return_amount: Decimal::ZERO,
            equity_type,
        }
    }
}

/// One row of rebalance output. `equity_type` is the group label: an asset
/// class for portfolio summaries, a holding name for account summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentSummary {
    pub equity_type: String,
    pub market_value: Decimal,
    pub current_share: Decimal,
    pub wanted_share: Decimal,
    pub difference: Decimal,
    pub max_diff_to_rebalance: Decimal,
    pub rebalance: bool,
    pub to_trade: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KronRebalance {
    pub name: String,
    pub goal_allocation: Decimal,
    pub value: Decimal,
    pub current_allocation: Decimal,
    pub diff_to_goal: Decimal,
    pub to_buy: Decimal,
}

/// OAuth token pair persisted for the token-pair provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderToken {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}
