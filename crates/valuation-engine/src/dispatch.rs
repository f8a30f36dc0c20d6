use portfolio_core::{Account, Credentials, EquityCategory};
use provider_trait::ValuationProvider;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Exchange,
    Lending,
}

/// The closed set of ways an account can be valued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    TokenPair,
    SessionLogin(SessionKind),
    ManualCrypto,
    ManualLedger,
}

impl ProviderKind {
    /// Pick the provider for an account. Automatic accounts without a
    /// recognizable credential shape have no provider.
    pub fn for_account(account: &Account) -> Option<ProviderKind> {
        let crypto = account.category() == EquityCategory::Cryptocurrency;

        if account.is_automatic {
            return match account.credentials()? {
                Credentials::TokenPair { .. } => Some(ProviderKind::TokenPair),
                Credentials::Login { .. } if crypto => {
                    Some(ProviderKind::SessionLogin(SessionKind::Exchange))
                }
                Credentials::Login { .. } => Some(ProviderKind::SessionLogin(SessionKind::Lending)),
            };
        }

        if crypto {
            Some(ProviderKind::ManualCrypto)
        } else {
            Some(ProviderKind::ManualLedger)
        }
    }

    /// Asset class every value from this provider is reported under.
    pub fn category(&self) -> EquityCategory {
        match self {
            ProviderKind::TokenPair => EquityCategory::Fund,
            ProviderKind::SessionLogin(SessionKind::Lending) => EquityCategory::Loan,
            ProviderKind::SessionLogin(SessionKind::Exchange) | ProviderKind::ManualCrypto => {
                EquityCategory::Cryptocurrency
            }
            ProviderKind::ManualLedger => EquityCategory::Stock,
        }
    }
}

pub struct ProviderSet {
    pub token_pair: Arc<dyn ValuationProvider>,
    pub exchange: Arc<dyn ValuationProvider>,
    pub lending: Arc<dyn ValuationProvider>,
    pub manual_crypto: Arc<dyn ValuationProvider>,
    pub manual_ledger: Arc<dyn ValuationProvider>,
}

impl ProviderSet {
    pub fn get(&self, kind: ProviderKind) -> &Arc<dyn ValuationProvider> {
        match kind {
            ProviderKind::TokenPair => &self.token_pair,
            ProviderKind::SessionLogin(SessionKind::Exchange) => &self.exchange,
            ProviderKind::SessionLogin(SessionKind::Lending) => &self.lending,
            ProviderKind::ManualCrypto => &self.manual_crypto,
            ProviderKind::ManualLedger => &self.manual_ledger,
        }
    }
}
