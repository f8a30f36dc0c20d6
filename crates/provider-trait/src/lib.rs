use anyhow::Result;
use async_trait::async_trait;
use portfolio_core::{Account, Holding, TotalValue};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Valuation provider trait
// ---------------------------------------------------------------------------

/// One external (or ledger-backed) source of account valuations.
///
/// Implementations convert their provider-native payloads into the shared
/// `TotalValue` / `Holding` shapes and never persist anything themselves.
/// Errors are returned as-is; the aggregation layer decides how to contain
/// them.
#[async_trait]
pub trait ValuationProvider: Send + Sync {
    /// Current valuation of the whole account.
    async fn fetch_total_value(&self, account: &Account) -> Result<TotalValue>;

    /// Instrument-level breakdown. Providers without fund-level granularity
    /// return an empty list.
    async fn fetch_holdings(&self, _account: &Account) -> Result<Vec<Holding>> {
        Ok(Vec::new())
    }

    /// Provider name (e.g. "kron", "fundingpartner").
    fn provider_name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Price source trait
// ---------------------------------------------------------------------------

/// Live unit price lookup used by ledger-backed providers.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn unit_price(&self, ticker: &str) -> Result<Decimal>;

    fn source_name(&self) -> &str;
}

/// Price source that answers from a fixed table first and falls back to an
/// inner source for everything else. Used for instruments with no public
/// quote.
pub struct FixedPriceOverlay {
    fixed: HashMap<String, Decimal>,
    inner: Arc<dyn PriceSource>,
}

impl FixedPriceOverlay {
    pub fn new(fixed: HashMap<String, Decimal>, inner: Arc<dyn PriceSource>) -> Self {
        let fixed = fixed
            .into_iter()
            .map(|(ticker, price)| (ticker.to_ascii_uppercase(), price))
            .collect();
        Self { fixed, inner }
    }
}

#[async_trait]
impl PriceSource for FixedPriceOverlay {
    async fn unit_price(&self, ticker: &str) -> Result<Decimal> {
        if let Some(price) = self.fixed.get(&ticker.to_ascii_uppercase()) {
            return Ok(*price);
        }
        self.inner.unit_price(ticker).await
    }

    fn source_name(&self) -> &str {
        self.inner.source_name()
    }
}
