use anyhow::Result;
use async_trait::async_trait;
use futures_util::future::join_all;
use portfolio_core::numeric::{round2, sum};
use portfolio_core::{
    Account, EquityCategory, Holding, TotalValue, Transaction, TransactionStore,
};
use provider_trait::{PriceSource, ValuationProvider};
use rust_decimal::Decimal;
use std::sync::Arc;

const CRYPTO_TICKER: &str = "BTC";

/// Net cost of BUY and SELL entries.
fn cost_basis<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Decimal {
    sum(transactions
        .into_iter()
        .filter(|t| t.transaction_type.affects_cost_basis())
        .map(|t| t.amount))
}

fn ledger_holding(
    account: &Account,
    name: &str,
    category: EquityCategory,
    shares: Decimal,
    cost: Decimal,
    price: Decimal,
) -> Holding {
    let value = shares * price;
    Holding {
        name: name.to_string(),
        account_id: account.id,
        equity_share: shares,
        equity_type: category,
        value,
        goal_percentage: None,
        current_percentage: None,
        yield_amount: value - cost,
        isin: name.to_string(),
    }
}

/// Shared `TotalValue` shape for ledger-backed accounts.
pub fn ledger_total(account: &Account, category: EquityCategory, holdings: &[Holding]) -> TotalValue {
    let total_yield = sum(holdings.iter().map(|h| h.yield_amount));
    TotalValue {
        account_name: account.name.clone(),
        account_id: Some(account.id),
        market_value: round2(sum(holdings.iter().map(|h| h.value))),
        yield_amount: total_yield,
        return_amount: total_yield.ceil(),
        equity_type: category,
    }
}

/// Self-custodied bitcoin tracked by hand. The whole ledger is one holding.
pub struct CryptoLedgerProvider {
    transactions: Arc<dyn TransactionStore>,
    price: Arc<dyn PriceSource>,
}

impl CryptoLedgerProvider {
    pub fn new(transactions: Arc<dyn TransactionStore>, price: Arc<dyn PriceSource>) -> Self {
        Self {
            transactions,
            price,
        }
    }
}

#[async_trait]
impl ValuationProvider for CryptoLedgerProvider {
    async fn fetch_total_value(&self, account: &Account) -> Result<TotalValue> {
        let holdings = self.fetch_holdings(account).await?;
        Ok(ledger_total(account, EquityCategory::Cryptocurrency, &holdings))
    }

    async fn fetch_holdings(&self, account: &Account) -> Result<Vec<Holding>> {
        let ledger = self.transactions.list_transactions(account.id).await?;
        let shares = sum(ledger.iter().map(|t| t.total_shares));
        let cost = cost_basis(&ledger);
        let price = self.price.unit_price(CRYPTO_TICKER).await?;

        Ok(vec![ledger_holding(
            account,
            CRYPTO_TICKER,
            EquityCategory::Cryptocurrency,
            shares,
            cost,
            price,
        )])
    }

    fn provider_name(&self) -> &str {
        "crypto-ledger"
    }
}

/// Manually tracked stocks and funds, one holding per ticker.
pub struct StockLedgerProvider {
    transactions: Arc<dyn TransactionStore>,
    prices: Arc<dyn PriceSource>,
}

impl StockLedgerProvider {
    pub fn new(transactions: Arc<dyn TransactionStore>, prices: Arc<dyn PriceSource>) -> Self {
        Self {
            transactions,
            prices,
        }
    }
}

/// Distinct tickers in first-seen order.
pub fn distinct_tickers(ledger: &[Transaction]) -> Vec<&str> {
    let mut tickers: Vec<&str> = Vec::new();
    for t in ledger {
        if !tickers.contains(&t.ticker_id.as_str()) {
            tickers.push(&t.ticker_id);
        }
    }
    tickers
}

#[async_trait]
impl ValuationProvider for StockLedgerProvider {
    async fn fetch_total_value(&self, account: &Account) -> Result<TotalValue> {
        let holdings = self.fetch_holdings(account).await?;
        Ok(ledger_total(account, EquityCategory::Stock, &holdings))
    }

    async fn fetch_holdings(&self, account: &Account) -> Result<Vec<Holding>> {
        let ledger = self.transactions.list_transactions(account.id).await?;
        let tickers = distinct_tickers(&ledger);

        let prices = join_all(tickers.iter().map(|ticker| self.prices.unit_price(ticker))).await;

        tickers
            .iter()
            .zip(prices)
            .map(|(ticker, price)| -> Result<Holding> {
                let price = price?;
                let entries: Vec<&Transaction> =
                    ledger.iter().filter(|t| t.ticker_id == *ticker).collect();
                let shares = sum(entries.iter().map(|t| t.total_shares));
                let cost = cost_basis(entries.iter().copied());
                Ok(ledger_holding(
                    account,
                    ticker,
                    EquityCategory::Stock,
                    shares,
                    cost,
                    price,
                ))
            })
            .collect()
    }

    fn provider_name(&self) -> &str {
        "stock-ledger"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ledger_entry, manual_account, FixedPrices, MockStore};
    use portfolio_core::TransactionType;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_crypto_ledger_values_all_shares_at_btc_price() {
        let store = Arc::new(MockStore::default());
        store.add_transaction(ledger_entry(1, "BTC", TransactionType::Buy, dec!(5000), dec!(0.01)));
        store.add_transaction(ledger_entry(1, "BTC", TransactionType::Buy, dec!(2500), dec!(0.005)));
        store.add_transaction(ledger_entry(1, "BTC", TransactionType::Yield, dec!(0), dec!(0.0001)));

        let provider = CryptoLedgerProvider::new(store, Arc::new(FixedPrices::new(&[("BTC", dec!(600000))])));
        let account = manual_account(1, "Tangem", "CRYPTOCURRENCY");
        let total = provider.fetch_total_value(&account).await.unwrap();

        // 0.0151 BTC * 600000
        assert_eq!(total.market_value, dec!(9060));
        assert_eq!(total.yield_amount, dec!(1560));
        assert_eq!(total.return_amount, dec!(1560));
        assert_eq!(total.equity_type, EquityCategory::Cryptocurrency);
    }

    #[tokio::test]
    async fn test_stock_ledger_groups_by_ticker_in_first_seen_order() {
        let store = Arc::new(MockStore::default());
        store.add_transaction(ledger_entry(2, "NHY", TransactionType::Buy, dec!(1000), dec!(20)));
        store.add_transaction(ledger_entry(2, "EQNR", TransactionType::Buy, dec!(3000), dec!(10)));
        store.add_transaction(ledger_entry(2, "NHY", TransactionType::Sell, dec!(-500), dec!(-10)));
        store.add_transaction(ledger_entry(2, "EQNR", TransactionType::Yield, dec!(90), dec!(0)));

        let prices = FixedPrices::new(&[("NHY", dec!(66.333)), ("EQNR", dec!(280))]);
        let provider = StockLedgerProvider::new(store, Arc::new(prices));
        let account = manual_account(2, "Aksjer", "STOCK");

        let holdings = provider.fetch_holdings(&account).await.unwrap();
        assert_eq!(holdings.len(), 2);
        assert_eq!(holdings[0].name, "NHY");
        assert_eq!(holdings[0].equity_share, dec!(10));
        assert_eq!(holdings[0].value, dec!(663.33));
        assert_eq!(holdings[0].yield_amount, dec!(163.33));
        assert_eq!(holdings[1].value, dec!(2800));
        assert_eq!(holdings[1].yield_amount, dec!(-200));

        let total = provider.fetch_total_value(&account).await.unwrap();
        assert_eq!(total.market_value, dec!(3463.33));
        assert_eq!(total.return_amount, dec!(-36));
        assert_eq!(total.equity_type, EquityCategory::Stock);
    }

    #[tokio::test]
    async fn test_missing_price_fails_the_account() {
        let store = Arc::new(MockStore::default());
        store.add_transaction(ledger_entry(3, "UNLISTED", TransactionType::Buy, dec!(100), dec!(1)));
        let provider = StockLedgerProvider::new(store, Arc::new(FixedPrices::new(&[])));
        assert!(provider
            .fetch_total_value(&manual_account(3, "Aksjer", "STOCK"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_empty_ledger_is_worth_nothing() {
        let store = Arc::new(MockStore::default());
        let provider = StockLedgerProvider::new(store, Arc::new(FixedPrices::new(&[])));
        let total = provider
            .fetch_total_value(&manual_account(4, "Tom", "STOCK"))
            .await
            .unwrap();
        assert_eq!(total.market_value, Decimal::ZERO);
    }
}
