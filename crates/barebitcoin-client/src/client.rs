use crate::auth::{self, HEADER_HMAC, HEADER_KEY, HEADER_NONCE};
use crate::ladder::LimitLadder;
use crate::models::*;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use portfolio_core::numeric::{round2, sum};
use portfolio_core::{Account, Credentials, EquityCategory, Holding, TotalValue};
use provider_trait::{PriceSource, ValuationProvider};
use reqwest::{header, Client, Method};
use rust_decimal::Decimal;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.bb.no";
/// Spacing between consecutive order calls; the exchange rejects bursts.
const ORDER_SPACING: Duration = Duration::from_secs(1);

/// API key pair. The public key is stored as the account username and the
/// base64 secret as the password.
#[derive(Debug, Clone)]
pub struct ApiKeys {
    pub public_key: String,
    pub secret: String,
}

impl ApiKeys {
    pub fn from_account(account: &Account) -> Result<Self> {
        match account.credentials() {
            Some(Credentials::Login { username, password }) => Ok(Self {
                public_key: username.to_string(),
                secret: password.to_string(),
            }),
            _ => Err(anyhow!("Account {} has no Bare Bitcoin API keys", account.name)),
        }
    }
}

pub struct BareBitcoinClient {
    client: Client,
    base_url: String,
}

impl BareBitcoinClient {
    pub fn new(base_url: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;

        Ok(Self { client, base_url })
    }

    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("BAREBITCOIN_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Self::new(base_url)
    }

    fn signed_headers(
        &self,
        keys: &ApiKeys,
        method: &Method,
        path: &str,
        body: &str,
    ) -> Result<header::HeaderMap> {
        let nonce = Utc::now().timestamp_millis();
        let signature = auth::sign(&keys.secret, method.as_str(), path, nonce, body)?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(HEADER_HMAC, header::HeaderValue::from_str(&signature)?);
        headers.insert(HEADER_NONCE, header::HeaderValue::from(nonce));
        headers.insert(
            HEADER_KEY,
            header::HeaderValue::from_str(&keys.public_key)
                .context("API key contains invalid header characters")?,
        );
        Ok(headers)
    }

    async fn signed_request(
        &self,
        keys: &ApiKeys,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<reqwest::Response> {
        let body = body.unwrap_or_default();
        let headers = self.signed_headers(keys, &method, path, &body)?;
        let url = format!("{}{}", self.base_url, path);

        let mut request = self.client.request(method, &url).headers(headers);
        if !body.is_empty() {
            request = request.body(body);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("Bare Bitcoin API error on {}: {}", path, error_text));
        }
        Ok(response)
    }

    /// Current NOK price, bid and ask. Public endpoint.
    pub async fn get_price(&self) -> Result<Price> {
        let url = format!("{}/v1/price/nok", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("Bare Bitcoin price request failed: {}", error_text));
        }

        let price = response.json::<Price>().await?;
        Ok(price)
    }

    pub async fn get_bitcoin_accounts(&self, keys: &ApiKeys) -> Result<Vec<BitcoinAccount>> {
        let response = self
            .signed_request(keys, Method::GET, "/v1/user/bitcoin-accounts", None)
            .await?;
        let accounts = response.json::<BitcoinAccounts>().await?;
        Ok(accounts.accounts)
    }

    /// Raw account ledger.
    pub async fn get_ledger(&self, keys: &ApiKeys) -> Result<serde_json::Value> {
        let response = self
            .signed_request(keys, Method::GET, "/v1/ledger", None)
            .await?;
        Ok(response.json().await?)
    }

    pub async fn get_open_orders(&self, keys: &ApiKeys) -> Result<Vec<OpenOrder>> {
        let response = self
            .signed_request(keys, Method::GET, "/v1/orders", None)
            .await?;
        let orders = response.json::<OpenOrders>().await?;
        Ok(orders.orders)
    }

    pub async fn submit_order(&self, keys: &ApiKeys, order: &OrderRequest) -> Result<OrderCreated> {
        tracing::info!("Submitting order to Bare Bitcoin: {:?}", order);

        let body = serde_json::to_string(order)?;
        let response = self
            .signed_request(keys, Method::POST, "/v1/orders", Some(body))
            .await?;
        let created = response.json::<OrderCreated>().await?;
        tracing::info!("Order submitted successfully: {}", created.order_id);
        Ok(created)
    }

    pub async fn cancel_order(&self, keys: &ApiKeys, order_id: &str) -> Result<()> {
        let path = format!("/v1/orders/{}", order_id);
        self.signed_request(keys, Method::DELETE, &path, None).await?;
        tracing::info!("Cancelled order {}", order_id);
        Ok(())
    }

    /// Cancel every open order, then place a fresh ladder of limit buys below
    /// the current ask. Returns the ids of the orders placed.
    pub async fn replace_limit_orders(
        &self,
        keys: &ApiKeys,
        ladder: &LimitLadder,
    ) -> Result<Vec<String>> {
        let open = self.get_open_orders(keys).await?;
        for order in &open {
            self.cancel_order(keys, &order.order_id).await?;
            tokio::time::sleep(ORDER_SPACING).await;
        }

        let price = self.get_price().await?;
        let mut placed = Vec::with_capacity(ladder.count);
        for limit in ladder.prices(price.ask) {
            let created = self
                .submit_order(keys, &OrderRequest::limit_buy(ladder.amount, limit))
                .await?;
            tracing::info!(
                "Created limit order for {} NOK at {} NOK ({})",
                ladder.amount,
                limit,
                created.order_id
            );
            placed.push(created.order_id);
            tokio::time::sleep(ORDER_SPACING).await;
        }
        Ok(placed)
    }
}

pub fn holdings_from_accounts(
    account: &Account,
    accounts: Vec<BitcoinAccount>,
    price: Decimal,
) -> Vec<Holding> {
    accounts
        .into_iter()
        .map(|a| Holding {
            name: a.id,
            account_id: account.id,
            equity_share: a.available_btc,
            equity_type: EquityCategory::Cryptocurrency,
            value: a.available_btc * price,
            goal_percentage: None,
            current_percentage: None,
            yield_amount: Decimal::ZERO,
            isin: "BTC".to_string(),
        })
        .collect()
}

pub fn total_value_from_holdings(account: &Account, holdings: &[Holding]) -> TotalValue {
    TotalValue {
        account_name: account.name.clone(),
        account_id: Some(account.id),
        market_value: round2(sum(holdings.iter().map(|h| h.value))),
        yield_amount: Decimal::ZERO,
        return_amount: sum(holdings.iter().map(|h| h.yield_amount)).ceil(),
        equity_type: EquityCategory::Cryptocurrency,
    }
}

#[async_trait]
impl ValuationProvider for BareBitcoinClient {
    async fn fetch_total_value(&self, account: &Account) -> Result<TotalValue> {
        let holdings = self.fetch_holdings(account).await?;
        Ok(total_value_from_holdings(account, &holdings))
    }

    async fn fetch_holdings(&self, account: &Account) -> Result<Vec<Holding>> {
        let keys = ApiKeys::from_account(account)?;
        let accounts = self.get_bitcoin_accounts(&keys).await?;
        let price = self.get_price().await?;
        Ok(holdings_from_accounts(account, accounts, price.price))
    }

    fn provider_name(&self) -> &str {
        "barebitcoin"
    }
}

/// Every ticker is priced as BTC in NOK.
#[async_trait]
impl PriceSource for BareBitcoinClient {
    async fn unit_price(&self, _ticker: &str) -> Result<Decimal> {
        Ok(self.get_price().await?.price)
    }

    fn source_name(&self) -> &str {
        "barebitcoin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portfolio_core::AccessInfo;
    use rust_decimal_macros::dec;

    fn account() -> Account {
        Account {
            id: 2,
            created_at: String::new(),
            name: "Bare Bitcoin".to_string(),
            account_type: "CRYPTOCURRENCY".to_string(),
            total_value: Decimal::ZERO,
            is_automatic: true,
            access_info: Some(AccessInfo::login("public", "c2VjcmV0")),
        }
    }

    fn btc(id: &str, available: Decimal) -> BitcoinAccount {
        BitcoinAccount {
            id: id.to_string(),
            available_btc: available,
            pending_orders_btc: Decimal::ZERO,
        }
    }

    #[test]
    fn test_total_sums_every_bitcoin_account() {
        let holdings = holdings_from_accounts(
            &account(),
            vec![btc("main", dec!(0.01)), btc("kids", dec!(0.0025))],
            dec!(1000000.123),
        );
        assert_eq!(holdings.len(), 2);
        let total = total_value_from_holdings(&account(), &holdings);
        assert_eq!(total.market_value, dec!(12500.00));
        assert_eq!(total.equity_type, EquityCategory::Cryptocurrency);
    }

    #[test]
    fn test_keys_from_login_credentials() {
        let keys = ApiKeys::from_account(&account()).unwrap();
        assert_eq!(keys.public_key, "public");
        assert_eq!(keys.secret, "c2VjcmV0");

        let mut no_keys = account();
        no_keys.access_info = None;
        assert!(ApiKeys::from_account(&no_keys).is_err());
    }

    #[tokio::test]
    #[ignore] // Hits the public price endpoint
    async fn test_get_price() {
        let client = BareBitcoinClient::from_env().unwrap();
        let price = client.get_price().await.unwrap();
        assert!(price.ask >= price.bid);
    }
}
