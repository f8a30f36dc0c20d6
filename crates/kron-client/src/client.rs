use crate::models::*;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use portfolio_core::numeric::{percent_of, round2, sum};
use portfolio_core::{
    Account, Credentials, EquityCategory, Holding, ProviderToken, TokenStore, TotalValue,
};
use provider_trait::ValuationProvider;
use reqwest::{header, Client};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const DEFAULT_BASE_URL: &str = "https://kron.no";
const DEFAULT_TOKEN_URL: &str =
    "https://id.storebrand.no/auth/realms/storebrand/protocol/openid-connect/token";
const CLIENT_ID: &str = "kron.web";
/// Name of the synthetic holding covering uninvested cash.
pub const CASH_HOLDING: &str = "Kontanter";

/// Refreshed access tokens are reused for this long before refreshing again.
const TOKEN_REUSE: Duration = Duration::from_secs(240);

pub struct KronClient {
    client: Client,
    base_url: String,
    token_url: String,
    tokens: Arc<dyn TokenStore>,
    cached: Mutex<Option<(ProviderToken, Instant)>>,
}

impl KronClient {
    pub fn new(
        base_url: String,
        token_url: String,
        tokens: Arc<dyn TokenStore>,
    ) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;

        Ok(Self {
            client,
            base_url,
            token_url,
            tokens,
            cached: Mutex::new(None),
        })
    }

    /// Create client from environment variables, falling back to the public
    /// Kron and Storebrand endpoints.
    pub fn from_env(tokens: Arc<dyn TokenStore>) -> Result<Self> {
        let base_url =
            std::env::var("KRON_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let token_url =
            std::env::var("KRON_TOKEN_URL").unwrap_or_else(|_| DEFAULT_TOKEN_URL.to_string());

        Self::new(base_url, token_url, tokens)
    }

    /// Exchange a refresh token for a new token pair.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<ProviderToken> {
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", CLIENT_ID),
            ("refresh_token", refresh_token),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("Kron token refresh failed: {}", error_text));
        }

        let token = response.json::<TokenResponse>().await?;
        Ok(ProviderToken {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            token_type: token.token_type,
        })
    }

    /// Refresh the stored token pair and persist the result.
    pub async fn refresh_and_store(&self) -> Result<ProviderToken> {
        let stored = self
            .tokens
            .load_token()
            .await?
            .context("No Kron refresh token stored")?;

        let token = self.refresh_token(&stored.refresh_token).await?;
        self.tokens.save_token(&token).await?;
        *self.cached.lock().await = Some((token.clone(), Instant::now()));
        tracing::info!("Kron token refreshed");
        Ok(token)
    }

    /// Current access token. Falls back to the last stored access token when
    /// the refresh endpoint rejects the refresh token.
    async fn access_token(&self) -> Result<ProviderToken> {
        {
            let cached = self.cached.lock().await;
            if let Some((token, at)) = cached.as_ref() {
                if at.elapsed() < TOKEN_REUSE {
                    return Ok(token.clone());
                }
            }
        }

        match self.refresh_and_store().await {
            Ok(token) => Ok(token),
            Err(e) => {
                tracing::warn!("Kron token refresh failed, using stored access token: {}", e);
                self.tokens
                    .load_token()
                    .await?
                    .context("No Kron token stored")
            }
        }
    }

    async fn auth_headers(&self) -> Result<header::HeaderMap> {
        let token = self.access_token().await?;
        let scheme = token.token_type.as_deref().unwrap_or("Bearer");
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("{} {}", scheme, token.access_token))
                .context("Kron access token contains invalid header characters")?,
        );
        Ok(headers)
    }

    /// Get the value development series for an account.
    pub async fn get_development(
        &self,
        account_key: &str,
        interval: DevelopmentInterval,
    ) -> Result<Development> {
        let url = format!(
            "{}/api/v4/accounts/{}/development?interval={}",
            self.base_url,
            account_key,
            interval.as_query()
        );

        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers().await?)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!(
                "Kron development request failed (access key expired?): {}",
                error_text
            ));
        }

        let development = response.json::<DevelopmentResponse>().await?;
        Ok(development.data)
    }

    /// Get per-fund positions for an account.
    pub async fn get_positions(&self, account_key: &str) -> Result<Vec<PositionPerformance>> {
        let url = format!(
            "{}/api/accounts/{}/position-performances",
            self.base_url, account_key
        );

        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers().await?)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("Kron positions request failed: {}", error_text));
        }

        let positions = response.json::<Vec<PositionPerformance>>().await?;
        Ok(positions)
    }
}

fn account_key(account: &Account) -> Result<&str> {
    match account.credentials() {
        Some(Credentials::TokenPair { account_key, .. }) => Ok(account_key),
        _ => Err(anyhow!(
            "Account {} has no Kron account key",
            account.name
        )),
    }
}

/// Convert the latest development point into a `TotalValue`; an empty series
/// values the account at zero.
pub fn total_value_from_development(account: &Account, development: &Development) -> TotalValue {
    match development.latest() {
        Some(point) => TotalValue {
            account_name: account.name.clone(),
            account_id: Some(account.id),
            market_value: round2(point.market_value.value),
            yield_amount: point.yield_amount.value,
            return_amount: point.return_amount.value,
            equity_type: EquityCategory::Fund,
        },
        None => {
            tracing::warn!(
                "Kron returned no development for {}, access key may have expired",
                account.name
            );
            TotalValue::zero(account, EquityCategory::Fund)
        }
    }
}

/// Build holdings from Kron positions. Cash not covered by any position is
/// added as a synthetic holding so percentages add up to the account total.
/// Goal percentages are left unset; they live in the local goal store.
pub fn holdings_from_positions(
    account: &Account,
    positions: Vec<PositionPerformance>,
    total_value: Decimal,
) -> Vec<Holding> {
    let mut holdings: Vec<Holding> = positions
        .into_iter()
        .map(|p| Holding {
            name: p.security_name,
            account_id: account.id,
            equity_share: p.units,
            equity_type: EquityCategory::Fund,
            value: p.market_value,
            goal_percentage: None,
            current_percentage: None,
            yield_amount: p.profit,
            isin: p.isin.unwrap_or_default(),
        })
        .collect();

    let invested = sum(holdings.iter().map(|h| h.value));
    if invested < total_value {
        holdings.push(Holding {
            name: CASH_HOLDING.to_string(),
            account_id: account.id,
            equity_share: Decimal::ONE,
            equity_type: EquityCategory::Fund,
            value: total_value - invested,
            goal_percentage: None,
            current_percentage: None,
            yield_amount: Decimal::ZERO,
            isin: String::new(),
        });
    }

    for holding in &mut holdings {
        holding.current_percentage = Some(round2(percent_of(holding.value, total_value)));
    }
    holdings
}

#[async_trait]
impl ValuationProvider for KronClient {
    async fn fetch_total_value(&self, account: &Account) -> Result<TotalValue> {
        let key = account_key(account)?;
        let development = self.get_development(key, DevelopmentInterval::Total).await?;
        Ok(total_value_from_development(account, &development))
    }

    async fn fetch_holdings(&self, account: &Account) -> Result<Vec<Holding>> {
        let key = account_key(account)?;
        let development = self
            .get_development(key, DevelopmentInterval::OneWeek)
            .await?;
        let total_value = development
            .latest()
            .map(|p| p.market_value.value)
            .unwrap_or_default();

        let positions = self.get_positions(key).await?;
        tracing::debug!(
            "Kron account {}: {} positions, total {}",
            account.name,
            positions.len(),
            total_value
        );
        Ok(holdings_from_positions(account, positions, total_value))
    }

    fn provider_name(&self) -> &str {
        "kron"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portfolio_core::AccessInfo;
    use rust_decimal_macros::dec;

    fn kron_account() -> Account {
        Account {
            id: 7,
            created_at: "2024-01-01".to_string(),
            name: "Kron".to_string(),
            account_type: "FUND".to_string(),
            total_value: Decimal::ZERO,
            is_automatic: true,
            access_info: Some(AccessInfo::token_pair("abc", Some("key".to_string()))),
        }
    }

    fn position(name: &str, value: Decimal) -> PositionPerformance {
        PositionPerformance {
            security_name: name.to_string(),
            units: dec!(10),
            market_value: value,
            profit: dec!(1),
            isin: Some("NO0000000001".to_string()),
        }
    }

    #[test]
    fn test_total_value_rounds_latest_point() {
        let development = Development {
            currency: Some("NOK".to_string()),
            series: vec![DevelopmentPoint {
                date: "2024-05-01".to_string(),
                market_value: Amount { value: dec!(1500.456) },
                yield_amount: Amount { value: dec!(100) },
                return_amount: Amount { value: dec!(7.1) },
            }],
        };
        let total = total_value_from_development(&kron_account(), &development);
        assert_eq!(total.market_value, dec!(1500.46));
        assert_eq!(total.yield_amount, dec!(100));
        assert_eq!(total.equity_type, EquityCategory::Fund);
        assert_eq!(total.account_id, Some(7));
    }

    #[test]
    fn test_empty_development_is_zero() {
        let development = Development {
            currency: None,
            series: vec![],
        };
        let total = total_value_from_development(&kron_account(), &development);
        assert_eq!(total.market_value, Decimal::ZERO);
        assert_eq!(total.return_amount, Decimal::ZERO);
    }

    #[test]
    fn test_cash_holding_fills_remainder() {
        let holdings = holdings_from_positions(
            &kron_account(),
            vec![position("Global", dec!(600)), position("Norge", dec!(300))],
            dec!(1000),
        );

        assert_eq!(holdings.len(), 3);
        assert!(holdings.iter().all(|h| h.goal_percentage.is_none()));
        assert_eq!(holdings[2].name, CASH_HOLDING);
        assert_eq!(holdings[2].value, dec!(100));
        assert_eq!(holdings[0].current_percentage, Some(dec!(60)));
        assert_eq!(holdings[2].current_percentage, Some(dec!(10)));
    }

    #[test]
    fn test_no_cash_holding_when_fully_invested() {
        let holdings = holdings_from_positions(
            &kron_account(),
            vec![position("Global", dec!(1000))],
            dec!(1000),
        );
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].current_percentage, Some(dec!(100)));
    }

    #[test]
    fn test_zero_total_gives_zero_percentages() {
        let holdings = holdings_from_positions(
            &kron_account(),
            vec![position("Global", dec!(0))],
            Decimal::ZERO,
        );
        assert_eq!(holdings[0].current_percentage, Some(Decimal::ZERO));
    }

    #[test]
    fn test_login_account_has_no_key() {
        let mut account = kron_account();
        account.access_info = Some(AccessInfo::login("user", "pw"));
        assert!(account_key(&account).is_err());
    }
}
