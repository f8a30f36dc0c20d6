use anyhow::{anyhow, Result};
use async_trait::async_trait;
use portfolio_core::numeric::round2;
use provider_trait::PriceSource;
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.e24.no";
const MAX_ATTEMPTS: u32 = 3;

/// Oslo Børs quotes from the E24 chart API.
#[derive(Clone)]
pub struct E24Client {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    /// `[timestamp, price, ...]` rows, oldest first.
    #[serde(default)]
    pub data: Vec<Vec<serde_json::Value>>,
}

impl ChartResponse {
    /// Closing price of the last row, rounded to two decimals.
    pub fn last_price(&self) -> Option<Decimal> {
        let row = self.data.last()?;
        let price = row.get(1)?.as_f64()?;
        Decimal::from_f64(price).map(round2)
    }
}

impl E24Client {
    pub fn new(base_url: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;

        Ok(Self { client, base_url })
    }

    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("E24_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Self::new(base_url)
    }

    /// Send a request, retrying on 429 with a short pause.
    async fn send_request(&self, url: &str) -> Result<reqwest::Response> {
        for attempt in 1..=MAX_ATTEMPTS {
            let response = self.client.get(url).send().await?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }

            tracing::warn!("E24 rate limited, retry {}/{}", attempt, MAX_ATTEMPTS);
            tokio::time::sleep(Duration::from_secs(2)).await;
        }

        Err(anyhow!("Rate limited by E24 after {} attempts", MAX_ATTEMPTS))
    }

    /// One week of price history for a ticker.
    pub async fn get_chart(&self, ticker: &str) -> Result<ChartResponse> {
        let url = format!(
            "{}/bors/chart/{}?period=1weeks&type=stock",
            self.base_url, ticker
        );

        let response = self.send_request(&url).await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "E24 HTTP {} for {}: {}",
                response.status(),
                ticker,
                response.text().await.unwrap_or_default()
            ));
        }

        Ok(response.json::<ChartResponse>().await?)
    }
}

#[async_trait]
impl PriceSource for E24Client {
    async fn unit_price(&self, ticker: &str) -> Result<Decimal> {
        let chart = self.get_chart(ticker).await?;
        let price = chart
            .last_price()
            .ok_or_else(|| anyhow!("E24 returned no prices for {}", ticker))?;
        tracing::debug!("E24 price for {}: {}", ticker, price);
        Ok(price)
    }

    fn source_name(&self) -> &str {
        "e24"
    }
}
