use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    pub price: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BitcoinAccounts {
    #[serde(default)]
    pub accounts: Vec<BitcoinAccount>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitcoinAccount {
    pub id: String,
    pub available_btc: Decimal,
    #[serde(default)]
    pub pending_orders_btc: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrderType {
    #[serde(rename = "ORDER_TYPE_LIMIT")]
    Limit,
    #[serde(rename = "ORDER_TYPE_MARKET")]
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    #[serde(rename = "DIRECTION_BUY")]
    Buy,
    #[serde(rename = "DIRECTION_SELL")]
    Sell,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub direction: Direction,
    /// Amount in NOK.
    pub amount: Decimal,
    pub price: Decimal,
}

impl OrderRequest {
    pub fn limit_buy(amount: Decimal, price: Decimal) -> Self {
        Self {
            order_type: OrderType::Limit,
            direction: Direction::Buy,
            amount,
            price,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreated {
    pub order_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenOrders {
    #[serde(default)]
    pub orders: Vec<OpenOrder>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrder {
    pub order_id: String,
    #[serde(rename = "type")]
    pub order_type: String,
    pub direction: String,
    pub amount: Decimal,
    #[serde(default)]
    pub created_at: Option<String>,
}
