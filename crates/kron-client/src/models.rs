use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevelopmentInterval {
    OneWeek,
    OneMonth,
    ThreeMonths,
    SixMonths,
    YearToDate,
    OneYear,
    ThreeYears,
    FiveYears,
    Total,
}

impl DevelopmentInterval {
    pub fn as_query(&self) -> &'static str {
        match self {
            DevelopmentInterval::OneWeek => "1W",
            DevelopmentInterval::OneMonth => "1M",
            DevelopmentInterval::ThreeMonths => "3M",
            DevelopmentInterval::SixMonths => "6M",
            DevelopmentInterval::YearToDate => "year-to-date",
            DevelopmentInterval::OneYear => "1Y",
            DevelopmentInterval::ThreeYears => "3Y",
            DevelopmentInterval::FiveYears => "5Y",
            DevelopmentInterval::Total => "total",
        }
    }
}

impl fmt::Display for DevelopmentInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DevelopmentResponse {
    pub data: Development,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Development {
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub series: Vec<DevelopmentPoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DevelopmentPoint {
    pub date: String,
    pub market_value: Amount,
    #[serde(rename = "yield")]
    pub yield_amount: Amount,
    #[serde(rename = "return")]
    pub return_amount: Amount,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Amount {
    pub value: Decimal,
}

impl Development {
    /// Most recent point of the series, if any.
    pub fn latest(&self) -> Option<&DevelopmentPoint> {
        self.series.last()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PositionPerformance {
    pub security_name: String,
    pub units: Decimal,
    pub market_value: Decimal,
    #[serde(default)]
    pub profit: Decimal,
    #[serde(default)]
    pub isin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}
