pub mod auth;
pub mod client;
pub mod ladder;
pub mod models;

pub use client::{ApiKeys, BareBitcoinClient};
pub use ladder::LimitLadder;
pub use models::*;
pub use provider_trait::{PriceSource, ValuationProvider};
