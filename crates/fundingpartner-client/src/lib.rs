pub mod client;
pub mod models;

pub use client::FundingPartnerClient;
pub use models::*;
pub use provider_trait::ValuationProvider;
