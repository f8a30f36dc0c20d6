pub mod client;
pub mod expiry;
pub mod models;

pub use client::KronClient;
pub use expiry::AccessKeyExpiry;
pub use models::*;
pub use provider_trait::ValuationProvider;
