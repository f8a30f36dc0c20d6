//! Valuation aggregation and rebalancing.
//!
//! Accounts are routed to a valuation provider by their shape, valued
//! concurrently, grouped by asset class and compared against target
//! allocations. Nothing in this crate persists results; callers write
//! snapshots back through the store.

pub mod dispatch;
pub mod engine;
pub mod ledger;
pub mod policy;
pub mod summary;

#[cfg(test)]
mod mock;

pub use dispatch::{ProviderKind, ProviderSet, SessionKind};
pub use engine::{AccountSummary, ValuationEngine};
pub use ledger::{CryptoLedgerProvider, StockLedgerProvider};
pub use policy::ThresholdPolicy;
