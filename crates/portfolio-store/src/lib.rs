pub mod accounts;
pub mod allocations;
pub mod db;
pub mod snapshots;
pub mod tokens;
pub mod transactions;

pub use accounts::NewAccount;
pub use allocations::AllocationUpdate;
pub use db::PortfolioDb;
pub use snapshots::ValuePoint;
