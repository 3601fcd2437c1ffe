pub mod catalog;
pub mod clock;
pub mod config;
pub mod dlq;
pub mod domain;
pub mod economy;
pub mod engine;
pub mod ingestion;
pub mod locks;
pub mod logging;
pub mod report;
pub mod slabs;
pub mod store;
pub mod transaction_engine;
pub mod withdrawal;

pub use catalog::{CatalogSeed, PricingCatalog};
pub use config::LedgerConfig;
pub use domain::{Error, Result};
pub use economy::CoinEconomy;
pub use transaction_engine::TransactionEngine;
pub use withdrawal::WithdrawalWorkflow;
