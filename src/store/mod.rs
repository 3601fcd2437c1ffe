pub mod audit_log;
pub mod catalog_store;
pub mod ledger_store;
pub mod withdrawal_store;

pub use audit_log::InMemoryAuditLog;
pub use catalog_store::InMemoryCatalogStore;
pub use ledger_store::InMemoryLedgerStore;
pub use withdrawal_store::InMemoryWithdrawalStore;
