pub mod account;
pub mod audit;
pub mod batch;
pub mod catalog;
pub mod error;
pub mod hold;
pub mod money;
pub mod traits;
pub mod transaction;
pub mod withdrawal;

pub type UserId = i64;
pub type AdminId = i64;
pub type TransactionId = i64;
pub type HoldId = i64;
pub type WithdrawalId = i64;

pub use account::Account;
pub use audit::{Actor, AuditAction, AuditEntry, NewAuditEntry};
pub use batch::{AccountWrite, CommitReceipt, HoldWrite, LedgerBatch};
pub use catalog::{CoinPlan, Gift, MessageCosts, PayoutSlab, Tier};
pub use error::{Error, Result};
pub use hold::{Hold, HoldStatus, HoldToken};
pub use money::{Coins, Inr};
pub use traits::{
    AuditLog, CatalogRepository, CommandStream, DeadLetterQueue, LedgerStore, WithdrawalStore,
};
pub use transaction::{Direction, NewTransaction, Transaction, TransactionStatus, TransactionType};
pub use withdrawal::{
    NewWithdrawal, PayoutDetails, PayoutMethod, WithdrawalRequest, WithdrawalStatus,
    payout_amount,
};
