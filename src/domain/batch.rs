use chrono::{DateTime, Utc};

use crate::domain::{
    Account, Coins, Hold, HoldId, NewTransaction, Transaction, TransactionId, UserId,
};

/// Account state to persist, guarded by the version it was read at.
#[derive(Debug, Clone)]
pub struct AccountWrite {
    pub expected_version: u64,
    pub account: Account,
}

#[derive(Debug, Clone)]
pub enum HoldWrite {
    Place {
        user_id: UserId,
        amount: Coins,
        at: DateTime<Utc>,
    },
    Release(HoldId),
    Settle(HoldId),
}

/// Everything one ledger mutation changes. The store applies all of it or none.
#[derive(Debug, Clone, Default)]
pub struct LedgerBatch {
    pub accounts: Vec<AccountWrite>,
    pub transactions: Vec<NewTransaction>,
    pub complete_pending: Vec<TransactionId>,
    pub holds: Vec<HoldWrite>,
}

impl LedgerBatch {
    pub fn write(mut self, expected_version: u64, account: Account) -> Self {
        self.accounts.push(AccountWrite {
            expected_version,
            account,
        });
        self
    }

    pub fn append(mut self, tx: NewTransaction) -> Self {
        self.transactions.push(tx);
        self
    }

    pub fn complete(mut self, tx_id: TransactionId) -> Self {
        self.complete_pending.push(tx_id);
        self
    }

    pub fn hold(mut self, write: HoldWrite) -> Self {
        self.holds.push(write);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommitReceipt {
    pub transactions: Vec<Transaction>,
    pub holds: Vec<Hold>,
}
