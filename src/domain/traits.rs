use chrono::{DateTime, Utc};
use futures::Stream;

use crate::domain::{
    Account, AuditEntry, CoinPlan, CommitReceipt, Error, Gift, Hold, HoldId, LedgerBatch,
    MessageCosts, NewAuditEntry, NewWithdrawal, PayoutSlab, Result, Transaction, TransactionId,
    TransactionType, UserId, WithdrawalId, WithdrawalRequest, WithdrawalStatus,
};
use crate::ingestion::Command;

pub trait CommandStream {
    type CmdStream: Stream<Item = Result<Command>> + Send + Unpin + 'static;
    fn stream(&mut self) -> Self::CmdStream;
}

pub trait DeadLetterQueue {
    fn report(&self, error: &Error);
}

/// Balances, holds and the append-only transaction log.
pub trait LedgerStore: Send + Sync {
    fn account(&self, user_id: UserId) -> Option<Account>;

    /// The stored account, or a fresh version-0 one that is not yet persisted.
    fn account_or_new(&self, user_id: UserId) -> Account {
        self.account(user_id).unwrap_or_else(|| Account::new(user_id))
    }

    fn accounts(&self) -> Vec<Account>;

    fn commit(&self, batch: LedgerBatch) -> Result<CommitReceipt>;

    fn transaction(&self, id: TransactionId) -> Option<Transaction>;

    /// Newest first.
    fn history(&self, user_id: UserId, limit: usize) -> Vec<Transaction>;

    fn pending_credits(&self, user_id: UserId, kind: TransactionType) -> Vec<Transaction>;

    fn hold(&self, id: HoldId) -> Option<Hold>;
}

pub trait CatalogRepository: Send + Sync {
    fn plans(&self) -> Vec<CoinPlan>;
    fn upsert_plan(&self, plan: CoinPlan);
    fn remove_plan(&self, id: &str) -> Option<CoinPlan>;

    fn slabs(&self) -> Vec<PayoutSlab>;
    fn replace_slabs(&self, slabs: Vec<PayoutSlab>);

    fn message_costs(&self) -> MessageCosts;
    fn set_message_costs(&self, costs: MessageCosts);

    fn gift(&self, id: &str) -> Option<Gift>;
    fn gifts(&self) -> Vec<Gift>;
    fn upsert_gift(&self, gift: Gift);
}

pub trait WithdrawalStore: Send + Sync {
    fn insert(&self, request: NewWithdrawal) -> WithdrawalRequest;

    fn get(&self, id: WithdrawalId) -> Option<WithdrawalRequest>;

    /// Replaces the stored request only if it is still in `expected` state.
    fn update(&self, expected: WithdrawalStatus, request: WithdrawalRequest) -> Result<()>;

    fn for_user(&self, user_id: UserId) -> Vec<WithdrawalRequest>;

    fn with_status(&self, status: WithdrawalStatus) -> Vec<WithdrawalRequest>;

    fn created_since(&self, user_id: UserId, since: DateTime<Utc>) -> Vec<WithdrawalRequest> {
        self.for_user(user_id)
            .into_iter()
            .filter(|w| w.created_at > since)
            .collect()
    }

    fn all(&self) -> Vec<WithdrawalRequest>;
}

pub trait AuditLog: Send + Sync {
    fn append(&self, entry: NewAuditEntry) -> Result<AuditEntry>;

    fn for_target(&self, target: &str) -> Vec<AuditEntry>;

    fn entries(&self) -> Vec<AuditEntry>;
}
