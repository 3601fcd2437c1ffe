use std::sync::Arc;

use crate::clock::Clock;
use crate::config::RetryPolicy;
use crate::domain::{
    Account, Coins, CommitReceipt, Direction, Error, HoldStatus, HoldToken, HoldWrite, Inr,
    LedgerBatch, LedgerStore, NewTransaction, Result, Transaction, TransactionId,
    TransactionStatus, TransactionType, UserId,
};
use crate::locks::KeyedLocks;

/// One side of a ledger movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub user_id: UserId,
    pub kind: TransactionType,
    pub amount: Coins,
    pub amount_inr: Option<Inr>,
    pub related_entity_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub note: Option<String>,
}

impl Posting {
    pub fn new(user_id: UserId, kind: TransactionType, amount: Coins) -> Self {
        Self {
            user_id,
            kind,
            amount,
            amount_inr: None,
            related_entity_id: None,
            idempotency_key: None,
            note: None,
        }
    }

    pub fn inr(mut self, amount: Inr) -> Self {
        self.amount_inr = Some(amount);
        self
    }

    pub fn related(mut self, entity_id: impl Into<String>) -> Self {
        self.related_entity_id = Some(entity_id.into());
        self
    }

    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    fn entry(
        &self,
        direction: Direction,
        status: TransactionStatus,
        balance_after: Coins,
        at: chrono::DateTime<chrono::Utc>,
    ) -> NewTransaction {
        NewTransaction {
            user_id: self.user_id,
            kind: self.kind,
            direction,
            amount_coins: self.amount,
            amount_inr: self.amount_inr,
            related_entity_id: self.related_entity_id.clone(),
            status,
            idempotency_key: self.idempotency_key.clone(),
            note: self.note.clone(),
            balance_after,
            created_at: at,
        }
    }
}

/// How the receiving side of a transfer lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditMode {
    /// Straight into `balance`.
    Immediate,
    /// Parked in `pending_gifts` until the recipient trades it.
    PendingTrade,
}

/// The only writer of balances. Mutations on one account are serialized; a
/// mutation that cannot get its accounts within the retry budget fails with
/// `ConcurrencyConflict` and changes nothing.
pub struct TransactionEngine {
    store: Arc<dyn LedgerStore>,
    locks: KeyedLocks<UserId>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl TransactionEngine {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>, retry: RetryPolicy) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
            clock,
            retry,
        }
    }

    pub fn account(&self, user_id: UserId) -> Account {
        self.store.account_or_new(user_id)
    }

    /// Every persisted account, ordered by user id.
    pub fn accounts(&self) -> Vec<Account> {
        let mut accounts = self.store.accounts();
        accounts.sort_by_key(|a| a.user_id);
        accounts
    }

    pub fn history(&self, user_id: UserId, limit: usize) -> Vec<Transaction> {
        self.store.history(user_id, limit)
    }

    pub fn pending_gift_credits(&self, user_id: UserId) -> Vec<Transaction> {
        self.store.pending_credits(user_id, TransactionType::GiftReceived)
    }

    pub async fn credit(
        &self,
        user_id: UserId,
        amount: Coins,
        kind: TransactionType,
        related_entity_id: Option<String>,
    ) -> Result<Transaction> {
        let mut posting = Posting::new(user_id, kind, amount);
        posting.related_entity_id = related_entity_id;
        self.post_credit(posting).await
    }

    pub async fn debit(
        &self,
        user_id: UserId,
        amount: Coins,
        kind: TransactionType,
        related_entity_id: Option<String>,
    ) -> Result<Transaction> {
        let mut posting = Posting::new(user_id, kind, amount);
        posting.related_entity_id = related_entity_id;
        self.post_debit(posting).await
    }

    pub async fn post_credit(&self, posting: Posting) -> Result<Transaction> {
        ensure_positive(posting.amount)?;
        let now = self.clock.now();
        let receipt = self
            .run(&[posting.user_id], |accounts| {
                let mut account = accounts[0].clone();
                account.credit(posting.amount)?;
                account.updated_at = Some(now);
                let tx = posting.entry(
                    Direction::Credit,
                    TransactionStatus::Completed,
                    account.balance,
                    now,
                );
                Ok(LedgerBatch::default()
                    .write(accounts[0].version, account)
                    .append(tx))
            })
            .await?;
        let tx = first_transaction(receipt)?;
        tracing::info!(
            user_id = tx.user_id,
            amount = tx.amount_coins,
            kind = %tx.kind,
            tx_id = tx.id,
            "credit applied"
        );
        Ok(tx)
    }

    pub async fn post_debit(&self, posting: Posting) -> Result<Transaction> {
        ensure_positive(posting.amount)?;
        let now = self.clock.now();
        let receipt = self
            .run(&[posting.user_id], |accounts| {
                let mut account = accounts[0].clone();
                account.debit(posting.amount)?;
                account.updated_at = Some(now);
                let tx = posting.entry(
                    Direction::Debit,
                    TransactionStatus::Completed,
                    account.balance,
                    now,
                );
                Ok(LedgerBatch::default()
                    .write(accounts[0].version, account)
                    .append(tx))
            })
            .await?;
        let tx = first_transaction(receipt)?;
        tracing::info!(
            user_id = tx.user_id,
            amount = tx.amount_coins,
            kind = %tx.kind,
            tx_id = tx.id,
            "debit applied"
        );
        Ok(tx)
    }

    /// Debits one account and credits another in a single commit.
    pub async fn transfer(
        &self,
        debit: Posting,
        credit: Posting,
        mode: CreditMode,
    ) -> Result<(Transaction, Transaction)> {
        ensure_positive(debit.amount)?;
        ensure_positive(credit.amount)?;
        if debit.user_id == credit.user_id {
            return Err(Error::Validation(format!(
                "user {} cannot transfer to themselves",
                debit.user_id
            )));
        }

        let now = self.clock.now();
        let receipt = self
            .run(&[debit.user_id, credit.user_id], |accounts| {
                let mut payer = accounts[0].clone();
                payer.debit(debit.amount)?;
                payer.updated_at = Some(now);

                let mut payee = accounts[1].clone();
                let status = match mode {
                    CreditMode::Immediate => {
                        payee.credit(credit.amount)?;
                        TransactionStatus::Completed
                    }
                    CreditMode::PendingTrade => {
                        payee.receive_gift(credit.amount)?;
                        TransactionStatus::Pending
                    }
                };
                payee.updated_at = Some(now);

                let debit_tx = debit.entry(
                    Direction::Debit,
                    TransactionStatus::Completed,
                    payer.balance,
                    now,
                );
                let credit_tx = credit.entry(Direction::Credit, status, payee.balance, now);
                Ok(LedgerBatch::default()
                    .write(accounts[0].version, payer)
                    .write(accounts[1].version, payee)
                    .append(debit_tx)
                    .append(credit_tx))
            })
            .await?;

        let mut txs = receipt.transactions.into_iter();
        match (txs.next(), txs.next()) {
            (Some(sent), Some(received)) => {
                tracing::info!(
                    from = sent.user_id,
                    to = received.user_id,
                    debited = sent.amount_coins,
                    credited = received.amount_coins,
                    kind = %sent.kind,
                    "transfer applied"
                );
                Ok((sent, received))
            }
            _ => Err(Error::Validation(
                "transfer commit returned no transactions".to_string(),
            )),
        }
    }

    /// Moves `amount` from `balance` into `held_amount`.
    pub async fn hold(&self, user_id: UserId, amount: Coins) -> Result<HoldToken> {
        ensure_positive(amount)?;
        let now = self.clock.now();
        let receipt = self
            .run(&[user_id], |accounts| {
                let mut account = accounts[0].clone();
                account.place_hold(amount)?;
                account.updated_at = Some(now);
                Ok(LedgerBatch::default()
                    .write(accounts[0].version, account)
                    .hold(HoldWrite::Place {
                        user_id,
                        amount,
                        at: now,
                    }))
            })
            .await?;
        let hold = receipt
            .holds
            .into_iter()
            .next()
            .ok_or_else(|| Error::Validation("hold commit returned no hold".to_string()))?;
        tracing::info!(user_id, amount, hold_id = hold.id, "coins held");
        Ok(hold.token())
    }

    /// Returns held coins to `balance`.
    pub async fn release_hold(&self, token: &HoldToken) -> Result<()> {
        let now = self.clock.now();
        self.run(&[token.user_id], |accounts| {
            let amount = self.active_hold_amount(token)?;
            let mut account = accounts[0].clone();
            account.release_hold(amount)?;
            account.updated_at = Some(now);
            Ok(LedgerBatch::default()
                .write(accounts[0].version, account)
                .hold(HoldWrite::Release(token.hold_id)))
        })
        .await?;
        tracing::info!(user_id = token.user_id, hold_id = token.hold_id, "hold released");
        Ok(())
    }

    /// Removes held coins for good and records the `withdrawal` debit.
    pub async fn settle_hold(
        &self,
        token: &HoldToken,
        payout: Option<Inr>,
        related_entity_id: Option<String>,
    ) -> Result<Transaction> {
        let now = self.clock.now();
        let receipt = self
            .run(&[token.user_id], |accounts| {
                let amount = self.active_hold_amount(token)?;
                let mut account = accounts[0].clone();
                account.settle_hold(amount)?;
                account.updated_at = Some(now);

                let mut posting = Posting::new(token.user_id, TransactionType::Withdrawal, amount);
                posting.amount_inr = payout;
                posting.related_entity_id = related_entity_id.clone();
                posting.idempotency_key = Some(format!("hold-settle:{}", token.hold_id));
                let tx = posting.entry(
                    Direction::Debit,
                    TransactionStatus::Completed,
                    account.balance,
                    now,
                );
                Ok(LedgerBatch::default()
                    .write(accounts[0].version, account)
                    .hold(HoldWrite::Settle(token.hold_id))
                    .append(tx))
            })
            .await?;
        let tx = first_transaction(receipt)?;
        tracing::info!(
            user_id = tx.user_id,
            hold_id = token.hold_id,
            tx_id = tx.id,
            "hold settled"
        );
        Ok(tx)
    }

    /// Admin correction. Never edits history; always a new `adjustment` entry.
    pub async fn adjust(
        &self,
        user_id: UserId,
        direction: Direction,
        amount: Coins,
        note: impl Into<String>,
    ) -> Result<Transaction> {
        let posting = Posting::new(user_id, TransactionType::Adjustment, amount).note(note);
        match direction {
            Direction::Credit => self.post_credit(posting).await,
            Direction::Debit => self.post_debit(posting).await,
        }
    }

    /// Turns a pending credit (a received gift) into spendable balance.
    pub async fn complete_pending_credit(
        &self,
        user_id: UserId,
        tx_id: TransactionId,
    ) -> Result<Transaction> {
        let now = self.clock.now();
        self.run(&[user_id], |accounts| {
            let pending = self
                .store
                .transaction(tx_id)
                .filter(|tx| {
                    tx.user_id == user_id
                        && tx.direction == Direction::Credit
                        && tx.status == TransactionStatus::Pending
                })
                .ok_or(Error::NotPending(tx_id))?;
            let mut account = accounts[0].clone();
            account.trade_gift(pending.amount_coins)?;
            account.updated_at = Some(now);
            Ok(LedgerBatch::default()
                .write(accounts[0].version, account)
                .complete(tx_id))
        })
        .await?;
        tracing::info!(user_id, tx_id, "pending credit completed");
        self.store.transaction(tx_id).ok_or(Error::NotPending(tx_id))
    }

    fn active_hold_amount(&self, token: &HoldToken) -> Result<Coins> {
        self.store
            .hold(token.hold_id)
            .filter(|h| h.status == HoldStatus::Active && h.user_id == token.user_id)
            .map(|h| h.amount)
            .ok_or(Error::HoldNotActive(token.hold_id))
    }

    /// Locks `users`, lets `build` turn their current state into a batch, and
    /// commits it. Lock timeouts and version conflicts are retried with backoff.
    async fn run<F>(&self, users: &[UserId], mut build: F) -> Result<CommitReceipt>
    where
        F: FnMut(&[Account]) -> Result<LedgerBatch>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = match self.locks.acquire_all(users, self.retry.lock_timeout).await {
                Ok(_guards) => {
                    let accounts: Vec<Account> = users
                        .iter()
                        .map(|user_id| self.store.account_or_new(*user_id))
                        .collect();
                    build(&accounts).and_then(|batch| self.store.commit(batch))
                }
                Err(user_id) => Err(Error::ConcurrencyConflict(user_id)),
            };

            match outcome {
                Err(e) if e.is_retryable() => {
                    let user_id = match &e {
                        Error::VersionConflict(id) | Error::ConcurrencyConflict(id) => *id,
                        _ => users.first().copied().unwrap_or_default(),
                    };
                    if attempt >= self.retry.max_attempts {
                        tracing::warn!(user_id, attempt, "giving up on contended account");
                        return Err(Error::ConcurrencyConflict(user_id));
                    }
                    let delay = self.retry.backoff(attempt);
                    tracing::debug!(
                        user_id,
                        attempt,
                        ?delay,
                        error = %e,
                        "retrying ledger mutation"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

fn ensure_positive(amount: Coins) -> Result<()> {
    if amount <= 0 {
        return Err(Error::InvalidAmount(amount));
    }
    Ok(())
}

fn first_transaction(receipt: CommitReceipt) -> Result<Transaction> {
    receipt
        .transactions
        .into_iter()
        .next()
        .ok_or_else(|| Error::Validation("commit returned no transaction".to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::clock::SystemClock;
    use crate::domain::Hold;
    use crate::store::InMemoryLedgerStore;

    fn engine() -> TransactionEngine {
        TransactionEngine::new(
            Arc::new(InMemoryLedgerStore::new()),
            Arc::new(SystemClock),
            RetryPolicy::default(),
        )
    }

    /// Reports a version conflict for the first `failures` commits.
    struct ContendedStore {
        inner: InMemoryLedgerStore,
        failures: u32,
        attempts: AtomicU32,
    }

    impl LedgerStore for ContendedStore {
        fn account(&self, user_id: UserId) -> Option<Account> {
            self.inner.account(user_id)
        }
        fn accounts(&self) -> Vec<Account> {
            self.inner.accounts()
        }
        fn commit(&self, batch: LedgerBatch) -> Result<CommitReceipt> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.failures {
                let user_id = batch.accounts[0].account.user_id;
                return Err(Error::VersionConflict(user_id));
            }
            self.inner.commit(batch)
        }
        fn transaction(&self, id: TransactionId) -> Option<Transaction> {
            self.inner.transaction(id)
        }
        fn history(&self, user_id: UserId, limit: usize) -> Vec<Transaction> {
            self.inner.history(user_id, limit)
        }
        fn pending_credits(&self, user_id: UserId, kind: TransactionType) -> Vec<Transaction> {
            self.inner.pending_credits(user_id, kind)
        }
        fn hold(&self, id: crate::domain::HoldId) -> Option<Hold> {
            self.inner.hold(id)
        }
    }

    fn contended(failures: u32) -> (TransactionEngine, Arc<ContendedStore>) {
        let store = Arc::new(ContendedStore {
            inner: InMemoryLedgerStore::new(),
            failures,
            attempts: AtomicU32::new(0),
        });
        let retry = RetryPolicy {
            lock_timeout: Duration::from_millis(100),
            max_attempts: 3,
            base_backoff: Duration::from_millis(1),
        };
        let engine = TransactionEngine::new(store.clone(), Arc::new(SystemClock), retry);
        (engine, store)
    }

    #[tokio::test]
    async fn debit_then_credit_restores_balance() {
        let engine = engine();
        engine
            .credit(1, 500, TransactionType::Purchase, None)
            .await
            .unwrap();
        engine
            .debit(1, 120, TransactionType::MessageSpent, Some("chat-1".into()))
            .await
            .unwrap();
        engine
            .credit(1, 120, TransactionType::Adjustment, None)
            .await
            .unwrap();

        assert_eq!(engine.account(1).balance, 500);
        assert_eq!(engine.history(1, 10).len(), 3);
    }

    #[tokio::test]
    async fn rejects_non_positive_amounts() {
        let engine = engine();
        assert!(matches!(
            engine.credit(1, 0, TransactionType::Purchase, None).await,
            Err(Error::InvalidAmount(0))
        ));
        assert!(matches!(
            engine.debit(1, -5, TransactionType::MessageSpent, None).await,
            Err(Error::InvalidAmount(-5))
        ));
        assert!(engine.history(1, 10).is_empty());
    }

    #[tokio::test]
    async fn overdraft_is_refused() {
        let engine = engine();
        engine
            .credit(1, 10, TransactionType::Purchase, None)
            .await
            .unwrap();
        let err = engine
            .debit(1, 11, TransactionType::MessageSpent, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientBalance {
                available: 10,
                required: 11,
                ..
            }
        ));
        assert_eq!(engine.account(1).balance, 10);
    }

    #[tokio::test]
    async fn hold_release_and_settle() {
        let engine = engine();
        engine
            .credit(1, 1_000, TransactionType::Purchase, None)
            .await
            .unwrap();

        let first = engine.hold(1, 300).await.unwrap();
        let second = engine.hold(1, 200).await.unwrap();
        let account = engine.account(1);
        assert_eq!((account.balance, account.held_amount), (500, 500));

        engine.release_hold(&first).await.unwrap();
        assert!(matches!(
            engine.release_hold(&first).await,
            Err(Error::HoldNotActive(_))
        ));

        let tx = engine
            .settle_hold(&second, Inr::from_rupees(100), Some("withdrawal:1".into()))
            .await
            .unwrap();
        assert_eq!(tx.kind, TransactionType::Withdrawal);
        assert_eq!(tx.amount_coins, 200);

        let account = engine.account(1);
        assert_eq!((account.balance, account.held_amount), (800, 0));
        assert!(matches!(
            engine.settle_hold(&second, None, None).await,
            Err(Error::HoldNotActive(_))
        ));
    }

    #[tokio::test]
    async fn pending_gift_credit_lands_on_completion() {
        let engine = engine();
        engine
            .credit(1, 100, TransactionType::Purchase, None)
            .await
            .unwrap();
        let (_, received) = engine
            .transfer(
                Posting::new(1, TransactionType::GiftSent, 100),
                Posting::new(2, TransactionType::GiftReceived, 60),
                CreditMode::PendingTrade,
            )
            .await
            .unwrap();
        assert_eq!(received.status, TransactionStatus::Pending);
        assert_eq!(engine.account(2).pending_gifts, 60);
        assert_eq!(engine.account(2).balance, 0);

        let done = engine.complete_pending_credit(2, received.id).await.unwrap();
        assert_eq!(done.status, TransactionStatus::Completed);
        assert_eq!(engine.account(2).balance, 60);
        assert!(matches!(
            engine.complete_pending_credit(2, received.id).await,
            Err(Error::NotPending(_))
        ));
    }

    #[tokio::test]
    async fn failed_transfer_changes_neither_side() {
        let engine = engine();
        engine
            .credit(1, 5, TransactionType::Purchase, None)
            .await
            .unwrap();
        let err = engine
            .transfer(
                Posting::new(1, TransactionType::MessageSpent, 20),
                Posting::new(2, TransactionType::MessageEarned, 10),
                CreditMode::Immediate,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientBalance { .. }));
        assert_eq!(engine.account(1).balance, 5);
        assert_eq!(engine.account(2).version, 0);
    }

    #[tokio::test]
    async fn version_conflicts_are_retried() {
        let (engine, store) = contended(2);
        engine
            .credit(1, 50, TransactionType::Purchase, None)
            .await
            .unwrap();
        assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(engine.account(1).balance, 50);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_conflict_without_side_effects() {
        let (engine, store) = contended(u32::MAX);
        let err = engine
            .credit(1, 50, TransactionType::Purchase, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConcurrencyConflict(1)));
        assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
        assert!(engine.account(1).version == 0 && engine.history(1, 10).is_empty());
    }
}
