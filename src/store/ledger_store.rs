use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};

use parking_lot::Mutex;

use crate::domain::{
    Account, CommitReceipt, Error, Hold, HoldId, HoldStatus, HoldWrite, LedgerBatch, LedgerStore,
    Result, Transaction, TransactionId, TransactionStatus, TransactionType, UserId,
};

#[derive(Default, Debug)]
struct LedgerState {
    accounts: HashMap<UserId, Account>,
    ledger: BTreeMap<TransactionId, Transaction>,
    by_user: HashMap<UserId, Vec<TransactionId>>,
    idempotency: HashMap<String, TransactionId>,
    holds: HashMap<HoldId, Hold>,
    next_tx_id: TransactionId,
    next_hold_id: HoldId,
}

/// Process-local ledger. One mutex guards the whole state so a batch lands atomically.
#[derive(Default, Debug)]
pub struct InMemoryLedgerStore {
    state: Mutex<LedgerState>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerState {
    fn check(&self, batch: &LedgerBatch) -> Result<()> {
        for write in &batch.accounts {
            let account = &write.account;
            let current = self
                .accounts
                .get(&account.user_id)
                .map_or(0, |a| a.version);
            if current != write.expected_version {
                return Err(Error::VersionConflict(account.user_id));
            }
            if account.balance < 0 || account.held_amount < 0 || account.pending_gifts < 0 {
                return Err(Error::Validation(format!(
                    "refusing negative balances for user {}",
                    account.user_id
                )));
            }
        }

        let mut keys = HashSet::new();
        for tx in &batch.transactions {
            if tx.amount_coins <= 0 {
                return Err(Error::InvalidAmount(tx.amount_coins));
            }
            if let Some(key) = &tx.idempotency_key {
                if self.idempotency.contains_key(key) || !keys.insert(key.as_str()) {
                    return Err(Error::DuplicateTransaction(key.clone()));
                }
            }
        }

        for id in &batch.complete_pending {
            match self.ledger.get(id) {
                Some(tx) if tx.status == TransactionStatus::Pending => {}
                _ => return Err(Error::NotPending(*id)),
            }
        }

        let mut touched = HashSet::new();
        for write in &batch.holds {
            if let HoldWrite::Release(id) | HoldWrite::Settle(id) = write {
                let active = self
                    .holds
                    .get(id)
                    .is_some_and(|h| h.status == HoldStatus::Active);
                if !active || !touched.insert(*id) {
                    return Err(Error::HoldNotActive(*id));
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, batch: LedgerBatch) -> CommitReceipt {
        let mut receipt = CommitReceipt::default();

        for write in batch.accounts {
            let mut account = write.account;
            account.version = write.expected_version + 1;
            self.accounts.insert(account.user_id, account);
        }

        for new_tx in batch.transactions {
            self.next_tx_id += 1;
            let tx = new_tx.into_transaction(self.next_tx_id);
            if let Some(key) = &tx.idempotency_key {
                if let Entry::Vacant(e) = self.idempotency.entry(key.clone()) {
                    e.insert(tx.id);
                }
            }
            self.by_user.entry(tx.user_id).or_default().push(tx.id);
            self.ledger.insert(tx.id, tx.clone());
            receipt.transactions.push(tx);
        }

        for id in batch.complete_pending {
            if let Some(tx) = self.ledger.get_mut(&id) {
                tx.status = TransactionStatus::Completed;
            }
        }

        for write in batch.holds {
            match write {
                HoldWrite::Place {
                    user_id,
                    amount,
                    at,
                } => {
                    self.next_hold_id += 1;
                    let hold = Hold {
                        id: self.next_hold_id,
                        user_id,
                        amount,
                        status: HoldStatus::Active,
                        created_at: at,
                    };
                    self.holds.insert(hold.id, hold.clone());
                    receipt.holds.push(hold);
                }
                HoldWrite::Release(id) => self.set_hold_status(id, HoldStatus::Released),
                HoldWrite::Settle(id) => self.set_hold_status(id, HoldStatus::Settled),
            }
        }

        receipt
    }

    fn set_hold_status(&mut self, id: HoldId, status: HoldStatus) {
        if let Some(hold) = self.holds.get_mut(&id) {
            hold.status = status;
        }
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn account(&self, user_id: UserId) -> Option<Account> {
        self.state.lock().accounts.get(&user_id).cloned()
    }

    fn accounts(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self.state.lock().accounts.values().cloned().collect();
        accounts.sort_by_key(|a| a.user_id);
        accounts
    }

    fn commit(&self, batch: LedgerBatch) -> Result<CommitReceipt> {
        let mut state = self.state.lock();
        state.check(&batch)?;
        Ok(state.apply(batch))
    }

    fn transaction(&self, id: TransactionId) -> Option<Transaction> {
        self.state.lock().ledger.get(&id).cloned()
    }

    fn history(&self, user_id: UserId, limit: usize) -> Vec<Transaction> {
        let state = self.state.lock();
        let mut txs: Vec<Transaction> = state
            .by_user
            .get(&user_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.ledger.get(id).cloned())
            .collect();
        txs.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        txs.truncate(limit);
        txs
    }

    fn pending_credits(&self, user_id: UserId, kind: TransactionType) -> Vec<Transaction> {
        let state = self.state.lock();
        state
            .by_user
            .get(&user_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.ledger.get(id))
            .filter(|tx| tx.kind == kind && tx.status == TransactionStatus::Pending)
            .cloned()
            .collect()
    }

    fn hold(&self, id: HoldId) -> Option<Hold> {
        self.state.lock().holds.get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::{Direction, NewTransaction};

    fn purchase(user_id: UserId, coins: i64, key: &str, balance_after: i64) -> NewTransaction {
        NewTransaction {
            user_id,
            kind: TransactionType::Purchase,
            direction: Direction::Credit,
            amount_coins: coins,
            amount_inr: None,
            related_entity_id: None,
            status: TransactionStatus::Completed,
            idempotency_key: Some(key.to_string()),
            note: None,
            balance_after,
            created_at: Utc::now(),
        }
    }

    fn funded(user_id: UserId, balance: i64) -> Account {
        Account {
            balance,
            ..Account::new(user_id)
        }
    }

    #[test]
    fn commit_bumps_version_and_assigns_ids() {
        let store = InMemoryLedgerStore::new();
        let receipt = store
            .commit(
                LedgerBatch::default()
                    .write(0, funded(1, 100))
                    .append(purchase(1, 100, "pay-1", 100)),
            )
            .unwrap();

        assert_eq!(receipt.transactions[0].id, 1);
        assert_eq!(store.account(1).unwrap().version, 1);
        assert_eq!(store.history(1, 10).len(), 1);
    }

    #[test]
    fn stale_version_leaves_state_untouched() {
        let store = InMemoryLedgerStore::new();
        store
            .commit(LedgerBatch::default().write(0, funded(1, 100)))
            .unwrap();

        let err = store
            .commit(
                LedgerBatch::default()
                    .write(0, funded(1, 500))
                    .append(purchase(1, 400, "pay-2", 500)),
            )
            .unwrap_err();

        assert!(matches!(err, Error::VersionConflict(1)));
        assert_eq!(store.account(1).unwrap().balance, 100);
        assert!(store.history(1, 10).is_empty());
    }

    #[test]
    fn duplicate_idempotency_key_is_rejected() {
        let store = InMemoryLedgerStore::new();
        store
            .commit(
                LedgerBatch::default()
                    .write(0, funded(1, 100))
                    .append(purchase(1, 100, "pay-1", 100)),
            )
            .unwrap();

        let err = store
            .commit(
                LedgerBatch::default()
                    .write(1, funded(1, 200))
                    .append(purchase(1, 100, "pay-1", 200)),
            )
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateTransaction(k) if k == "pay-1"));
        assert_eq!(store.account(1).unwrap().balance, 100);
    }

    #[test]
    fn hold_cannot_be_released_twice() {
        let store = InMemoryLedgerStore::new();
        let receipt = store
            .commit(LedgerBatch::default().hold(HoldWrite::Place {
                user_id: 1,
                amount: 10,
                at: Utc::now(),
            }))
            .unwrap();
        let id = receipt.holds[0].id;

        store
            .commit(LedgerBatch::default().hold(HoldWrite::Release(id)))
            .unwrap();
        assert!(matches!(
            store.commit(LedgerBatch::default().hold(HoldWrite::Settle(id))),
            Err(Error::HoldNotActive(_))
        ));
        assert_eq!(store.hold(id).unwrap().status, HoldStatus::Released);
    }
}
