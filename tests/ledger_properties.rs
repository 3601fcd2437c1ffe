/// Property-based tests for the ledger: whatever sequence of operations runs,
/// balances stay non-negative and every coin is accounted for.
use std::sync::Arc;

use coin_ledger::clock::SystemClock;
use coin_ledger::config::RetryPolicy;
use coin_ledger::domain::{HoldToken, TransactionType};
use coin_ledger::store::InMemoryLedgerStore;
use coin_ledger::transaction_engine::{CreditMode, Posting, TransactionEngine};
use proptest::prelude::*;

const USERS: i64 = 3;

#[derive(Debug, Clone)]
enum Op {
    Credit(i64, i64),
    Debit(i64, i64),
    Transfer(i64, i64, i64),
    Gift(i64, i64, i64),
    TradeGifts(i64),
    Hold(i64, i64),
    Release(usize),
    Settle(usize),
}

fn user() -> impl Strategy<Value = i64> {
    1..=USERS
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (user(), 1i64..500).prop_map(|(u, a)| Op::Credit(u, a)),
        (user(), 1i64..500).prop_map(|(u, a)| Op::Debit(u, a)),
        (user(), user(), 1i64..300).prop_map(|(f, t, a)| Op::Transfer(f, t, a)),
        (user(), user(), 1i64..300).prop_map(|(f, t, a)| Op::Gift(f, t, a)),
        user().prop_map(Op::TradeGifts),
        (user(), 1i64..400).prop_map(|(u, a)| Op::Hold(u, a)),
        (0usize..8).prop_map(Op::Release),
        (0usize..8).prop_map(Op::Settle),
    ]
}

fn engine() -> TransactionEngine {
    TransactionEngine::new(
        Arc::new(InMemoryLedgerStore::new()),
        Arc::new(SystemClock),
        RetryPolicy::default(),
    )
}

/// Applies `ops` and returns coins minted minus coins that left the ledger.
async fn run(engine: &TransactionEngine, ops: Vec<Op>) -> i64 {
    let mut expected = 0;
    let mut holds: Vec<HoldToken> = Vec::new();
    for op in ops {
        match op {
            Op::Credit(u, a) => {
                if engine
                    .credit(u, a, TransactionType::Purchase, None)
                    .await
                    .is_ok()
                {
                    expected += a;
                }
            }
            Op::Debit(u, a) => {
                if engine
                    .debit(u, a, TransactionType::MessageSpent, None)
                    .await
                    .is_ok()
                {
                    expected -= a;
                }
            }
            Op::Transfer(f, t, a) => {
                let _ = engine
                    .transfer(
                        Posting::new(f, TransactionType::MessageSpent, a),
                        Posting::new(t, TransactionType::MessageEarned, a),
                        CreditMode::Immediate,
                    )
                    .await;
            }
            Op::Gift(f, t, a) => {
                // Only half the gift cost reaches the recipient.
                let value = a / 2 + 1;
                if engine
                    .transfer(
                        Posting::new(f, TransactionType::GiftSent, a),
                        Posting::new(t, TransactionType::GiftReceived, value),
                        CreditMode::PendingTrade,
                    )
                    .await
                    .is_ok()
                {
                    expected += value - a;
                }
            }
            Op::TradeGifts(u) => {
                for tx in engine.pending_gift_credits(u) {
                    engine.complete_pending_credit(u, tx.id).await.unwrap();
                }
            }
            Op::Hold(u, a) => {
                if let Ok(token) = engine.hold(u, a).await {
                    holds.push(token);
                }
            }
            Op::Release(i) => {
                if i < holds.len() {
                    let token = holds.remove(i);
                    engine.release_hold(&token).await.unwrap();
                }
            }
            Op::Settle(i) => {
                if i < holds.len() {
                    let token = holds.remove(i);
                    engine.settle_hold(&token, None, None).await.unwrap();
                    expected -= token.amount;
                }
            }
        }
    }
    expected
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #[test]
    fn balances_stay_non_negative_and_coins_are_conserved(
        ops in prop::collection::vec(op_strategy(), 1..60)
    ) {
        let engine = engine();
        let expected = block_on(run(&engine, ops));

        let mut total = 0;
        for user_id in 1..=USERS {
            let account = engine.account(user_id);
            prop_assert!(account.balance >= 0, "negative balance: {:?}", account);
            prop_assert!(account.held_amount >= 0, "negative hold: {:?}", account);
            prop_assert!(account.pending_gifts >= 0, "negative pending: {:?}", account);
            total += account.balance + account.held_amount + account.pending_gifts;
        }
        prop_assert_eq!(total, expected);
    }

    #[test]
    fn debit_then_credit_restores_balance(start in 1i64..10_000, spend in 1i64..10_000) {
        let engine = engine();
        let (before, after) = block_on(async {
            engine.credit(1, start, TransactionType::Purchase, None).await.unwrap();
            let before = engine.account(1).balance;
            if engine.debit(1, spend, TransactionType::MessageSpent, None).await.is_ok() {
                engine.credit(1, spend, TransactionType::Adjustment, None).await.unwrap();
            }
            (before, engine.account(1).balance)
        });
        prop_assert_eq!(before, after);
    }

    #[test]
    fn failed_operations_leave_no_trace(start in 0i64..100, spend in 101i64..1_000) {
        let engine = engine();
        let (account, history) = block_on(async {
            if start > 0 {
                engine.credit(1, start, TransactionType::Purchase, None).await.unwrap();
            }
            let before = engine.account(1);
            prop_assert!(engine.debit(1, spend, TransactionType::MessageSpent, None).await.is_err());
            prop_assert!(engine.hold(1, spend).await.is_err());
            prop_assert_eq!(engine.account(1), before.clone());
            Ok((before, engine.history(1, 100)))
        })?;
        prop_assert_eq!(account.balance, start);
        prop_assert_eq!(history.len(), usize::from(start > 0));
    }
}
