//! Entry points the API gateway calls: purchases, paid messages, gifts,
//! withdrawals and admin corrections.

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::catalog::{CatalogSeed, PricingCatalog};
use crate::clock::{Clock, SystemClock};
use crate::config::LedgerConfig;
use crate::domain::{
    Account, Actor, AdminId, AuditAction, AuditLog, Coins, Direction, Error, NewAuditEntry,
    PayoutDetails, Result, Tier, Transaction, TransactionId, TransactionType, UserId,
    WithdrawalId, WithdrawalRequest,
};
use crate::store::{
    InMemoryAuditLog, InMemoryCatalogStore, InMemoryLedgerStore, InMemoryWithdrawalStore,
};
use crate::transaction_engine::{CreditMode, Posting, TransactionEngine};
use crate::withdrawal::WithdrawalWorkflow;

/// What a paid message or call cost the sender and earned the recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Charge {
    pub spent: Transaction,
    pub earned: Option<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiftDelivery {
    pub sent: Transaction,
    pub received: Transaction,
}

pub struct CoinEconomy {
    engine: Arc<TransactionEngine>,
    catalog: Arc<PricingCatalog>,
    withdrawals: WithdrawalWorkflow,
    audit: Arc<dyn AuditLog>,
    clock: Arc<dyn Clock>,
}

impl CoinEconomy {
    pub fn new(
        engine: Arc<TransactionEngine>,
        catalog: Arc<PricingCatalog>,
        withdrawals: WithdrawalWorkflow,
        audit: Arc<dyn AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            engine,
            catalog,
            withdrawals,
            audit,
            clock,
        }
    }

    /// Wires the in-memory stores together.
    pub fn in_memory(config: &LedgerConfig, seed: CatalogSeed) -> Result<Self> {
        Self::in_memory_with_clock(config, seed, Arc::new(SystemClock))
    }

    pub fn in_memory_with_clock(
        config: &LedgerConfig,
        seed: CatalogSeed,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;
        PricingCatalog::validate_seed(&seed)?;

        let audit: Arc<dyn AuditLog> = Arc::new(InMemoryAuditLog::new());
        let engine = Arc::new(TransactionEngine::new(
            Arc::new(InMemoryLedgerStore::new()),
            clock.clone(),
            config.retry,
        ));
        let catalog = Arc::new(PricingCatalog::new(
            Arc::new(InMemoryCatalogStore::new(seed)),
            audit.clone(),
            clock.clone(),
            config.catalog_cache_ttl,
        ));
        let withdrawals = WithdrawalWorkflow::new(
            engine.clone(),
            catalog.clone(),
            Arc::new(InMemoryWithdrawalStore::new()),
            audit.clone(),
            clock.clone(),
            config.withdrawals,
            config.retry,
        );
        Ok(Self::new(engine, catalog, withdrawals, audit, clock))
    }

    pub fn engine(&self) -> &TransactionEngine {
        &self.engine
    }

    pub fn catalog(&self) -> &PricingCatalog {
        &self.catalog
    }

    pub fn withdrawals(&self) -> &WithdrawalWorkflow {
        &self.withdrawals
    }

    pub fn audit(&self) -> &dyn AuditLog {
        self.audit.as_ref()
    }

    pub fn account(&self, user_id: UserId) -> Account {
        self.engine.account(user_id)
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.engine.accounts()
    }

    pub fn history(&self, user_id: UserId, limit: usize) -> Vec<Transaction> {
        self.engine.history(user_id, limit)
    }

    /// Credits a plan's coins once the payment gateway has captured the money.
    /// Replaying the same `payment_reference` fails with `DuplicateTransaction`.
    pub async fn purchase_coins(
        &self,
        user_id: UserId,
        plan_id: &str,
        payment_reference: &str,
    ) -> Result<Transaction> {
        if payment_reference.trim().is_empty() {
            return Err(Error::Validation(
                "payment reference is required".to_string(),
            ));
        }
        let plan = self.catalog.get_active_plan(plan_id).await?;
        let posting = Posting::new(user_id, TransactionType::Purchase, plan.total_coins)
            .inr(plan.price_in_inr)
            .related(format!("plan:{}", plan.id))
            .idempotency_key(format!("purchase:{}", payment_reference.trim()));
        self.engine.post_credit(posting).await
    }

    /// Charges the sender before the chat layer may acknowledge the message.
    pub async fn send_paid_message(
        &self,
        sender: UserId,
        recipient: UserId,
        recipient_tier: Tier,
        chat_id: &str,
    ) -> Result<Charge> {
        let cost = self.catalog.get_message_cost(recipient_tier)?;
        self.charge(
            sender,
            recipient,
            cost,
            format!("chat:{}", chat_id),
        )
        .await
    }

    pub async fn charge_video_call(
        &self,
        caller: UserId,
        callee: UserId,
        call_id: &str,
    ) -> Result<Charge> {
        let cost = self.catalog.get_video_call_cost();
        self.charge(caller, callee, cost, format!("call:{}", call_id))
            .await
    }

    async fn charge(
        &self,
        payer: UserId,
        payee: UserId,
        cost: Coins,
        related: String,
    ) -> Result<Charge> {
        if payer == payee {
            return Err(Error::Validation(format!(
                "user {} cannot charge themselves",
                payer
            )));
        }
        let earning = share_of(cost, self.catalog.get_message_costs().earning_percentage);
        let spent = Posting::new(payer, TransactionType::MessageSpent, cost).related(&related);
        if earning <= 0 {
            let spent = self.engine.post_debit(spent).await?;
            return Ok(Charge {
                spent,
                earned: None,
            });
        }

        let earned = Posting::new(payee, TransactionType::MessageEarned, earning).related(related);
        let (spent, earned) = self
            .engine
            .transfer(spent, earned, CreditMode::Immediate)
            .await?;
        Ok(Charge {
            spent,
            earned: Some(earned),
        })
    }

    /// Sender pays the gift cost; the recipient gets its trade value as a pending credit.
    pub async fn send_gift(
        &self,
        sender: UserId,
        recipient: UserId,
        gift_id: &str,
    ) -> Result<GiftDelivery> {
        let gift = self.catalog.get_gift(gift_id)?;
        let related = format!("gift:{}", gift.id);
        let (sent, received) = self
            .engine
            .transfer(
                Posting::new(sender, TransactionType::GiftSent, gift.cost).related(&related),
                Posting::new(recipient, TransactionType::GiftReceived, gift.trade_value)
                    .related(related),
                CreditMode::PendingTrade,
            )
            .await?;
        Ok(GiftDelivery { sent, received })
    }

    pub async fn trade_gift(&self, user_id: UserId, tx_id: TransactionId) -> Result<Transaction> {
        self.engine.complete_pending_credit(user_id, tx_id).await
    }

    /// Trades every pending gift of `user_id`, oldest first.
    pub async fn trade_all_gifts(&self, user_id: UserId) -> Result<Vec<Transaction>> {
        let mut pending = self.engine.pending_gift_credits(user_id);
        pending.sort_by_key(|tx| tx.id);
        let mut traded = Vec::with_capacity(pending.len());
        for tx in pending {
            traded.push(self.engine.complete_pending_credit(user_id, tx.id).await?);
        }
        Ok(traded)
    }

    pub async fn request_withdrawal(
        &self,
        user_id: UserId,
        coins: Coins,
        payout: PayoutDetails,
    ) -> Result<WithdrawalRequest> {
        self.withdrawals.create(user_id, coins, payout).await
    }

    pub async fn approve_withdrawal(
        &self,
        id: WithdrawalId,
        admin_id: AdminId,
    ) -> Result<WithdrawalRequest> {
        self.withdrawals.approve(id, admin_id).await
    }

    pub async fn reject_withdrawal(
        &self,
        id: WithdrawalId,
        admin_id: AdminId,
        reason: &str,
    ) -> Result<WithdrawalRequest> {
        self.withdrawals.reject(id, admin_id, reason).await
    }

    pub async fn mark_withdrawal_paid(
        &self,
        id: WithdrawalId,
        admin_id: AdminId,
    ) -> Result<WithdrawalRequest> {
        self.withdrawals.mark_paid(id, admin_id).await
    }

    /// Signed admin correction: positive credits, negative debits.
    pub async fn adjust_balance(
        &self,
        admin_id: AdminId,
        user_id: UserId,
        amount: Coins,
        note: &str,
    ) -> Result<Transaction> {
        if note.trim().is_empty() {
            return Err(Error::Validation(
                "adjustments need a note".to_string(),
            ));
        }
        let direction = if amount < 0 {
            Direction::Debit
        } else {
            Direction::Credit
        };
        let magnitude = amount.checked_abs().ok_or(Error::InvalidAmount(amount))?;
        let tx = self
            .engine
            .adjust(user_id, direction, magnitude, format!("admin {}: {}", admin_id, note.trim()))
            .await?;

        self.audit.append(NewAuditEntry {
            actor: Actor::Admin(admin_id),
            action: AuditAction::BalanceAdjusted,
            target: format!("account:{}", user_id),
            detail: Some(format!("{:?} {} coins, tx {}", direction, magnitude, tx.id)),
            at: self.clock.now(),
        })?;
        Ok(tx)
    }
}

/// `floor(cost * percentage / 100)`.
fn share_of(cost: Coins, percentage: Decimal) -> Coins {
    (Decimal::from(cost) * percentage / Decimal::ONE_HUNDRED)
        .floor()
        .to_i64()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earning_share_rounds_down() {
        assert_eq!(share_of(25, Decimal::from(50)), 12);
        assert_eq!(share_of(20, Decimal::from(50)), 10);
        assert_eq!(share_of(20, Decimal::ZERO), 0);
    }
}
