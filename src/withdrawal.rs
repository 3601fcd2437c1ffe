//! Withdrawal requests: `pending -> approved -> paid` or `pending -> rejected`.
//!
//! Coins are held when a request is created, released on rejection and
//! settled on payout. Every transition lands in the audit log.

use std::sync::Arc;

use chrono::Duration as Window;

use crate::catalog::PricingCatalog;
use crate::clock::Clock;
use crate::config::{RetryPolicy, WithdrawalLimits};
use crate::domain::{
    Actor, AdminId, AuditAction, AuditLog, Coins, Error, HoldToken, NewAuditEntry,
    NewWithdrawal, PayoutDetails, Result, UserId, WithdrawalId, WithdrawalRequest,
    WithdrawalStatus, WithdrawalStore, payout_amount,
};
use crate::locks::{KeyGuard, KeyedLocks};
use crate::transaction_engine::TransactionEngine;

pub struct WithdrawalWorkflow {
    engine: Arc<TransactionEngine>,
    catalog: Arc<PricingCatalog>,
    store: Arc<dyn WithdrawalStore>,
    audit: Arc<dyn AuditLog>,
    clock: Arc<dyn Clock>,
    limits: WithdrawalLimits,
    retry: RetryPolicy,
    user_locks: KeyedLocks<UserId>,
    request_locks: KeyedLocks<WithdrawalId>,
}

impl WithdrawalWorkflow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: Arc<TransactionEngine>,
        catalog: Arc<PricingCatalog>,
        store: Arc<dyn WithdrawalStore>,
        audit: Arc<dyn AuditLog>,
        clock: Arc<dyn Clock>,
        limits: WithdrawalLimits,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            engine,
            catalog,
            store,
            audit,
            clock,
            limits,
            retry,
            user_locks: KeyedLocks::new(),
            request_locks: KeyedLocks::new(),
        }
    }

    /// Creates a `pending` request and holds the coins.
    ///
    /// # Errors
    ///
    /// * `Error::Validation` - malformed payout details
    /// * `Error::BelowMinimum` / `Error::AboveMaximum` - outside per-request bounds
    /// * `Error::InsufficientBalance` - more than the available balance
    /// * `Error::LimitExceeded` - daily or weekly cap reached
    /// * `Error::NoMatchingSlab` - payout slabs misconfigured
    pub async fn create(
        &self,
        user_id: UserId,
        coins_requested: Coins,
        payout_details: PayoutDetails,
    ) -> Result<WithdrawalRequest> {
        payout_details.validate()?;
        if coins_requested < self.limits.min_coins {
            return Err(Error::BelowMinimum {
                requested: coins_requested,
                minimum: self.limits.min_coins,
            });
        }
        if coins_requested > self.limits.max_coins {
            return Err(Error::AboveMaximum {
                requested: coins_requested,
                maximum: self.limits.max_coins,
            });
        }

        let _guard = self
            .user_locks
            .acquire_with_retry(user_id, &self.retry)
            .await
            .ok_or(Error::ConcurrencyConflict(user_id))?;

        let available = self.engine.account(user_id).balance;
        if coins_requested > available {
            return Err(Error::InsufficientBalance {
                user_id,
                available,
                required: coins_requested,
            });
        }

        let now = self.clock.now();
        self.check_window(
            user_id,
            coins_requested,
            "daily",
            Window::hours(24),
            self.limits.daily_limit_coins,
        )?;
        self.check_window(
            user_id,
            coins_requested,
            "weekly",
            Window::days(7),
            self.limits.weekly_limit_coins,
        )?;

        let payout_percentage = self.catalog.resolve_payout(coins_requested).await?;
        let payout_amount_inr = payout_amount(coins_requested, payout_percentage)?;

        let token = self.engine.hold(user_id, coins_requested).await?;
        let request = self.store.insert(NewWithdrawal {
            user_id,
            coins_requested,
            payout_percentage,
            payout_amount_inr,
            payout_details,
            hold_id: token.hold_id,
            created_at: now,
        });

        self.record(
            Actor::User(user_id),
            AuditAction::WithdrawalRequested,
            &request,
            Some(format!(
                "{} coins at {}% = {} INR",
                coins_requested, payout_percentage, payout_amount_inr
            )),
        )?;
        tracing::info!(
            withdrawal_id = request.id,
            user_id,
            coins = coins_requested,
            payout = %payout_amount_inr,
            "withdrawal requested"
        );
        Ok(request)
    }

    /// `pending -> approved`. Coins stay held.
    pub async fn approve(&self, id: WithdrawalId, admin_id: AdminId) -> Result<WithdrawalRequest> {
        let _guard = self.lock_request(id).await?;
        let request = self.load_in(id, WithdrawalStatus::Pending, "approve")?;

        let mut updated = request.clone();
        updated.status = WithdrawalStatus::Approved;
        updated.reviewed_by = Some(admin_id);
        updated.reviewed_at = Some(self.clock.now());
        self.store.update(WithdrawalStatus::Pending, updated.clone())?;

        self.record(
            Actor::Admin(admin_id),
            AuditAction::WithdrawalApproved,
            &updated,
            None,
        )?;
        tracing::info!(withdrawal_id = id, admin_id, "withdrawal approved");
        Ok(updated)
    }

    /// `pending -> rejected`. The held coins go back to the user's balance.
    pub async fn reject(
        &self,
        id: WithdrawalId,
        admin_id: AdminId,
        reason: &str,
    ) -> Result<WithdrawalRequest> {
        if reason.trim().is_empty() {
            return Err(Error::Validation(
                "a rejection reason is required".to_string(),
            ));
        }
        let _guard = self.lock_request(id).await?;
        let request = self.load_in(id, WithdrawalStatus::Pending, "reject")?;

        self.engine.release_hold(&hold_token(&request)).await?;

        let mut updated = request;
        updated.status = WithdrawalStatus::Rejected;
        updated.reviewed_by = Some(admin_id);
        updated.reviewed_at = Some(self.clock.now());
        updated.review_notes = Some(reason.trim().to_string());
        self.store.update(WithdrawalStatus::Pending, updated.clone())?;

        self.record(
            Actor::Admin(admin_id),
            AuditAction::WithdrawalRejected,
            &updated,
            updated.review_notes.clone(),
        )?;
        tracing::info!(withdrawal_id = id, admin_id, "withdrawal rejected");
        Ok(updated)
    }

    /// `approved -> paid`. The held coins leave the ledger as a `withdrawal` debit.
    pub async fn mark_paid(
        &self,
        id: WithdrawalId,
        admin_id: AdminId,
    ) -> Result<WithdrawalRequest> {
        let _guard = self.lock_request(id).await?;
        let request = self.load_in(id, WithdrawalStatus::Approved, "pay")?;

        let tx = self
            .engine
            .settle_hold(
                &hold_token(&request),
                Some(request.payout_amount_inr),
                Some(format!("withdrawal:{}", id)),
            )
            .await?;

        let mut updated = request;
        updated.status = WithdrawalStatus::Paid;
        updated.paid_at = Some(self.clock.now());
        self.store.update(WithdrawalStatus::Approved, updated.clone())?;

        self.record(
            Actor::Admin(admin_id),
            AuditAction::WithdrawalPaid,
            &updated,
            Some(format!("transaction {}", tx.id)),
        )?;
        tracing::info!(withdrawal_id = id, admin_id, tx_id = tx.id, "withdrawal paid");
        Ok(updated)
    }

    pub fn get(&self, id: WithdrawalId) -> Result<WithdrawalRequest> {
        self.store.get(id).ok_or(Error::WithdrawalNotFound(id))
    }

    pub fn for_user(&self, user_id: UserId) -> Vec<WithdrawalRequest> {
        self.store.for_user(user_id)
    }

    pub fn with_status(&self, status: WithdrawalStatus) -> Vec<WithdrawalRequest> {
        self.store.with_status(status)
    }

    pub fn all(&self) -> Vec<WithdrawalRequest> {
        self.store.all()
    }

    fn check_window(
        &self,
        user_id: UserId,
        coins_requested: Coins,
        window: &'static str,
        span: Window,
        limit: Coins,
    ) -> Result<()> {
        let used: Coins = self
            .store
            .created_since(user_id, self.clock.now() - span)
            .iter()
            .filter(|w| w.status.counts_toward_limits())
            .map(|w| w.coins_requested)
            .sum();
        if used.saturating_add(coins_requested) > limit {
            return Err(Error::LimitExceeded {
                window,
                limit,
                used,
            });
        }
        Ok(())
    }

    async fn lock_request(&self, id: WithdrawalId) -> Result<KeyGuard<'_, WithdrawalId>> {
        let request = self.get(id)?;
        self.request_locks
            .acquire_with_retry(id, &self.retry)
            .await
            .ok_or(Error::ConcurrencyConflict(request.user_id))
    }

    fn load_in(
        &self,
        id: WithdrawalId,
        expected: WithdrawalStatus,
        action: &'static str,
    ) -> Result<WithdrawalRequest> {
        let request = self.get(id)?;
        if request.status != expected {
            if request.status.is_terminal() {
                tracing::warn!(
                    withdrawal_id = id,
                    status = %request.status,
                    action,
                    "withdrawal already closed"
                );
            }
            return Err(Error::InvalidTransition {
                id,
                from: request.status.to_string(),
                action,
            });
        }
        Ok(request)
    }

    fn record(
        &self,
        actor: Actor,
        action: AuditAction,
        request: &WithdrawalRequest,
        detail: Option<String>,
    ) -> Result<()> {
        self.audit.append(NewAuditEntry {
            actor,
            action,
            target: format!("withdrawal:{}", request.id),
            detail,
            at: self.clock.now(),
        })?;
        Ok(())
    }
}

fn hold_token(request: &WithdrawalRequest) -> HoldToken {
    HoldToken {
        hold_id: request.hold_id,
        user_id: request.user_id,
        amount: request.coins_requested,
    }
}
