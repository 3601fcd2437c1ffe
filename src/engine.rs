use std::sync::Arc;

use futures::StreamExt;

use crate::domain::{
    Error,
    traits::{CommandStream, DeadLetterQueue},
};
use crate::economy::CoinEconomy;
use crate::ingestion::Command;

/// Counts of what a journal run did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub applied: usize,
    pub rejected: usize,
}

/// Drains a command stream into the economy, one command at a time.
/// Failed commands go to the dead-letter queue and processing continues.
pub struct Engine<I, D>
where
    I: CommandStream,
    D: DeadLetterQueue,
{
    ingestion: I,
    economy: Arc<CoinEconomy>,
    dlq: D,
}

impl<I, D> Engine<I, D>
where
    I: CommandStream,
    D: DeadLetterQueue,
{
    pub fn new(ingestion: I, economy: Arc<CoinEconomy>, dlq: D) -> Self {
        Self {
            ingestion,
            economy,
            dlq,
        }
    }

    pub async fn process(&mut self) -> Result<RunSummary, Error> {
        let mut res = self.ingestion.stream();
        let mut summary = RunSummary::default();

        while let Some(cmd) = res.next().await {
            let outcome = match cmd {
                Ok(cmd) => self.apply(cmd).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(()) => summary.applied += 1,
                Err(e) => {
                    summary.rejected += 1;
                    self.dlq.report(&e);
                }
            }
        }

        tracing::info!(
            applied = summary.applied,
            rejected = summary.rejected,
            "journal processed"
        );
        Ok(summary)
    }

    async fn apply(&self, cmd: Command) -> Result<(), Error> {
        let economy = &self.economy;
        match cmd {
            Command::Purchase {
                user_id,
                plan_id,
                payment_reference,
            } => {
                economy
                    .purchase_coins(user_id, &plan_id, &payment_reference)
                    .await?;
            }
            Command::SendMessage {
                sender,
                recipient,
                recipient_tier,
                chat_id,
            } => {
                economy
                    .send_paid_message(sender, recipient, recipient_tier, &chat_id)
                    .await?;
            }
            Command::VideoCall {
                caller,
                callee,
                call_id,
            } => {
                economy.charge_video_call(caller, callee, &call_id).await?;
            }
            Command::SendGift {
                sender,
                recipient,
                gift_id,
            } => {
                economy.send_gift(sender, recipient, &gift_id).await?;
            }
            Command::TradeGift { user_id, tx_id } => {
                economy.trade_gift(user_id, tx_id).await?;
            }
            Command::TradeAllGifts { user_id } => {
                economy.trade_all_gifts(user_id).await?;
            }
            Command::RequestWithdrawal {
                user_id,
                coins,
                payout,
            } => {
                economy.request_withdrawal(user_id, coins, payout).await?;
            }
            Command::Approve {
                admin_id,
                withdrawal_id,
            } => {
                economy.approve_withdrawal(withdrawal_id, admin_id).await?;
            }
            Command::Reject {
                admin_id,
                withdrawal_id,
                reason,
            } => {
                economy
                    .reject_withdrawal(withdrawal_id, admin_id, &reason)
                    .await?;
            }
            Command::MarkPaid {
                admin_id,
                withdrawal_id,
            } => {
                economy
                    .mark_withdrawal_paid(withdrawal_id, admin_id)
                    .await?;
            }
            Command::Adjust {
                admin_id,
                user_id,
                amount,
                note,
            } => {
                economy
                    .adjust_balance(admin_id, user_id, amount, &note)
                    .await?;
            }
        }
        Ok(())
    }

    pub fn economy(&self) -> &Arc<CoinEconomy> {
        &self.economy
    }
}
