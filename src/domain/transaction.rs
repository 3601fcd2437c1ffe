use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Coins, Inr, TransactionId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Purchase,
    MessageSpent,
    MessageEarned,
    GiftSent,
    GiftReceived,
    Withdrawal,
    Adjustment,
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            TransactionType::Purchase => "purchase",
            TransactionType::MessageSpent => "message_spent",
            TransactionType::MessageEarned => "message_earned",
            TransactionType::GiftSent => "gift_sent",
            TransactionType::GiftReceived => "gift_received",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Adjustment => "adjustment",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Credit,
    Debit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

/// Immutable ledger entry. Only a `Pending` entry may ever be promoted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub kind: TransactionType,
    pub direction: Direction,
    pub amount_coins: Coins,
    pub amount_inr: Option<Inr>,
    pub related_entity_id: Option<String>,
    pub status: TransactionStatus,
    pub idempotency_key: Option<String>,
    pub note: Option<String>,
    pub balance_after: Coins,
    pub created_at: DateTime<Utc>,
}

/// A ledger entry before the store assigns it an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub user_id: UserId,
    pub kind: TransactionType,
    pub direction: Direction,
    pub amount_coins: Coins,
    pub amount_inr: Option<Inr>,
    pub related_entity_id: Option<String>,
    pub status: TransactionStatus,
    pub idempotency_key: Option<String>,
    pub note: Option<String>,
    pub balance_after: Coins,
    pub created_at: DateTime<Utc>,
}

impl NewTransaction {
    pub fn into_transaction(self, id: TransactionId) -> Transaction {
        Transaction {
            id,
            user_id: self.user_id,
            kind: self.kind,
            direction: self.direction,
            amount_coins: self.amount_coins,
            amount_inr: self.amount_inr,
            related_entity_id: self.related_entity_id,
            status: self.status,
            idempotency_key: self.idempotency_key,
            note: self.note,
            balance_after: self.balance_after,
            created_at: self.created_at,
        }
    }
}

impl core::fmt::Display for Transaction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{},{:?},user={},tx={},coins={}",
            self.kind, self.direction, self.user_id, self.id, self.amount_coins
        )?;
        if let Some(inr) = self.amount_inr {
            write!(f, ",inr={}", inr)?;
        }
        Ok(())
    }
}
