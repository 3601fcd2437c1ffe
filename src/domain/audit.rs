use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AdminId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Actor {
    User(UserId),
    Admin(AdminId),
}

impl core::fmt::Display for Actor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Actor::User(id) => write!(f, "user:{}", id),
            Actor::Admin(id) => write!(f, "admin:{}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    WithdrawalRequested,
    WithdrawalApproved,
    WithdrawalRejected,
    WithdrawalPaid,
    BalanceAdjusted,
    PlanSaved,
    PlanDeleted,
    SlabsChanged,
    MessageCostsChanged,
    GiftSaved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub actor: Actor,
    pub action: AuditAction,
    /// e.g. `withdrawal:12`, `account:7`, `slab:mid`
    pub target: String,
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub actor: Actor,
    pub action: AuditAction,
    pub target: String,
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}
