use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Coins, HoldId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoldStatus {
    Active,
    Released,
    Settled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hold {
    pub id: HoldId,
    pub user_id: UserId,
    pub amount: Coins,
    pub status: HoldStatus,
    pub created_at: DateTime<Utc>,
}

impl Hold {
    pub fn token(&self) -> HoldToken {
        HoldToken {
            hold_id: self.id,
            user_id: self.user_id,
            amount: self.amount,
        }
    }
}

/// Handle given to the caller that reserved the coins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldToken {
    pub hold_id: HoldId,
    pub user_id: UserId,
    pub amount: Coins,
}
