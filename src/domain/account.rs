use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Coins, Error, Result, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: UserId,
    pub balance: Coins,       // spendable and withdrawable coins
    pub held_amount: Coins,   // coins reserved by pending withdrawals
    pub pending_gifts: Coins, // gift value received but not yet traded
    pub version: u64,         // bumped by the store on every committed write
    pub updated_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            balance: 0,
            held_amount: 0,
            pending_gifts: 0,
            version: 0,
            updated_at: None,
        }
    }

    pub fn credit(&mut self, amount: Coins) -> Result<()> {
        self.balance = add(self.balance, amount)?;
        Ok(())
    }

    pub fn debit(&mut self, amount: Coins) -> Result<()> {
        self.ensure_available(amount)?;
        self.balance -= amount;
        Ok(())
    }

    pub fn place_hold(&mut self, amount: Coins) -> Result<()> {
        self.ensure_available(amount)?;
        self.balance -= amount;
        self.held_amount = add(self.held_amount, amount)?;
        Ok(())
    }

    pub fn release_hold(&mut self, amount: Coins) -> Result<()> {
        self.take_held(amount)?;
        self.balance = add(self.balance, amount)?;
        Ok(())
    }

    pub fn settle_hold(&mut self, amount: Coins) -> Result<()> {
        self.take_held(amount)
    }

    pub fn receive_gift(&mut self, value: Coins) -> Result<()> {
        self.pending_gifts = add(self.pending_gifts, value)?;
        Ok(())
    }

    pub fn trade_gift(&mut self, value: Coins) -> Result<()> {
        if self.pending_gifts < value {
            return Err(Error::Validation(format!(
                "user {} has only {} coins of untraded gifts",
                self.user_id, self.pending_gifts
            )));
        }
        self.pending_gifts -= value;
        self.balance = add(self.balance, value)?;
        Ok(())
    }

    fn ensure_available(&self, amount: Coins) -> Result<()> {
        if self.balance < amount {
            return Err(Error::InsufficientBalance {
                user_id: self.user_id,
                available: self.balance,
                required: amount,
            });
        }
        Ok(())
    }

    fn take_held(&mut self, amount: Coins) -> Result<()> {
        if self.held_amount < amount {
            return Err(Error::Validation(format!(
                "user {} holds {} coins, cannot release {}",
                self.user_id, self.held_amount, amount
            )));
        }
        self.held_amount -= amount;
        Ok(())
    }
}

fn add(current: Coins, amount: Coins) -> Result<Coins> {
    current
        .checked_add(amount)
        .ok_or_else(|| Error::Validation("coin balance overflow".to_string()))
}
