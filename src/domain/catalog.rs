use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{Coins, Error, Inr, Result};

/// Member badge tier. Client strings are parsed into this at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Basic,
    Silver,
    Gold,
    Platinum,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Basic => "basic",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
            Tier::Platinum => "platinum",
        }
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Tier::Basic),
            "silver" => Ok(Tier::Silver),
            "gold" => Ok(Tier::Gold),
            "platinum" => Ok(Tier::Platinum),
            other => Err(Error::UnknownTier(other.to_string())),
        }
    }
}

impl core::fmt::Display for Tier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinPlan {
    pub id: String,
    pub tier: Tier,
    #[serde(rename = "priceInINR")]
    pub price_in_inr: Inr,
    pub base_coins: Coins,
    pub bonus_coins: Coins,
    pub total_coins: Coins,
    pub is_active: bool,
    pub display_order: u32,
}

impl CoinPlan {
    pub fn validate(&self) -> Result<()> {
        require_id("plan", &self.id)?;
        if !self.price_in_inr.is_positive() {
            return Err(Error::Validation(format!(
                "plan {} must have a positive price",
                self.id
            )));
        }
        if self.base_coins <= 0 || self.bonus_coins < 0 {
            return Err(Error::Validation(format!(
                "plan {} needs positive base coins and non-negative bonus coins",
                self.id
            )));
        }
        let expected = self
            .base_coins
            .checked_add(self.bonus_coins)
            .ok_or_else(|| Error::Validation(format!("plan {} coin total overflows", self.id)))?;
        if self.total_coins != expected {
            return Err(Error::Validation(format!(
                "plan {} total {} != base {} + bonus {}",
                self.id, self.total_coins, self.base_coins, self.bonus_coins
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutSlab {
    pub id: String,
    pub min_coins: Coins,
    /// `None` means the slab is unbounded above.
    pub max_coins: Option<Coins>,
    pub payout_percentage: Decimal,
    pub display_order: u32,
}

impl PayoutSlab {
    pub fn matches(&self, coins: Coins) -> bool {
        self.min_coins <= coins && self.max_coins.is_none_or(|max| coins <= max)
    }

    /// Checks the slab in isolation; set-level checks live in the resolver.
    pub fn validate(&self) -> Result<()> {
        require_id("slab", &self.id)?;
        if self.min_coins < 0 {
            return Err(Error::Validation(format!(
                "slab {} starts below zero",
                self.id
            )));
        }
        if let Some(max) = self.max_coins {
            if max < self.min_coins {
                return Err(Error::Validation(format!(
                    "slab {} has max {} below min {}",
                    self.id, max, self.min_coins
                )));
            }
        }
        if self.payout_percentage < Decimal::ZERO || self.payout_percentage > Decimal::ONE_HUNDRED
        {
            return Err(Error::Validation(format!(
                "slab {} percentage {} outside 0..=100",
                self.id, self.payout_percentage
            )));
        }
        Ok(())
    }
}

impl core::fmt::Display for PayoutSlab {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.max_coins {
            Some(max) => write!(f, "{}[{}, {}]", self.id, self.min_coins, max),
            None => write!(f, "{}[{}, inf)", self.id, self.min_coins),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageCosts {
    pub per_tier: BTreeMap<Tier, Coins>,
    pub video_call: Coins,
    /// Share of a paid message credited to the recipient.
    pub earning_percentage: Decimal,
}

impl MessageCosts {
    pub fn cost_for(&self, tier: Tier) -> Result<Coins> {
        self.per_tier
            .get(&tier)
            .copied()
            .ok_or_else(|| Error::UnknownTier(tier.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if let Some((tier, cost)) = self.per_tier.iter().find(|(_, cost)| **cost <= 0) {
            return Err(Error::Validation(format!(
                "message cost for {} must be positive, got {}",
                tier, cost
            )));
        }
        if self.video_call <= 0 {
            return Err(Error::Validation(
                "video call cost must be positive".to_string(),
            ));
        }
        if self.earning_percentage < Decimal::ZERO || self.earning_percentage > Decimal::ONE_HUNDRED
        {
            return Err(Error::Validation(format!(
                "earning percentage {} outside 0..=100",
                self.earning_percentage
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gift {
    pub id: String,
    pub name: String,
    pub cost: Coins,
    pub trade_value: Coins,
    pub is_active: bool,
}

impl Gift {
    pub fn validate(&self) -> Result<()> {
        require_id("gift", &self.id)?;
        if self.cost <= 0 || self.trade_value <= 0 {
            return Err(Error::Validation(format!(
                "gift {} needs a positive cost and trade value",
                self.id
            )));
        }
        if self.trade_value > self.cost {
            return Err(Error::Validation(format!(
                "gift {} trades for more than it costs",
                self.id
            )));
        }
        Ok(())
    }
}

fn require_id(what: &str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::Validation(format!("{} id must not be empty", what)));
    }
    Ok(())
}
