use rust_decimal::Decimal;

use crate::domain::{Coins, Error, PayoutSlab, Result};

/// Validated, ordered slab set. Every non-negative coin amount maps to exactly one slab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutSlabResolver {
    slabs: Vec<PayoutSlab>,
}

impl PayoutSlabResolver {
    /// Sorts by `min_coins` and checks the set is contiguous over `[0, inf)`.
    ///
    /// # Errors
    ///
    /// * `Error::Validation` - a single slab is malformed
    /// * `Error::OverlappingSlabs` - two slabs claim the same amount
    /// * `Error::SlabGap` - some amount has no slab
    pub fn new(mut slabs: Vec<PayoutSlab>) -> Result<Self> {
        for slab in &slabs {
            slab.validate()?;
        }
        slabs.sort_by_key(|s| s.min_coins);

        let first = slabs
            .first()
            .ok_or_else(|| Error::SlabGap("no slabs configured".to_string()))?;
        if first.min_coins != 0 {
            return Err(Error::SlabGap(format!(
                "[0, {}) is not covered",
                first.min_coins
            )));
        }

        for pair in slabs.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            let Some(prev_max) = prev.max_coins else {
                return Err(Error::OverlappingSlabs(format!(
                    "{} is unbounded but {} follows it",
                    prev, next
                )));
            };
            if next.min_coins <= prev_max {
                return Err(Error::OverlappingSlabs(format!("{} and {}", prev, next)));
            }
            if next.min_coins > prev_max + 1 {
                return Err(Error::SlabGap(format!(
                    "[{}, {}] is not covered",
                    prev_max + 1,
                    next.min_coins - 1
                )));
            }
        }

        if let Some(last) = slabs.last().filter(|s| s.max_coins.is_some()) {
            return Err(Error::SlabGap(format!(
                "nothing covers amounts above {}",
                last
            )));
        }

        Ok(Self { slabs })
    }

    /// Payout percentage for `coins`: the first slab, by `min_coins`, that contains it.
    pub fn resolve(&self, coins: Coins) -> Result<Decimal> {
        self.slabs
            .iter()
            .find(|s| s.matches(coins))
            .map(|s| s.payout_percentage)
            .ok_or(Error::NoMatchingSlab(coins))
    }

    pub fn slabs(&self) -> &[PayoutSlab] {
        &self.slabs
    }
}
