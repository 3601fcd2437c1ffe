use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Coin quantities. Balances are never negative.
pub type Coins = i64;

/// Rupee amount held as paise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Inr(pub i64);

impl Inr {
    pub const SCALE: i64 = 100; // paise per rupee
    pub const TARGET_DECIMALS: u32 = 2;

    pub fn from_rupees(rupees: i64) -> Option<Self> {
        rupees.checked_mul(Self::SCALE).map(Self)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Whole rupees of `value`, rounded toward negative infinity.
    pub fn floor_rupees(value: Decimal) -> Option<Self> {
        value.floor().to_i64().and_then(Self::from_rupees)
    }

    pub fn from_scaled_i128(value: i128, scale: u32) -> Option<Self> {
        if scale == Self::TARGET_DECIMALS {
            return i64::try_from(value).ok().map(Self);
        }
        if scale < Self::TARGET_DECIMALS {
            let factor = 10i128.pow(Self::TARGET_DECIMALS - scale);
            let widened = value.checked_mul(factor)?;
            return i64::try_from(widened).ok().map(Self);
        }
        // scale > TARGET_DECIMALS: need rounding
        let factor = 10i128.pow(scale - Self::TARGET_DECIMALS);
        let div = value / factor; // truncated toward zero
        let rem = value % factor;
        let half = factor / 2;
        let abs_rem = rem.abs();
        let mut adjusted = div;
        if abs_rem > half || (abs_rem == half && div & 1 != 0) {
            // ties go to the even neighbour
            adjusted += if value.is_negative() { -1 } else { 1 };
        }
        i64::try_from(adjusted).ok().map(Self)
    }

    pub fn from_decimal_str(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        let neg = s.starts_with('-');
        let body = s.trim_start_matches('-');
        let mut parts = body.split('.');
        let int_part = parts.next()?;
        if int_part.is_empty() {
            return None;
        }
        let int_val: i128 = int_part.parse().ok()?;
        let frac_opt = parts.next();
        if parts.next().is_some() {
            return None;
        }
        let (raw, scale) = match frac_opt {
            Some(frac) if !frac.is_empty() => (
                int_val
                    .checked_mul(10i128.checked_pow(frac.len() as u32)?)?
                    .checked_add(frac.parse::<i128>().ok()?)?,
                frac.len() as u32,
            ),
            _ => (int_val, 0),
        };
        let signed = if neg { -raw } else { raw };
        Inr::from_scaled_i128(signed, scale)
    }
}

impl core::fmt::Display for Inr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let minor = self.0;
        let abs = minor.unsigned_abs();
        let int_part = abs / Self::SCALE as u64;
        let frac_part = abs % Self::SCALE as u64;
        if minor < 0 {
            write!(f, "-{}.{:02}", int_part, frac_part)
        } else {
            write!(f, "{}.{:02}", int_part, frac_part)
        }
    }
}

impl Serialize for Inr {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Inr {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Inr::from_decimal_str(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("Invalid INR amount: {}", s)))
    }
}
