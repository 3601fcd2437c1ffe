use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{AdminId, Coins, Error, HoldId, Inr, Result, UserId, WithdrawalId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
    Paid,
}

impl WithdrawalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WithdrawalStatus::Rejected | WithdrawalStatus::Paid)
    }

    /// Counted against the daily and weekly limits.
    pub fn counts_toward_limits(&self) -> bool {
        !matches!(self, WithdrawalStatus::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected => "rejected",
            WithdrawalStatus::Paid => "paid",
        }
    }
}

impl core::fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutMethod {
    #[serde(rename = "UPI")]
    Upi,
    #[serde(rename = "bank")]
    Bank,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum PayoutDetails {
    #[serde(rename = "UPI", rename_all = "camelCase")]
    Upi { upi_id: String },
    #[serde(rename = "bank", rename_all = "camelCase")]
    Bank {
        account_holder: String,
        account_number: String,
        ifsc: String,
    },
}

impl PayoutDetails {
    pub fn method(&self) -> PayoutMethod {
        match self {
            PayoutDetails::Upi { .. } => PayoutMethod::Upi,
            PayoutDetails::Bank { .. } => PayoutMethod::Bank,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            PayoutDetails::Upi { upi_id } => validate_upi(upi_id),
            PayoutDetails::Bank {
                account_holder,
                account_number,
                ifsc,
            } => {
                if account_holder.trim().is_empty() {
                    return Err(Error::Validation(
                        "account holder name is required".to_string(),
                    ));
                }
                if !(9..=18).contains(&account_number.len())
                    || !account_number.bytes().all(|b| b.is_ascii_digit())
                {
                    return Err(Error::Validation(
                        "account number must be 9 to 18 digits".to_string(),
                    ));
                }
                validate_ifsc(ifsc)
            }
        }
    }
}

/// Parses the compact journal form: `upi:<id>` or `bank:<holder>:<account>:<ifsc>`.
impl FromStr for PayoutDetails {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().split(':');
        let details = match parts.next().map(str::to_ascii_lowercase).as_deref() {
            Some("upi") => PayoutDetails::Upi {
                upi_id: parts.next().unwrap_or_default().trim().to_string(),
            },
            Some("bank") => PayoutDetails::Bank {
                account_holder: parts.next().unwrap_or_default().trim().to_string(),
                account_number: parts.next().unwrap_or_default().trim().to_string(),
                ifsc: parts.next().unwrap_or_default().trim().to_string(),
            },
            _ => {
                return Err(Error::Validation(format!(
                    "unsupported payout method in {:?}",
                    s
                )));
            }
        };
        if parts.next().is_some() {
            return Err(Error::Validation(format!("malformed payout details {:?}", s)));
        }
        details.validate()?;
        Ok(details)
    }
}

fn validate_upi(upi_id: &str) -> Result<()> {
    let invalid = || Error::Validation(format!("invalid UPI id {:?}", upi_id));
    let (handle, provider) = upi_id.split_once('@').ok_or_else(invalid)?;
    let handle_ok = (2..=256).contains(&handle.len())
        && handle
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    let provider_ok =
        (2..=64).contains(&provider.len()) && provider.chars().all(|c| c.is_ascii_alphabetic());
    if handle_ok && provider_ok {
        Ok(())
    } else {
        Err(invalid())
    }
}

fn validate_ifsc(ifsc: &str) -> Result<()> {
    let bytes = ifsc.as_bytes();
    let ok = bytes.len() == 11
        && bytes[..4].iter().all(u8::is_ascii_uppercase)
        && bytes[4] == b'0'
        && bytes[5..]
            .iter()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
    if ok {
        Ok(())
    } else {
        Err(Error::Validation(format!("invalid IFSC code {:?}", ifsc)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub id: WithdrawalId,
    pub user_id: UserId,
    pub coins_requested: Coins,
    /// Snapshot taken at creation; later slab edits never touch it.
    pub payout_percentage: Decimal,
    #[serde(rename = "payoutAmountINR")]
    pub payout_amount_inr: Inr,
    pub payout_method: PayoutMethod,
    pub payout_details: PayoutDetails,
    pub status: WithdrawalStatus,
    pub hold_id: HoldId,
    pub created_at: DateTime<Utc>,
    pub reviewed_by: Option<AdminId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// A request before the store assigns it an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWithdrawal {
    pub user_id: UserId,
    pub coins_requested: Coins,
    pub payout_percentage: Decimal,
    pub payout_amount_inr: Inr,
    pub payout_details: PayoutDetails,
    pub hold_id: HoldId,
    pub created_at: DateTime<Utc>,
}

impl NewWithdrawal {
    pub fn into_request(self, id: WithdrawalId) -> WithdrawalRequest {
        WithdrawalRequest {
            id,
            user_id: self.user_id,
            coins_requested: self.coins_requested,
            payout_percentage: self.payout_percentage,
            payout_amount_inr: self.payout_amount_inr,
            payout_method: self.payout_details.method(),
            payout_details: self.payout_details,
            status: WithdrawalStatus::Pending,
            hold_id: self.hold_id,
            created_at: self.created_at,
            reviewed_by: None,
            reviewed_at: None,
            review_notes: None,
            paid_at: None,
        }
    }
}

/// `floor(coins * percentage / 100)` whole rupees.
pub fn payout_amount(coins: Coins, percentage: Decimal) -> Result<Inr> {
    Decimal::from(coins)
        .checked_mul(percentage)
        .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
        .and_then(Inr::floor_rupees)
        .ok_or_else(|| Error::Validation(format!("payout for {} coins overflows", coins)))
}
