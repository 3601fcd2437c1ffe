//! End-of-run CSV report: account balances, then withdrawal requests.

use std::io::Write;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::{
    Account, Coins, Error, Inr, UserId, WithdrawalId, WithdrawalRequest, WithdrawalStatus,
};

#[derive(Debug, Serialize)]
struct AccountRow {
    user: UserId,
    balance: Coins,
    held_amount: Coins,
    pending_gifts: Coins,
    version: u64,
}

impl From<&Account> for AccountRow {
    fn from(account: &Account) -> Self {
        Self {
            user: account.user_id,
            balance: account.balance,
            held_amount: account.held_amount,
            pending_gifts: account.pending_gifts,
            version: account.version,
        }
    }
}

#[derive(Debug, Serialize)]
struct WithdrawalRow {
    id: WithdrawalId,
    user: UserId,
    coins: Coins,
    payout_percentage: Decimal,
    payout_inr: Inr,
    status: WithdrawalStatus,
}

impl From<&WithdrawalRequest> for WithdrawalRow {
    fn from(w: &WithdrawalRequest) -> Self {
        Self {
            id: w.id,
            user: w.user_id,
            coins: w.coins_requested,
            payout_percentage: w.payout_percentage.normalize(),
            payout_inr: w.payout_amount_inr,
            status: w.status,
        }
    }
}

/// Writes both sections, separated by a blank line. Rows are sorted by id.
pub fn write_report<W: Write>(
    mut out: W,
    accounts: &[Account],
    withdrawals: &[WithdrawalRequest],
) -> Result<(), Error> {
    let mut accounts: Vec<&Account> = accounts.iter().collect();
    accounts.sort_by_key(|a| a.user_id);
    let mut withdrawals: Vec<&WithdrawalRequest> = withdrawals.iter().collect();
    withdrawals.sort_by_key(|w| w.id);

    {
        let mut wtr = headerless(&mut out);
        wtr.write_record(["user", "balance", "held_amount", "pending_gifts", "version"])
            .map_err(csv_error)?;
        for account in accounts {
            wtr.serialize(AccountRow::from(account)).map_err(csv_error)?;
        }
        wtr.flush()?;
    }

    writeln!(out)?;

    {
        let mut wtr = headerless(&mut out);
        wtr.write_record(["id", "user", "coins", "payout_percentage", "payout_inr", "status"])
            .map_err(csv_error)?;
        for request in withdrawals {
            wtr.serialize(WithdrawalRow::from(request))
                .map_err(csv_error)?;
        }
        wtr.flush()?;
    }

    out.flush()?;
    Ok(())
}

fn headerless<W: Write>(out: W) -> csv::Writer<W> {
    csv::WriterBuilder::new().has_headers(false).from_writer(out)
}

fn csv_error(e: csv::Error) -> Error {
    Error::Io(std::io::Error::other(e))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::{PayoutDetails, PayoutMethod};

    #[test]
    fn writes_sorted_sections() {
        let mut second = Account::new(2);
        second.balance = 70;
        second.version = 3;
        let mut first = Account::new(1);
        first.balance = 1_080;
        first.held_amount = 600;
        first.version = 5;

        let request = WithdrawalRequest {
            id: 1,
            user_id: 1,
            coins_requested: 600,
            payout_percentage: Decimal::new(500, 1),
            payout_amount_inr: Inr(30_000),
            payout_method: PayoutMethod::Upi,
            payout_details: PayoutDetails::Upi {
                upi_id: "asha@okbank".to_string(),
            },
            status: WithdrawalStatus::Pending,
            hold_id: 1,
            created_at: Utc::now(),
            reviewed_by: None,
            reviewed_at: None,
            review_notes: None,
            paid_at: None,
        };

        let mut buf = Vec::new();
        write_report(&mut buf, &[second, first], &[request]).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert_eq!(
            text,
            "user,balance,held_amount,pending_gifts,version\n\
             1,1080,600,0,5\n\
             2,70,0,0,3\n\
             \n\
             id,user,coins,payout_percentage,payout_inr,status\n\
             1,1,600,50,300.00,pending\n"
        );
    }

    #[test]
    fn empty_sections_keep_one_header_each() {
        let mut buf = Vec::new();
        write_report(&mut buf, &[], &[]).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "user,balance,held_amount,pending_gifts,version\n\
             \n\
             id,user,coins,payout_percentage,payout_inr,status\n"
        );
    }
}
