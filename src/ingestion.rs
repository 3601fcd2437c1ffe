use std::io::Read;
use std::pin::Pin;

use futures::stream::{self, Stream};
use serde::Deserialize;

use crate::domain::traits::CommandStream;
use crate::domain::{
    AdminId, Coins, Error, PayoutDetails, Tier, TransactionId, UserId, WithdrawalId,
};

/// One ledger request from the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Purchase {
        user_id: UserId,
        plan_id: String,
        payment_reference: String,
    },
    SendMessage {
        sender: UserId,
        recipient: UserId,
        recipient_tier: Tier,
        chat_id: String,
    },
    VideoCall {
        caller: UserId,
        callee: UserId,
        call_id: String,
    },
    SendGift {
        sender: UserId,
        recipient: UserId,
        gift_id: String,
    },
    TradeGift {
        user_id: UserId,
        tx_id: TransactionId,
    },
    TradeAllGifts {
        user_id: UserId,
    },
    RequestWithdrawal {
        user_id: UserId,
        coins: Coins,
        payout: PayoutDetails,
    },
    Approve {
        admin_id: AdminId,
        withdrawal_id: WithdrawalId,
    },
    Reject {
        admin_id: AdminId,
        withdrawal_id: WithdrawalId,
        reason: String,
    },
    MarkPaid {
        admin_id: AdminId,
        withdrawal_id: WithdrawalId,
    },
    Adjust {
        admin_id: AdminId,
        user_id: UserId,
        amount: Coins,
        note: String,
    },
}

pub struct CsvReader<R: Read> {
    reader: Option<csv::Reader<R>>,
}

impl<R: Read> CsvReader<R> {
    pub fn new(reader: R) -> Result<Self, Error> {
        let rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        Ok(Self { reader: Some(rdr) })
    }
}

/// Internal shape used only for CSV deserialization.
/// Columns: `op,actor,subject,amount,reference,detail`.
#[derive(Debug, Deserialize)]
struct CsvRow {
    op: String,
    actor: i64,
    subject: Option<i64>,
    amount: Option<i64>,
    reference: Option<String>,
    detail: Option<String>,
}

impl CsvRow {
    fn subject(&self) -> Result<i64, Error> {
        self.subject.ok_or_else(|| missing(&self.op, "subject"))
    }

    fn amount(&self) -> Result<i64, Error> {
        self.amount.ok_or_else(|| missing(&self.op, "amount"))
    }

    fn reference(&self) -> Result<String, Error> {
        self.reference
            .clone()
            .filter(|r| !r.is_empty())
            .ok_or_else(|| missing(&self.op, "reference"))
    }

    fn reference_id(&self) -> Result<i64, Error> {
        let raw = self.reference()?;
        raw.parse().map_err(|_| {
            Error::Ingestion(format!("{}: reference {:?} is not an id", self.op, raw))
        })
    }

    fn detail(&self) -> Result<String, Error> {
        self.detail
            .clone()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| missing(&self.op, "detail"))
    }
}

fn missing(op: &str, column: &str) -> Error {
    Error::Ingestion(format!("{} requires a {} column", op, column))
}

impl TryFrom<CsvRow> for Command {
    type Error = Error;

    fn try_from(row: CsvRow) -> Result<Self, Self::Error> {
        let command = match row.op.trim().to_ascii_lowercase().as_str() {
            "purchase" => Command::Purchase {
                user_id: row.actor,
                plan_id: row.detail()?,
                payment_reference: row.reference()?,
            },
            "message" => Command::SendMessage {
                sender: row.actor,
                recipient: row.subject()?,
                recipient_tier: row.detail()?.parse()?,
                chat_id: row.reference()?,
            },
            "call" => Command::VideoCall {
                caller: row.actor,
                callee: row.subject()?,
                call_id: row.reference()?,
            },
            "gift" => Command::SendGift {
                sender: row.actor,
                recipient: row.subject()?,
                gift_id: row.detail()?,
            },
            "trade" => match row.reference {
                Some(ref r) if !r.is_empty() => Command::TradeGift {
                    user_id: row.actor,
                    tx_id: row.reference_id()?,
                },
                _ => Command::TradeAllGifts { user_id: row.actor },
            },
            "withdraw" => Command::RequestWithdrawal {
                user_id: row.actor,
                coins: row.amount()?,
                payout: row.detail()?.parse()?,
            },
            "approve" => Command::Approve {
                admin_id: row.actor,
                withdrawal_id: row.reference_id()?,
            },
            "reject" => Command::Reject {
                admin_id: row.actor,
                withdrawal_id: row.reference_id()?,
                reason: row.detail()?,
            },
            "paid" => Command::MarkPaid {
                admin_id: row.actor,
                withdrawal_id: row.reference_id()?,
            },
            "adjust" => Command::Adjust {
                admin_id: row.actor,
                user_id: row.subject()?,
                amount: row.amount()?,
                note: row.detail()?,
            },
            other => {
                return Err(Error::Ingestion(format!(
                    "Invalid command type: {}",
                    other
                )));
            }
        };
        Ok(command)
    }
}

impl<R: Read + Send + 'static> CommandStream for CsvReader<R> {
    type CmdStream = Pin<Box<dyn Stream<Item = Result<Command, Error>> + Send>>;

    fn stream(&mut self) -> Self::CmdStream {
        // Take ownership of the reader so the iterator we build owns all data and is 'static.
        let reader = match self.reader.take() {
            Some(r) => r,
            None => {
                // Already consumed; return an empty stream.
                return Box::pin(stream::iter(Vec::<Result<Command, Error>>::new()));
            }
        };

        let iter = reader
            .into_deserialize::<CsvRow>()
            .map(|row_res| match row_res {
                Ok(row) => Command::try_from(row),
                Err(e) => Err(Error::Ingestion(format!(
                    "CSV deserialization error: {}",
                    e
                ))),
            });

        Box::pin(stream::iter(iter))
    }
}
