use crate::domain::{Coins, HoldId, TransactionId, UserId, WithdrawalId};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Ingestion failed with: {0}")]
    Ingestion(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(Coins),

    #[error("Insufficient balance for user {user_id}: available {available}, required {required}")]
    InsufficientBalance {
        user_id: UserId,
        available: Coins,
        required: Coins,
    },

    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),

    #[error("Transaction {0} is not a pending credit")]
    NotPending(TransactionId),

    #[error("Hold {0} is not active")]
    HoldNotActive(HoldId),

    /// Raised by the store when an account changed under an in-flight mutation.
    #[error("Account {0} was modified concurrently")]
    VersionConflict(UserId),

    #[error("Concurrency conflict on account {0}, retry later")]
    ConcurrencyConflict(UserId),

    #[error("Withdrawal {0} not found")]
    WithdrawalNotFound(WithdrawalId),

    #[error("Cannot {action} withdrawal {id} in state {from}")]
    InvalidTransition {
        id: WithdrawalId,
        from: String,
        action: &'static str,
    },

    #[error("Requested {requested} coins is below the minimum of {minimum}")]
    BelowMinimum { requested: Coins, minimum: Coins },

    #[error("Requested {requested} coins is above the maximum of {maximum}")]
    AboveMaximum { requested: Coins, maximum: Coins },

    #[error("{window} withdrawal limit of {limit} coins exceeded ({used} already requested)")]
    LimitExceeded {
        window: &'static str,
        limit: Coins,
        used: Coins,
    },

    #[error("No payout slab matches {0} coins")]
    NoMatchingSlab(Coins),

    #[error("Payout slabs leave a gap: {0}")]
    SlabGap(String),

    #[error("Payout slabs overlap: {0}")]
    OverlappingSlabs(String),

    #[error("Unknown tier: {0}")]
    UnknownTier(String),

    #[error("Unknown gift: {0}")]
    UnknownGift(String),

    #[error("Unknown coin plan: {0}")]
    UnknownPlan(String),
}

impl Error {
    /// Transient failures the transaction engine retries before surfacing.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::VersionConflict(_) | Error::ConcurrencyConflict(_)
        )
    }

    /// Operator-caused slab misconfiguration. Never retried, always alerted.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::NoMatchingSlab(_) | Error::SlabGap(_) | Error::OverlappingSlabs(_)
        )
    }

    /// Text that is safe to hand back to an end user.
    pub fn client_message(&self) -> String {
        match self {
            Error::Io(_) | Error::Config(_) | Error::VersionConflict(_) => {
                "Internal server error".to_string()
            }
            Error::InsufficientBalance {
                available,
                required,
                ..
            } => format!("Insufficient balance: available {available}, required {required}"),
            Error::ConcurrencyConflict(_) => "Please retry shortly".to_string(),
            e if e.is_configuration() => "Payouts are temporarily unavailable".to_string(),
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn classifies_errors() {
        assert!(Error::ConcurrencyConflict(1).is_retryable());
        assert!(!Error::InvalidAmount(0).is_retryable());
        assert!(Error::SlabGap("[0, 10)".into()).is_configuration());
        assert!(!Error::UnknownGift("rose".into()).is_configuration());
    }

    #[test]
    fn client_message_hides_internals() {
        let e = Error::InsufficientBalance {
            user_id: 42,
            available: 10,
            required: 20,
        };
        assert!(!e.client_message().contains("42"));
        assert_eq!(
            Error::NoMatchingSlab(5).client_message(),
            "Payouts are temporarily unavailable"
        );
    }
}
