use std::time::Duration;

use rust_decimal::Decimal;

use crate::domain::AccountId;

/// Which record a lookup failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Sender(AccountId),
    Receiver(AccountId),
    Account(AccountId),
}

impl core::fmt::Display for Missing {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Missing::Sender(id) => write!(f, "sender account {}", id),
            Missing::Receiver(id) => write!(f, "receiver account {}", id),
            Missing::Account(id) => write!(f, "account {}", id),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no {0} found")]
    NotFound(Missing),

    #[error("account with nickname {0} already exists")]
    DuplicateKey(String),

    #[error("insufficient funds in sender account: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },

    #[error("amount must be greater than zero, got {0}")]
    InvalidAmount(Decimal),

    #[error("sender and receiver must be different accounts")]
    SelfTransfer,

    #[error("{0}")]
    InvalidInput(String),

    #[error("transaction failed: {0}")]
    TransactionFailure(String),

    #[error("account store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("transfer did not complete within {0:?}")]
    Timeout(Duration),

    #[error("internal error: {0}")]
    Internal(String),
}
