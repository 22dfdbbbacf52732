use rust_decimal::Decimal;

use crate::domain::AccountId;

/// A request to move `amount` from one account to another. Lives only for
/// the duration of a single transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Payment {
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub amount: Decimal,
}

impl Payment {
    pub fn new(sender_id: AccountId, receiver_id: AccountId, amount: Decimal) -> Self {
        Self {
            sender_id,
            receiver_id,
            amount,
        }
    }
}

impl core::fmt::Display for Payment {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "sender={},receiver={},amount={}",
            self.sender_id, self.receiver_id, self.amount
        )
    }
}
