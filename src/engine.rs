use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::domain::{
    Account, AccountId, Error, Missing, Payment,
    traits::{AccountStore, UnitOfWork},
};

#[derive(Debug)]
pub struct TransferEngine<S>
where
    S: AccountStore + ?Sized,
{
    store: Arc<S>,
    timeout: Duration,
}

impl<S> TransferEngine<S>
where
    S: AccountStore + ?Sized,
{
    pub fn new(store: Arc<S>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn transfer(&self, payment: &Payment) -> Result<(), Error> {
        self.transfer_within(payment, self.timeout).await
    }

    /// Moves `payment.amount` from sender to receiver, or changes nothing.
    ///
    /// The deadline bounds everything up to the commit. When it expires the
    /// unit of work is dropped, which rolls it back. The commit runs outside
    /// the deadline so a `Timeout` always means no effect.
    pub async fn transfer_within(
        &self,
        payment: &Payment,
        deadline: Duration,
    ) -> Result<(), Error> {
        // Shape checks run before the store is touched.
        if payment.amount <= Decimal::ZERO {
            warn!(%payment, "rejected non-positive amount");
            return Err(Error::InvalidAmount(payment.amount));
        }
        if payment.sender_id == payment.receiver_id {
            warn!(%payment, "rejected self transfer");
            return Err(Error::SelfTransfer);
        }

        let staged = tokio::time::timeout(deadline, self.stage(payment))
            .await
            .map_err(|_| {
                warn!(%payment, ?deadline, "transfer timed out");
                Error::Timeout(deadline)
            })?;

        let uow = match staged {
            Ok(uow) => uow,
            Err(e) => {
                warn!(%payment, error = %e, "transfer rejected");
                return Err(e);
            }
        };

        uow.commit().await.map_err(|e| {
            warn!(%payment, error = %e, "commit failed");
            e
        })?;

        info!(%payment, "payment processed");
        Ok(())
    }

    /// Opens the unit of work, checks both legs and stages both writes.
    /// Returns it ready to commit; every failure path aborts it first.
    async fn stage(&self, payment: &Payment) -> Result<Box<dyn UnitOfWork>, Error> {
        let mut uow = self
            .store
            .begin(&[payment.sender_id, payment.receiver_id])
            .await?;

        match Self::apply(&mut uow, payment).await {
            Ok(()) => Ok(uow),
            Err(e) => {
                if let Err(abort_err) = uow.abort().await {
                    warn!(error = %abort_err, "abort after failed transfer also failed");
                }
                Err(e)
            }
        }
    }

    async fn apply(uow: &mut Box<dyn UnitOfWork>, payment: &Payment) -> Result<(), Error> {
        debug!(sender = %payment.sender_id, "looking up sender");
        let sender = Self::resolve(uow, &payment.sender_id, Missing::Sender).await?;

        debug!(receiver = %payment.receiver_id, "looking up receiver");
        let receiver = Self::resolve(uow, &payment.receiver_id, Missing::Receiver).await?;

        if sender.balance < payment.amount {
            return Err(Error::InsufficientFunds {
                available: sender.balance,
                requested: payment.amount,
            });
        }

        let sender_balance = sender.balance - payment.amount;
        let receiver_balance = receiver
            .balance
            .checked_add(payment.amount)
            .ok_or_else(|| Error::InvalidInput("receiver balance would overflow".to_string()))?;

        uow.set_balance(&sender.id, sender_balance)
            .await
            .map_err(|e| write_failure("sender", e))?;
        uow.set_balance(&receiver.id, receiver_balance)
            .await
            .map_err(|e| write_failure("receiver", e))?;

        Ok(())
    }

    async fn resolve(
        uow: &mut Box<dyn UnitOfWork>,
        id: &AccountId,
        missing: fn(AccountId) -> Missing,
    ) -> Result<Account, Error> {
        uow.find(id)
            .await?
            .ok_or_else(|| Error::NotFound(missing(*id)))
    }
}

fn write_failure(leg: &str, e: Error) -> Error {
    match e {
        Error::TransactionFailure(_) => e,
        other => Error::TransactionFailure(format!("failed to update {} balance: {}", leg, other)),
    }
}
