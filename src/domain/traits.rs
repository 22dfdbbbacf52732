use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::{Account, AccountId, Error};

/// Durable home of account records.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn ping(&self) -> Result<(), Error>;

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, Error>;

    async fn find_by_nickname(&self, nickname: &str) -> Result<Option<Account>, Error>;

    async fn find_all(&self) -> Result<Vec<Account>, Error>;

    /// Fails with `DuplicateKey` when the id or nickname is already taken.
    async fn insert(&self, account: Account) -> Result<(), Error>;

    async fn delete_by_id(&self, id: &AccountId) -> Result<bool, Error>;

    async fn delete_all(&self) -> Result<u64, Error>;

    /// Opens an atomic unit of work over the given records. Units of work
    /// whose scopes share an id are serialized; disjoint ones run in parallel.
    async fn begin(&self, scope: &[AccountId]) -> Result<Box<dyn UnitOfWork>, Error>;
}

/// All-or-nothing sequence of reads and writes. Writes are only visible to
/// others after `commit`; dropping without committing discards them.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn find(&mut self, id: &AccountId) -> Result<Option<Account>, Error>;

    async fn set_balance(&mut self, id: &AccountId, balance: Decimal) -> Result<(), Error>;

    async fn commit(self: Box<Self>) -> Result<(), Error>;

    async fn abort(self: Box<Self>) -> Result<(), Error>;
}
