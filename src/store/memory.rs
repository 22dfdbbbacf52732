use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::{Account, AccountId, AccountStore, Error, UnitOfWork};

/// A record slot. `None` once the account has been deleted, so a unit of
/// work that locked the slot before the delete sees it as gone.
type Slot = Arc<Mutex<Option<Account>>>;

/// In-process account store. Each account sits behind its own async mutex;
/// units of work lock the slots of their scope in ascending id order.
///
/// Reads take the same mutex, so a read of an account inside an open unit of
/// work waits for its commit or abort and never sees a half-applied transfer.
/// PostgreSQL reads do not wait on row locks and return the last committed
/// row instead. Both backends only ever expose committed balances.
#[derive(Default, Debug)]
pub struct MemoryStore {
    accounts: DashMap<AccountId, Slot>,
    nicknames: DashMap<String, AccountId>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            nicknames: DashMap::new(),
        }
    }

    // Clones the Arc out so no map shard lock is held across an await.
    fn slot(&self, id: &AccountId) -> Option<Slot> {
        self.accounts.get(id).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn ping(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, Error> {
        match self.slot(id) {
            Some(slot) => Ok(slot.lock().await.clone()),
            None => Ok(None),
        }
    }

    async fn find_by_nickname(&self, nickname: &str) -> Result<Option<Account>, Error> {
        let id = match self.nicknames.get(nickname) {
            Some(entry) => *entry.value(),
            None => return Ok(None),
        };
        self.find_by_id(&id).await
    }

    async fn find_all(&self) -> Result<Vec<Account>, Error> {
        let slots: Vec<Slot> = self.accounts.iter().map(|e| e.value().clone()).collect();

        // Each read releases its lock before the next is awaited, so a scan
        // never holds one record while waiting on another.
        let reads = slots
            .iter()
            .map(|slot| async move { slot.lock().await.clone() });
        let mut accounts: Vec<Account> = futures::future::join_all(reads)
            .await
            .into_iter()
            .flatten()
            .collect();
        accounts.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        Ok(accounts)
    }

    async fn insert(&self, account: Account) -> Result<(), Error> {
        match self.nicknames.entry(account.security.nickname.clone()) {
            Entry::Occupied(_) => Err(Error::DuplicateKey(account.security.nickname)),
            Entry::Vacant(nick) => match self.accounts.entry(account.id) {
                Entry::Occupied(_) => Err(Error::DuplicateKey(account.security.nickname)),
                Entry::Vacant(slot) => {
                    nick.insert(account.id);
                    slot.insert(Arc::new(Mutex::new(Some(account))));
                    Ok(())
                }
            },
        }
    }

    async fn delete_by_id(&self, id: &AccountId) -> Result<bool, Error> {
        let Some((_, slot)) = self.accounts.remove(id) else {
            return Ok(false);
        };

        // Waits for any unit of work holding the record.
        let removed = slot.lock().await.take();
        if let Some(account) = &removed {
            self.nicknames
                .remove_if(&account.security.nickname, |_, owner| owner == id);
        }

        Ok(removed.is_some())
    }

    async fn delete_all(&self) -> Result<u64, Error> {
        let ids: Vec<AccountId> = self.accounts.iter().map(|e| *e.key()).collect();

        let mut deleted = 0;
        for id in ids {
            if self.delete_by_id(&id).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn begin(&self, scope: &[AccountId]) -> Result<Box<dyn UnitOfWork>, Error> {
        let mut ids = scope.to_vec();
        ids.sort();
        ids.dedup();

        let mut locked = HashMap::with_capacity(ids.len());
        for id in ids {
            let guard = match self.slot(&id) {
                Some(slot) => Some(slot.lock_owned().await),
                None => None,
            };
            locked.insert(id, guard);
        }

        Ok(Box::new(MemoryUnitOfWork {
            locked,
            staged: HashMap::new(),
        }))
    }
}

struct MemoryUnitOfWork {
    locked: HashMap<AccountId, Option<OwnedMutexGuard<Option<Account>>>>,
    staged: HashMap<AccountId, Decimal>,
}

impl MemoryUnitOfWork {
    fn current(&self, id: &AccountId) -> Result<Option<&Account>, Error> {
        match self.locked.get(id) {
            Some(guard) => Ok(guard.as_ref().and_then(|g| (**g).as_ref())),
            None => Err(Error::TransactionFailure(format!(
                "account {} is outside the unit of work",
                id
            ))),
        }
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn find(&mut self, id: &AccountId) -> Result<Option<Account>, Error> {
        let staged = self.staged.get(id).copied();
        Ok(self.current(id)?.map(|account| {
            let mut account = account.clone();
            if let Some(balance) = staged {
                account.balance = balance;
            }
            account
        }))
    }

    async fn set_balance(&mut self, id: &AccountId, balance: Decimal) -> Result<(), Error> {
        if self.current(id)?.is_none() {
            return Err(Error::TransactionFailure(format!(
                "account {} disappeared during the unit of work",
                id
            )));
        }
        self.staged.insert(*id, balance);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), Error> {
        let MemoryUnitOfWork { mut locked, staged } = *self;
        for (id, balance) in staged {
            if let Some(Some(guard)) = locked.get_mut(&id)
                && let Some(account) = &mut **guard
            {
                account.balance = balance;
            }
        }
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<(), Error> {
        Ok(())
    }
}
