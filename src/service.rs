use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::{debug, info};

use crate::domain::{Account, AccountId, AccountStore, Error, Missing, NewAccount, Security};

/// Account CRUD on top of an [`AccountStore`].
#[derive(Debug)]
pub struct AccountService<S>
where
    S: AccountStore + ?Sized,
{
    store: Arc<S>,
}

impl<S> AccountService<S>
where
    S: AccountStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn create(&self, new: NewAccount) -> Result<Account, Error> {
        let nickname = new.security.nickname;
        if self.store.find_by_nickname(&nickname).await?.is_some() {
            return Err(Error::DuplicateKey(nickname));
        }

        let password = new.security.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| Error::Internal(format!("hashing task failed: {}", e)))??;

        let account = Account {
            id: new.id.unwrap_or_else(AccountId::generate),
            name: new.name,
            balance: new.balance,
            currency: new.currency,
            security: Security {
                nickname,
                password_hash,
            },
        };

        self.store.insert(account.clone()).await?;
        info!(id = %account.id, nickname = %account.security.nickname, "account created");

        Ok(account)
    }

    pub async fn list(&self) -> Result<Vec<Account>, Error> {
        let accounts = self.store.find_all().await?;
        debug!(count = accounts.len(), "listed accounts");
        Ok(accounts)
    }

    pub async fn get(&self, id: &AccountId) -> Result<Account, Error> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(Error::NotFound(Missing::Account(*id)))
    }

    pub async fn delete(&self, id: &AccountId) -> Result<(), Error> {
        if !self.store.delete_by_id(id).await? {
            return Err(Error::NotFound(Missing::Account(*id)));
        }
        info!(id = %id, "account deleted");
        Ok(())
    }

    pub async fn delete_all(&self) -> Result<u64, Error> {
        let deleted = self.store.delete_all().await?;
        info!(deleted, "all accounts deleted");
        Ok(deleted)
    }

    /// Checks a plaintext password against the stored hash. Unknown
    /// nicknames verify as `false`.
    pub async fn verify_password(&self, nickname: &str, password: &str) -> Result<bool, Error> {
        let Some(account) = self.store.find_by_nickname(nickname).await? else {
            return Ok(false);
        };

        let password = password.to_string();
        tokio::task::spawn_blocking(move || {
            verify_password(&password, &account.security.password_hash)
        })
        .await
        .map_err(|e| Error::Internal(format!("verification task failed: {}", e)))?
    }
}

fn hash_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Internal(format!("hashing failed: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> Result<bool, Error> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| Error::Internal(format!("invalid hash format: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
