//! PostgreSQL account store.
//!
//! Units of work map onto database transactions. `begin` takes row locks on
//! the whole scope up front, in id order, so two transfers over the same pair
//! in opposite directions queue instead of deadlocking.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::{Account, AccountId, AccountStore, Error, Security, UnitOfWork};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id            UUID PRIMARY KEY,
    name          TEXT NOT NULL,
    balance       NUMERIC NOT NULL,
    currency      TEXT NOT NULL,
    nickname      TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL
)"#;

const COLUMNS: &str = "id, name, balance, currency, nickname, password_hash";

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::DuplicateKey(db.message().to_string())
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Error::StoreUnavailable(e.to_string()),
            _ => Error::TransactionFailure(e.to_string()),
        }
    }
}

fn account_from_row(row: &PgRow) -> Result<Account, sqlx::Error> {
    Ok(Account {
        id: AccountId(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        balance: row.try_get("balance")?,
        currency: row.try_get("currency")?,
        security: Security {
            nickname: row.try_get("nickname")?,
            password_hash: row.try_get("password_hash")?,
        },
    })
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        sqlx::query(SCHEMA).execute(&pool).await?;
        tracing::info!("PostgreSQL account store ready");

        Ok(Self { pool })
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn ping(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, Error> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM accounts WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(account_from_row).transpose()?)
    }

    async fn find_by_nickname(&self, nickname: &str) -> Result<Option<Account>, Error> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM accounts WHERE nickname = $1"))
            .bind(nickname)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(account_from_row).transpose()?)
    }

    async fn find_all(&self) -> Result<Vec<Account>, Error> {
        let rows = sqlx::query(&format!("SELECT {COLUMNS} FROM accounts ORDER BY name, id"))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(account_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn insert(&self, account: Account) -> Result<(), Error> {
        let result = sqlx::query(&format!(
            "INSERT INTO accounts ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"
        ))
        .bind(account.id.0)
        .bind(&account.name)
        .bind(account.balance)
        .bind(&account.currency)
        .bind(&account.security.nickname)
        .bind(&account.security.password_hash)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(Error::DuplicateKey(account.security.nickname))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_by_id(&self, id: &AccountId) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM accounts")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn begin(&self, scope: &[AccountId]) -> Result<Box<dyn UnitOfWork>, Error> {
        let ids: Vec<Uuid> = scope.iter().map(|id| id.0).collect();

        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT id FROM accounts WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(&ids)
            .fetch_all(&mut *tx)
            .await?;

        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

/// Rolled back by sqlx if dropped before `commit`.
struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn find(&mut self, id: &AccountId) -> Result<Option<Account>, Error> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM accounts WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.as_ref().map(account_from_row).transpose()?)
    }

    async fn set_balance(&mut self, id: &AccountId, balance: Decimal) -> Result<(), Error> {
        let result = sqlx::query("UPDATE accounts SET balance = $1 WHERE id = $2")
            .bind(balance)
            .bind(id.0)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::TransactionFailure(format!(
                "account {} disappeared during the unit of work",
                id
            )));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), Error> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<(), Error> {
        self.tx.rollback().await?;
        Ok(())
    }
}
