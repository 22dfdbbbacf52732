use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub Uuid);

impl AccountId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl FromStr for AccountId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| Error::InvalidInput(format!("invalid account ID format: {}", s)))
    }
}

impl core::fmt::Display for AccountId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    #[serde(rename = "_id")]
    pub id: AccountId,
    pub name: String,
    pub balance: Decimal, // signed; only transfers refuse to drive it below zero
    pub currency: String,
    pub security: Security,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Security {
    pub nickname: String, // unique across all accounts
    #[serde(skip_serializing)]
    pub password_hash: String,
}

/// Account as submitted by a client, before an id is assigned and the
/// password is hashed.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    #[serde(rename = "_id", default)]
    pub id: Option<AccountId>,
    pub name: String,
    #[serde(default)]
    pub balance: Decimal,
    pub currency: String,
    pub security: Credentials,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub nickname: String,
    pub password: String,
}
