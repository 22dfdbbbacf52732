pub mod account;
pub mod error;
pub mod payment;
pub mod traits;

pub use account::{Account, AccountId, Credentials, NewAccount, Security};
pub use error::{Error, Missing};
pub use payment::Payment;
pub use traits::{AccountStore, UnitOfWork};
