//! Transfer engine properties against the in-memory store: conservation,
//! atomicity under injected write failures and safety under concurrency.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use banking_service::domain::{
    Account, AccountId, AccountStore, Error, Missing, Payment, Security, UnitOfWork,
};
use banking_service::engine::TransferEngine;
use banking_service::store::MemoryStore;

/// Number of concurrent callers in the stress tests.
const CALLERS: usize = 64;

fn account(nickname: &str, balance: i64) -> Account {
    Account {
        id: AccountId::generate(),
        name: nickname.to_string(),
        balance: Decimal::from(balance),
        currency: "EUR".into(),
        security: Security {
            nickname: nickname.to_string(),
            password_hash: "hash".into(),
        },
    }
}

async fn open(store: &impl AccountStore, nickname: &str, balance: i64) -> AccountId {
    let account = account(nickname, balance);
    let id = account.id;
    store.insert(account).await.unwrap();
    id
}

async fn balance(store: &impl AccountStore, id: &AccountId) -> Decimal {
    store.find_by_id(id).await.unwrap().unwrap().balance
}

/// Wraps the in-memory store and makes every balance write to one account
/// fail, after the other leg has already been staged.
struct FailingWrites {
    inner: MemoryStore,
    poisoned: AccountId,
}

struct FailingUnitOfWork {
    inner: Box<dyn UnitOfWork>,
    poisoned: AccountId,
}

#[async_trait]
impl AccountStore for FailingWrites {
    async fn ping(&self) -> Result<(), Error> {
        self.inner.ping().await
    }

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, Error> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_nickname(&self, nickname: &str) -> Result<Option<Account>, Error> {
        self.inner.find_by_nickname(nickname).await
    }

    async fn find_all(&self) -> Result<Vec<Account>, Error> {
        self.inner.find_all().await
    }

    async fn insert(&self, account: Account) -> Result<(), Error> {
        self.inner.insert(account).await
    }

    async fn delete_by_id(&self, id: &AccountId) -> Result<bool, Error> {
        self.inner.delete_by_id(id).await
    }

    async fn delete_all(&self) -> Result<u64, Error> {
        self.inner.delete_all().await
    }

    async fn begin(&self, scope: &[AccountId]) -> Result<Box<dyn UnitOfWork>, Error> {
        Ok(Box::new(FailingUnitOfWork {
            inner: self.inner.begin(scope).await?,
            poisoned: self.poisoned,
        }))
    }
}

#[async_trait]
impl UnitOfWork for FailingUnitOfWork {
    async fn find(&mut self, id: &AccountId) -> Result<Option<Account>, Error> {
        self.inner.find(id).await
    }

    async fn set_balance(&mut self, id: &AccountId, balance: Decimal) -> Result<(), Error> {
        if *id == self.poisoned {
            return Err(Error::StoreUnavailable("connection reset".into()));
        }
        self.inner.set_balance(id, balance).await
    }

    async fn commit(self: Box<Self>) -> Result<(), Error> {
        self.inner.commit().await
    }

    async fn abort(self: Box<Self>) -> Result<(), Error> {
        self.inner.abort().await
    }
}

#[tokio::test]
async fn receiver_write_failure_leaves_both_balances_unchanged() {
    let inner = MemoryStore::new();
    let sender = open(&inner, "sender", 100).await;
    let receiver = open(&inner, "receiver", 5).await;
    let store = Arc::new(FailingWrites {
        inner,
        poisoned: receiver,
    });
    let engine = TransferEngine::new(store.clone(), Duration::from_secs(5));

    let err = engine
        .transfer(&Payment::new(sender, receiver, Decimal::from(30)))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TransactionFailure(ref msg) if msg.contains("receiver")));
    assert_eq!(balance(store.as_ref(), &sender).await, Decimal::from(100));
    assert_eq!(balance(store.as_ref(), &receiver).await, Decimal::from(5));

    // The aborted unit of work released its locks: a second attempt fails on
    // the write again instead of timing out on the lock.
    let err = engine
        .transfer(&Payment::new(receiver, sender, Decimal::from(5)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TransactionFailure(_)));
    assert_eq!(balance(store.as_ref(), &sender).await, Decimal::from(100));
}

#[tokio::test]
async fn missing_sender_mutates_nothing() {
    let store = Arc::new(MemoryStore::new());
    let receiver = open(store.as_ref(), "receiver", 10).await;
    let ghost = AccountId::generate();

    let err = TransferEngine::new(store.clone(), Duration::from_secs(5))
        .transfer(&Payment::new(ghost, receiver, Decimal::ONE))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotFound(Missing::Sender(id)) if id == ghost));
    assert_eq!(balance(store.as_ref(), &receiver).await, Decimal::from(10));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_debits_from_one_account_lose_no_updates() {
    let store = Arc::new(MemoryStore::new());
    let amount = Decimal::from(3);
    let start = 3 * CALLERS as i64 + 7;
    let source = open(store.as_ref(), "source", start).await;

    let mut receivers = Vec::with_capacity(CALLERS);
    for i in 0..CALLERS {
        receivers.push(open(store.as_ref(), &format!("receiver-{}", i), 0).await);
    }

    let engine = Arc::new(TransferEngine::new(store.clone(), Duration::from_secs(30)));
    let handles: Vec<_> = receivers
        .iter()
        .map(|receiver| {
            let engine = engine.clone();
            let payment = Payment::new(source, *receiver, amount);
            tokio::spawn(async move { engine.transfer(&payment).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(balance(store.as_ref(), &source).await, Decimal::from(7));
    for receiver in &receivers {
        assert_eq!(balance(store.as_ref(), receiver).await, amount);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn overdrawing_callers_are_refused_without_going_negative() {
    let store = Arc::new(MemoryStore::new());
    let source = open(store.as_ref(), "source", 10).await;
    let sink = open(store.as_ref(), "sink", 0).await;

    let engine = Arc::new(TransferEngine::new(store.clone(), Duration::from_secs(30)));
    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .transfer(&Payment::new(source, sink, Decimal::ONE))
                    .await
            })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => succeeded += 1,
            Err(Error::InsufficientFunds { .. }) => {}
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(succeeded, 10);
    assert_eq!(balance(store.as_ref(), &source).await, Decimal::ZERO);
    assert_eq!(balance(store.as_ref(), &sink).await, Decimal::from(10));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn opposite_directions_between_a_pair_do_not_deadlock() {
    let store = Arc::new(MemoryStore::new());
    let a = open(store.as_ref(), "a", 1_000).await;
    let b = open(store.as_ref(), "b", 1_000).await;

    let engine = Arc::new(TransferEngine::new(store.clone(), Duration::from_secs(30)));
    let handles: Vec<_> = (0..CALLERS)
        .map(|i| {
            let engine = engine.clone();
            let payment = if i % 2 == 0 {
                Payment::new(a, b, Decimal::from(7))
            } else {
                Payment::new(b, a, Decimal::from(5))
            };
            tokio::spawn(async move { engine.transfer(&payment).await })
        })
        .collect();

    let all = tokio::time::timeout(Duration::from_secs(10), async {
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    })
    .await;
    assert!(all.is_ok(), "transfers did not finish; possible deadlock");

    let half = (CALLERS / 2) as i64;
    let a_after = balance(store.as_ref(), &a).await;
    let b_after = balance(store.as_ref(), &b).await;
    assert_eq!(a_after, Decimal::from(1_000 - 7 * half + 5 * half));
    assert_eq!(a_after + b_after, Decimal::from(2_000));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn disjoint_pairs_proceed_while_another_pair_is_held() {
    let store = Arc::new(MemoryStore::new());
    let a = open(store.as_ref(), "a", 10).await;
    let b = open(store.as_ref(), "b", 10).await;
    let c = open(store.as_ref(), "c", 10).await;
    let d = open(store.as_ref(), "d", 10).await;

    let held = store.begin(&[a, b]).await.unwrap();
    let engine = TransferEngine::new(store.clone(), Duration::from_millis(500));

    engine
        .transfer(&Payment::new(c, d, Decimal::from(4)))
        .await
        .unwrap();
    assert!(matches!(
        engine.transfer(&Payment::new(a, c, Decimal::ONE)).await,
        Err(Error::Timeout(_))
    ));

    held.commit().await.unwrap();
    assert_eq!(balance(store.as_ref(), &c).await, Decimal::from(6));
    assert_eq!(balance(store.as_ref(), &d).await, Decimal::from(14));
    assert_eq!(balance(store.as_ref(), &a).await, Decimal::from(10));
}
