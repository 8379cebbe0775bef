mod common;

use simple_bank::config::IsolationLevel;
use simple_bank::error::AppError;
use simple_bank::models::{
    AddAccountBalanceParams, ListEntriesParams, ListTransfersParams, TransferParams,
    TransferResult,
};
use simple_bank::repositories::{
    AccountRepository, EntryRepository, PgStore, Store, TransactionScope, TransferRepository,
};
use simple_bank::services::{retry_transient, BalanceFloor, TransferEngine, TransferPolicy};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "Requires running PostgreSQL"]
async fn test_concurrent_transfers_same_direction() {
    let store = common::setup_store().await;
    let currency = common::random_currency();
    let acc1 = common::create_account(&store, 300, &currency).await;
    let acc2 = common::create_account(&store, 300, &currency).await;

    let engine = Arc::new(TransferEngine::new(store.clone()));
    let n = 5;
    let amount = 10;
    let (from_id, to_id) = (acc1.id, acc2.id);

    let handles: Vec<_> = (0..n)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .transfer(TransferParams::new(from_id, to_id, amount))
                    .await
            })
        })
        .collect();

    let mut queries = store.queries().await.expect("Failed to acquire connection");
    let mut seen = HashSet::new();

    for handle in handles {
        let result: TransferResult = handle
            .await
            .expect("Task panicked")
            .expect("Transfer failed");

        let transfer = &result.transfer;
        assert!(transfer.id > 0);
        assert_eq!(transfer.from_account_id, acc1.id);
        assert_eq!(transfer.to_account_id, acc2.id);
        assert_eq!(transfer.amount, amount);
        queries.get_transfer(transfer.id).await.expect("Transfer not persisted");

        assert_eq!(result.from_entry.account_id, acc1.id);
        assert_eq!(result.from_entry.amount, -amount);
        queries.get_entry(result.from_entry.id).await.expect("Entry not persisted");

        assert_eq!(result.to_entry.account_id, acc2.id);
        assert_eq!(result.to_entry.amount, amount);
        queries.get_entry(result.to_entry.id).await.expect("Entry not persisted");

        assert_eq!(result.from_account.id, acc1.id);
        assert_eq!(result.to_account.id, acc2.id);

        let diff1 = acc1.balance - result.from_account.balance;
        let diff2 = result.to_account.balance - acc2.balance;
        assert_eq!(diff1, diff2);
        assert!(diff1 > 0);
        assert_eq!(diff1 % amount, 0);

        let k = diff1 / amount;
        assert!((1..=n).contains(&k));
        assert!(seen.insert(k), "two transfers observed the same balance step {k}");
    }

    let updated1 = queries.get_account(acc1.id).await.unwrap();
    let updated2 = queries.get_account(acc2.id).await.unwrap();
    assert_eq!(updated1.balance, 250);
    assert_eq!(updated2.balance, 350);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "Requires running PostgreSQL"]
async fn test_concurrent_transfers_both_directions_do_not_deadlock() {
    let store = common::setup_store().await;
    let currency = common::random_currency();
    let acc1 = common::create_account(&store, 300, &currency).await;
    let acc2 = common::create_account(&store, 300, &currency).await;

    let engine = Arc::new(TransferEngine::new(store.clone()).with_timeout(Duration::from_secs(10)));

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let engine = engine.clone();
            let (from, to) = if i % 2 == 0 {
                (acc1.id, acc2.id)
            } else {
                (acc2.id, acc1.id)
            };
            tokio::spawn(async move { engine.transfer(TransferParams::new(from, to, 10)).await })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        handle
            .await
            .expect("Task panicked")
            .unwrap_or_else(|err| panic!("transfer {i} failed: {err}"));
    }

    let mut queries = store.queries().await.expect("Failed to acquire connection");
    assert_eq!(queries.get_account(acc1.id).await.unwrap().balance, 300);
    assert_eq!(queries.get_account(acc2.id).await.unwrap().balance, 300);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "Requires running PostgreSQL"]
async fn test_serializable_transfers_converge_with_caller_retry() {
    let store = common::setup_store()
        .await
        .with_isolation_level(IsolationLevel::Serializable);
    let acc1 = common::create_account(&store, 300, "USD").await;
    let acc2 = common::create_account(&store, 300, "USD").await;

    let engine = Arc::new(TransferEngine::new(store.clone()));

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let engine = engine.clone();
            let (from, to) = if i % 2 == 0 {
                (acc1.id, acc2.id)
            } else {
                (acc2.id, acc1.id)
            };
            tokio::spawn(async move {
                let engine = &engine;
                retry_transient(50, Duration::from_millis(5), move || {
                    engine.transfer(TransferParams::new(from, to, 10))
                })
                .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.expect("Task panicked").expect("Transfer failed");
    }

    let mut queries = store.queries().await.expect("Failed to acquire connection");
    assert_eq!(queries.get_account(acc1.id).await.unwrap().balance, 300);
    assert_eq!(queries.get_account(acc2.id).await.unwrap().balance, 300);
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_transfer_conserves_total_balance() {
    let store = common::setup_store().await;
    let a = common::create_account(&store, 1_000, "USD").await;
    let b = common::create_account(&store, 50, "USD").await;
    let engine = TransferEngine::new(store.clone());

    let result = engine
        .transfer(TransferParams::new(a.id, b.id, 275))
        .await
        .expect("Transfer failed");

    assert_eq!(result.from_account.balance, 725);
    assert_eq!(result.to_account.balance, 325);
    assert_eq!(
        result.from_account.balance + result.to_account.balance,
        a.balance + b.balance
    );
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_entries_match_committed_transfers() {
    let store = common::setup_store().await;
    let a = common::create_account(&store, 100, "USD").await;
    let b = common::create_account(&store, 100, "USD").await;
    let engine = TransferEngine::new(store.clone());

    let first = engine.transfer(TransferParams::new(a.id, b.id, 30)).await.unwrap();
    let second = engine.transfer(TransferParams::new(b.id, a.id, 12)).await.unwrap();

    let mut queries = store.queries().await.expect("Failed to acquire connection");
    for account in [&a, &b] {
        let entries = queries
            .list_entries(&ListEntriesParams {
                account_id: Some(account.id),
                limit: 100,
                offset: 0,
            })
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);

        let current = queries.get_account(account.id).await.unwrap();
        let sum: i64 = entries.iter().map(|e| e.amount).sum();
        assert_eq!(current.balance, account.balance + sum);
    }

    let entries_a: Vec<i64> = queries
        .list_entries(&ListEntriesParams {
            account_id: Some(a.id),
            limit: 100,
            offset: 0,
        })
        .await
        .unwrap()
        .iter()
        .map(|e| e.amount)
        .collect();
    assert_eq!(entries_a, vec![-30, 12]);

    // Each committed transfer owns exactly its two legs.
    for result in [&first, &second] {
        let transfer = queries.get_transfer(result.transfer.id).await.unwrap();
        let debit = queries.get_entry(result.from_entry.id).await.unwrap();
        let credit = queries.get_entry(result.to_entry.id).await.unwrap();

        assert_eq!(debit.account_id, transfer.from_account_id);
        assert_eq!(debit.amount, -transfer.amount);
        assert_eq!(credit.account_id, transfer.to_account_id);
        assert_eq!(credit.amount, transfer.amount);
    }

    let transfers = queries
        .list_transfers(&ListTransfersParams {
            account_id: Some(a.id),
            limit: 100,
            offset: 0,
        })
        .await
        .unwrap();
    let ids: Vec<i64> = transfers.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![first.transfer.id, second.transfer.id]);
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_missing_source_account_is_not_found_and_changes_nothing() {
    let store = common::setup_store().await;
    let a = common::create_account(&store, 300, "USD").await;
    let b = common::create_account(&store, 300, "USD").await;
    let engine = TransferEngine::new(store.clone());

    let err = engine
        .transfer(TransferParams::new(i64::MAX, b.id, 10))
        .await
        .expect_err("Transfer should fail");
    assert!(err.is_not_found(), "{err}");

    let mut queries = store.queries().await.expect("Failed to acquire connection");
    assert_eq!(queries.get_account(a.id).await.unwrap().balance, 300);
    assert_eq!(queries.get_account(b.id).await.unwrap().balance, 300);

    let entries = queries
        .list_entries(&ListEntriesParams {
            account_id: Some(b.id),
            ..ListEntriesParams::default()
        })
        .await
        .unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_rejected_overdraft_leaves_no_trace() {
    let store = common::setup_store().await;
    let a = common::create_account(&store, 20, "USD").await;
    let b = common::create_account(&store, 0, "USD").await;
    let engine = TransferEngine::new(store.clone()).with_policy(TransferPolicy {
        balance_floor: BalanceFloor::NonNegative,
        ..TransferPolicy::default()
    });

    let err = engine
        .transfer(TransferParams::new(a.id, b.id, 50))
        .await
        .expect_err("Overdraft should be rejected");
    assert!(matches!(err, AppError::InsufficientFunds { .. }), "{err}");

    let mut queries = store.queries().await.expect("Failed to acquire connection");
    assert_eq!(queries.get_account(a.id).await.unwrap().balance, 20);
    assert_eq!(queries.get_account(b.id).await.unwrap().balance, 0);

    let entries = queries
        .list_entries(&ListEntriesParams {
            account_id: Some(a.id),
            ..ListEntriesParams::default()
        })
        .await
        .unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_cancelled_transfer_leaves_no_writes() {
    let store = common::setup_store().await;
    let a = common::create_account(&store, 300, "USD").await;
    let b = common::create_account(&store, 300, "USD").await;
    let engine = TransferEngine::new(store.clone());

    // Hold b's row lock so the transfer blocks on its second balance update.
    let mut blocker = store.begin().await.expect("Failed to begin");
    blocker
        .add_account_balance(&AddAccountBalanceParams { id: b.id, amount: 0 })
        .await
        .expect("Failed to lock account");

    let err = engine
        .transfer_with_timeout(TransferParams::new(a.id, b.id, 10), Duration::from_millis(200))
        .await
        .expect_err("Transfer should time out");
    assert!(matches!(err, AppError::Cancelled(_)), "{err}");

    blocker.rollback().await.expect("Failed to release lock");

    let mut queries = store.queries().await.expect("Failed to acquire connection");
    assert_eq!(queries.get_account(a.id).await.unwrap().balance, 300);
    assert_eq!(queries.get_account(b.id).await.unwrap().balance, 300);
    assert_no_ledger_rows(&store, &[a.id, b.id]).await;
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_lock_timeout_releases_blocked_transfer() {
    let store = common::setup_store()
        .await
        .with_lock_timeout(Duration::from_millis(100));
    let a = common::create_account(&store, 300, "USD").await;
    let b = common::create_account(&store, 300, "USD").await;
    let engine = TransferEngine::new(store.clone());

    let mut blocker = store.begin().await.expect("Failed to begin");
    blocker
        .add_account_balance(&AddAccountBalanceParams { id: b.id, amount: 0 })
        .await
        .expect("Failed to lock account");

    let err = engine
        .transfer(TransferParams::new(a.id, b.id, 10))
        .await
        .expect_err("Transfer should give up on the lock");
    assert!(err.is_retryable(), "{err}");

    blocker.rollback().await.expect("Failed to release lock");

    let mut queries = store.queries().await.expect("Failed to acquire connection");
    assert_eq!(queries.get_account(a.id).await.unwrap().balance, 300);
    assert_eq!(queries.get_account(b.id).await.unwrap().balance, 300);
    assert_no_ledger_rows(&store, &[a.id, b.id]).await;
}

async fn assert_no_ledger_rows(store: &PgStore, account_ids: &[i64]) {
    let mut queries = store.queries().await.expect("Failed to acquire connection");
    for &account_id in account_ids {
        let entries = queries
            .list_entries(&ListEntriesParams {
                account_id: Some(account_id),
                ..ListEntriesParams::default()
            })
            .await
            .unwrap();
        assert!(entries.is_empty(), "account {account_id} has entries");

        let transfers = queries
            .list_transfers(&ListTransfersParams {
                account_id: Some(account_id),
                ..ListTransfersParams::default()
            })
            .await
            .unwrap();
        assert!(transfers.is_empty(), "account {account_id} has transfers");
    }
}
