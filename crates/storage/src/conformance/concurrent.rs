use std::future::Future;
use std::sync::Arc;

use super::{make_key, make_put, read_status, seed, TestResult, CONFORMANCE_TABLE};
use crate::record::AttributeValue;
use crate::write::{Condition, UpdateItem};
use crate::{RecordStore, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_conditional_create_exactly_one_wins",
        concurrent_conditional_create_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_creates_different_keys_all_succeed",
        concurrent_creates_different_keys_all_succeed(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_dual_updates_never_split",
        concurrent_dual_updates_never_split(factory).await,
    ));

    results
}

// ── Concurrent conditional create: exactly one wins ─────────────────────────

/// N tasks race a `KeyNotExists` put on the same key. Exactly one succeeds;
/// the rest must observe a conditional cancellation, and the stored item is
/// the winner's.
async fn concurrent_conditional_create_exactly_one_wins<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let status = format!("writer-{i}");
            let result = s
                .transact_write(vec![make_put("EC2.1", "f-1#e-1", &status)
                    .with_condition(Condition::KeyNotExists)
                    .into()])
                .await;
            match result {
                Ok(()) => Ok(Some(status)), // won the race
                Err(e) if e.item_failed_condition(0) => Ok(None), // lost the race
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = Vec::new();
    let mut losers = 0usize;
    for handle in handles {
        let outcome = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        match outcome {
            Some(status) => winners.push(status),
            None => losers += 1,
        }
    }

    if winners.len() != 1 {
        return Err(format!("expected exactly 1 winner, got {}", winners.len()));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }
    match read_status(storage.as_ref(), "EC2.1", "f-1#e-1").await? {
        Some(status) if status == winners[0] => Ok(()),
        other => Err(format!(
            "stored item {other:?} does not match winner {}",
            winners[0]
        )),
    }
}

// ── Concurrent creates on different keys: all succeed ───────────────────────

/// N tasks each create a different key. All should succeed, with no false
/// conflicts when there is no contention.
async fn concurrent_creates_different_keys_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            s.transact_write(vec![make_put("EC2.1", &format!("f-1#e-{i}"), "IN_PROGRESS")
                .with_condition(Condition::KeyNotExists)
                .into()])
                .await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        handle
            .await
            .map_err(|e| format!("task {i} panic: {e}"))?
            .map_err(|e| format!("task {i} failed: {e}"))?;
    }

    for i in 0..N {
        if read_status(storage.as_ref(), "EC2.1", &format!("f-1#e-{i}"))
            .await?
            .is_none()
        {
            return Err(format!("f-1#e-{i} missing after concurrent create"));
        }
    }
    Ok(())
}

// ── Concurrent dual updates: the two items never diverge ────────────────────

/// N tasks each update two items in one transaction to the same task-specific
/// value. Whatever order they commit in, both items end up with the value
/// written by the same (last) transaction.
async fn concurrent_dual_updates_never_split<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    seed(storage.as_ref(), "S3.1", "f-2", "NOT_STARTED").await?;
    seed(storage.as_ref(), "S3.1", "f-2#e-1", "NOT_STARTED").await?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let value = AttributeValue::s(format!("writer-{i}"));
            s.transact_write(vec![
                UpdateItem::new(CONFORMANCE_TABLE, make_key("S3.1", "f-2"))
                    .set("status", value.clone())
                    .with_condition(Condition::KeyExists)
                    .into(),
                UpdateItem::new(CONFORMANCE_TABLE, make_key("S3.1", "f-2#e-1"))
                    .set("status", value)
                    .with_condition(Condition::KeyExists)
                    .into(),
            ])
            .await
        }));
    }

    // Backends may legitimately reject some racing transactions (e.g. a
    // transaction conflict); a split result is never acceptable.
    for handle in handles {
        handle.await.map_err(|e| format!("task panic: {e}"))?.ok();
    }

    let finding = read_status(storage.as_ref(), "S3.1", "f-2").await?;
    let history = read_status(storage.as_ref(), "S3.1", "f-2#e-1").await?;
    if finding != history {
        return Err(format!(
            "items diverged: finding {finding:?}, history {history:?}"
        ));
    }
    Ok(())
}
