use std::future::Future;

use super::{make_key, make_put, read_status, seed, TestResult, CONFORMANCE_TABLE};
use crate::error::CancellationReason;
use crate::record::AttributeValue;
use crate::write::{Condition, UpdateItem};
use crate::RecordStore;

pub(super) async fn run_transact_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "transact",
        "update_and_update_both_applied",
        update_and_update_both_applied(factory).await,
    ));
    results.push(TestResult::from_result(
        "transact",
        "second_item_failure_cancels_first",
        second_item_failure_cancels_first(factory).await,
    ));
    results.push(TestResult::from_result(
        "transact",
        "first_item_failure_reported_at_index_0",
        first_item_failure_reported_at_index_0(factory).await,
    ));
    results.push(TestResult::from_result(
        "transact",
        "every_failing_item_is_reported",
        every_failing_item_is_reported(factory).await,
    ));
    results.push(TestResult::from_result(
        "transact",
        "put_replaces_whole_item",
        put_replaces_whole_item(factory).await,
    ));

    results
}

fn status_update(pk: &str, sk: &str, status: &str) -> UpdateItem {
    UpdateItem::new(CONFORMANCE_TABLE, make_key(pk, sk)).set("status", AttributeValue::s(status))
}

// ── 1. Two conditional updates on existing items both apply ──────────────────

async fn update_and_update_both_applied<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "EC2.1", "f-1", "IN_PROGRESS").await?;
    seed(&s, "EC2.1", "f-1#e-1", "IN_PROGRESS").await?;

    s.transact_write(vec![
        status_update("EC2.1", "f-1", "SUCCESS")
            .with_condition(Condition::KeyExists)
            .into(),
        status_update("EC2.1", "f-1#e-1", "SUCCESS")
            .with_condition(Condition::KeyExists)
            .into(),
    ])
    .await
    .map_err(|e| format!("transaction: {e}"))?;

    for sk in ["f-1", "f-1#e-1"] {
        match read_status(&s, "EC2.1", sk).await? {
            Some(status) if status == "SUCCESS" => {}
            other => return Err(format!("{sk}: expected SUCCESS, got {other:?}")),
        }
    }
    Ok(())
}

// ── 2. A failing second item leaves the first item untouched ─────────────────

async fn second_item_failure_cancels_first<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "EC2.1", "f-1", "IN_PROGRESS").await?;

    let result = s
        .transact_write(vec![
            status_update("EC2.1", "f-1", "SUCCESS")
                .with_condition(Condition::KeyExists)
                .into(),
            status_update("EC2.1", "f-1#e-1", "SUCCESS")
                .with_condition(Condition::KeyExists)
                .into(),
        ])
        .await;

    let err = match result {
        Err(e) => e,
        Ok(()) => return Err("expected cancellation, transaction succeeded".to_string()),
    };
    let reasons = err
        .cancellation_reasons()
        .ok_or_else(|| format!("expected TransactionCanceled, got {err:?}"))?;
    if reasons != [CancellationReason::None, CancellationReason::ConditionalCheckFailed] {
        return Err(format!("unexpected reasons {reasons:?}"));
    }

    match read_status(&s, "EC2.1", "f-1").await? {
        Some(status) if status == "IN_PROGRESS" => Ok(()),
        other => Err(format!("first item changed despite cancellation: {other:?}")),
    }
}

// ── 3. A failing first item is reported at index 0 only ──────────────────────

async fn first_item_failure_reported_at_index_0<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "EC2.1", "f-1#e-1", "IN_PROGRESS").await?;

    let result = s
        .transact_write(vec![
            status_update("EC2.1", "missing", "SUCCESS")
                .with_condition(Condition::KeyExists)
                .into(),
            status_update("EC2.1", "f-1#e-1", "SUCCESS")
                .with_condition(Condition::KeyExists)
                .into(),
        ])
        .await;

    match result {
        Err(ref e) if e.item_failed_condition(0) && !e.item_failed_condition(1) => {}
        other => return Err(format!("expected failure on index 0 only, got {other:?}")),
    }
    match read_status(&s, "EC2.1", "f-1#e-1").await? {
        Some(status) if status == "IN_PROGRESS" => Ok(()),
        other => Err(format!("second item changed despite cancellation: {other:?}")),
    }
}

// ── 4. Both items failing are both reported ──────────────────────────────────

async fn every_failing_item_is_reported<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "EC2.1", "f-1#e-1", "IN_PROGRESS").await?;

    let result = s
        .transact_write(vec![
            status_update("EC2.1", "missing", "SUCCESS")
                .with_condition(Condition::KeyExists)
                .into(),
            make_put("EC2.1", "f-1#e-1", "SUCCESS")
                .with_condition(Condition::KeyNotExists)
                .into(),
        ])
        .await;

    match result {
        Err(ref e) if e.item_failed_condition(0) && e.item_failed_condition(1) => Ok(()),
        other => Err(format!("expected failure on both items, got {other:?}")),
    }
}

// ── 5. An unconditional put replaces every attribute ─────────────────────────

async fn put_replaces_whole_item<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.transact_write(vec![status_update("S3.1", "f-9", "IN_PROGRESS")
        .set("error", AttributeValue::s("boom"))
        .into()])
        .await
        .map_err(|e| format!("seed with error: {e}"))?;
    seed(&s, "S3.1", "f-9", "SUCCESS").await?;

    let item = s
        .get_item(CONFORMANCE_TABLE, &make_key("S3.1", "f-9"))
        .await
        .map_err(|e| format!("get: {e}"))?
        .ok_or("item missing after put")?;
    if item.contains_key("error") {
        return Err("put kept an attribute from the replaced item".to_string());
    }
    match item.get("status").and_then(|v| v.as_s()) {
        Some("SUCCESS") => Ok(()),
        other => Err(format!("expected status SUCCESS, got {other:?}")),
    }
}
