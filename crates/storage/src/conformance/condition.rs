use std::future::Future;

use super::{make_key, make_put, read_status, seed, TestResult, CONFORMANCE_TABLE};
use crate::record::AttributeValue;
use crate::write::{Condition, UpdateItem};
use crate::{RecordStore, StorageError};

pub(super) async fn run_condition_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "condition",
        "put_not_exists_creates_missing_item",
        put_not_exists_creates_missing_item(factory).await,
    ));
    results.push(TestResult::from_result(
        "condition",
        "put_not_exists_rejects_existing_item",
        put_not_exists_rejects_existing_item(factory).await,
    ));
    results.push(TestResult::from_result(
        "condition",
        "update_exists_applies_to_existing_item",
        update_exists_applies_to_existing_item(factory).await,
    ));
    results.push(TestResult::from_result(
        "condition",
        "update_exists_rejects_missing_item",
        update_exists_rejects_missing_item(factory).await,
    ));
    results.push(TestResult::from_result(
        "condition",
        "unconditional_update_creates_item",
        unconditional_update_creates_item(factory).await,
    ));
    results.push(TestResult::from_result(
        "condition",
        "single_update_exists_reports_conditional_failure",
        single_update_exists_reports_conditional_failure(factory).await,
    ));

    results
}

// ── 1. KeyNotExists put on an empty slot succeeds ────────────────────────────

async fn put_not_exists_creates_missing_item<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.transact_write(vec![make_put("EC2.1", "f-1#e-1", "IN_PROGRESS")
        .with_condition(Condition::KeyNotExists)
        .into()])
        .await
        .map_err(|e| format!("conditional put: {e}"))?;

    match read_status(&s, "EC2.1", "f-1#e-1").await? {
        Some(status) if status == "IN_PROGRESS" => Ok(()),
        other => Err(format!("expected status IN_PROGRESS, got {other:?}")),
    }
}

// ── 2. KeyNotExists put on an occupied slot is cancelled, item untouched ─────

async fn put_not_exists_rejects_existing_item<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "EC2.1", "f-1#e-1", "IN_PROGRESS").await?;

    let result = s
        .transact_write(vec![make_put("EC2.1", "f-1#e-1", "SUCCESS")
            .with_condition(Condition::KeyNotExists)
            .into()])
        .await;
    match result {
        Err(ref e) if e.item_failed_condition(0) => {}
        other => return Err(format!("expected conditional cancellation, got {other:?}")),
    }

    match read_status(&s, "EC2.1", "f-1#e-1").await? {
        Some(status) if status == "IN_PROGRESS" => Ok(()),
        other => Err(format!("existing item was modified: {other:?}")),
    }
}

// ── 3. KeyExists update on an existing item applies ──────────────────────────

async fn update_exists_applies_to_existing_item<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "S3.1", "f-2", "IN_PROGRESS").await?;

    s.transact_write(vec![UpdateItem::new(CONFORMANCE_TABLE, make_key("S3.1", "f-2"))
        .set("status", AttributeValue::s("SUCCESS"))
        .with_condition(Condition::KeyExists)
        .into()])
        .await
        .map_err(|e| format!("conditional update: {e}"))?;

    match read_status(&s, "S3.1", "f-2").await? {
        Some(status) if status == "SUCCESS" => Ok(()),
        other => Err(format!("expected status SUCCESS, got {other:?}")),
    }
}

// ── 4. KeyExists update on a missing item is cancelled, nothing created ──────

async fn update_exists_rejects_missing_item<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;

    let result = s
        .transact_write(vec![UpdateItem::new(CONFORMANCE_TABLE, make_key("S3.1", "ghost"))
            .set("status", AttributeValue::s("SUCCESS"))
            .with_condition(Condition::KeyExists)
            .into()])
        .await;
    match result {
        Err(ref e) if e.item_failed_condition(0) => {}
        other => return Err(format!("expected conditional cancellation, got {other:?}")),
    }

    match read_status(&s, "S3.1", "ghost").await? {
        None => Ok(()),
        Some(status) => Err(format!("item was created with status {status}")),
    }
}

// ── 5. Unconditional single update upserts ───────────────────────────────────

async fn unconditional_update_creates_item<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.update_item(
        UpdateItem::new(CONFORMANCE_TABLE, make_key("IAM.1", "f-3"))
            .set("status", AttributeValue::s("FAILED")),
    )
    .await
    .map_err(|e| format!("update: {e}"))?;

    match read_status(&s, "IAM.1", "f-3").await? {
        Some(status) if status == "FAILED" => Ok(()),
        other => Err(format!("expected status FAILED, got {other:?}")),
    }
}

// ── 6. Single conditional update reports ConditionalCheckFailed ──────────────

async fn single_update_exists_reports_conditional_failure<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let result = s
        .update_item(
            UpdateItem::new(CONFORMANCE_TABLE, make_key("IAM.1", "ghost"))
                .set("status", AttributeValue::s("FAILED"))
                .with_condition(Condition::KeyExists),
        )
        .await;
    match result {
        Err(StorageError::ConditionalCheckFailed { .. }) => Ok(()),
        other => Err(format!("expected ConditionalCheckFailed, got {other:?}")),
    }
}
