use std::future::Future;

use super::{make_key, make_put, seed, TestResult, CONFORMANCE_TABLE};
use crate::write::Condition;
use crate::{RecordStore, StorageError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "error",
        "get_nonexistent_item_is_none",
        get_nonexistent_item_is_none(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "get_unknown_table_is_table_not_found",
        get_unknown_table_is_table_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "conditional_failure_is_not_a_backend_error",
        conditional_failure_is_not_a_backend_error(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "cancellation_reports_one_reason_per_item",
        cancellation_reports_one_reason_per_item(factory).await,
    ));

    results
}

// ── 1. Missing item is Ok(None), not an error ────────────────────────────────

async fn get_nonexistent_item_is_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_item(CONFORMANCE_TABLE, &make_key("EC2.1", "nope")).await {
        Ok(None) => Ok(()),
        other => Err(format!("expected Ok(None), got {other:?}")),
    }
}

// ── 2. Unknown table surfaces TableNotFound with the table name ──────────────

async fn get_unknown_table_is_table_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s
        .get_item("conformance-no-such-table", &make_key("EC2.1", "f-1"))
        .await
    {
        Err(StorageError::TableNotFound { table }) if table == "conformance-no-such-table" => {
            Ok(())
        }
        other => Err(format!("expected TableNotFound, got {other:?}")),
    }
}

// ── 3. A failed condition is a cancellation, never Backend ───────────────────

async fn conditional_failure_is_not_a_backend_error<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "EC2.1", "f-1", "SUCCESS").await?;
    let result = s
        .transact_write(vec![make_put("EC2.1", "f-1", "FAILED")
            .with_condition(Condition::KeyNotExists)
            .into()])
        .await;
    match result {
        Err(StorageError::TransactionCanceled { .. }) => Ok(()),
        other => Err(format!("expected TransactionCanceled, got {other:?}")),
    }
}

// ── 4. Cancellation carries exactly one reason per submitted item ────────────

async fn cancellation_reports_one_reason_per_item<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "EC2.1", "f-3", "SUCCESS").await?;
    let result = s
        .transact_write(vec![
            make_put("EC2.1", "f-1", "FAILED").into(),
            make_put("EC2.1", "f-2", "FAILED").into(),
            make_put("EC2.1", "f-3", "FAILED")
                .with_condition(Condition::KeyNotExists)
                .into(),
        ])
        .await;
    match result {
        Err(StorageError::TransactionCanceled { reasons }) if reasons.len() == 3 => Ok(()),
        other => Err(format!("expected 3 cancellation reasons, got {other:?}")),
    }
}
