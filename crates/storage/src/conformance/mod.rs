//! Conformance test suite for `RecordStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any `RecordStore`
//! implementation can run to verify it honours the contract the remediation
//! status engine relies on. The suite covers:
//!
//! - **Conditions**: `KeyExists` / `KeyNotExists` on puts and updates
//! - **Transactions**: all-or-nothing semantics and per-item cancellation reasons
//! - **Error handling**: correct error variants for invalid requests
//! - **Concurrency**: racing conditional creates produce exactly one winner
//!
//! # Required schema
//!
//! The factory must return a store in which the table [`CONFORMANCE_TABLE`]
//! exists, is empty, and is keyed by partition key [`PARTITION_KEY`] and sort
//! key [`SORT_KEY`] (both strings).
//!
//! # Usage
//!
//! ```ignore
//! use remediation_storage::conformance::{run_conformance_suite, CONFORMANCE_TABLE};
//!
//! #[tokio::test]
//! async fn dynamodb_local_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_fresh_dynamodb_local_table(CONFORMANCE_TABLE).await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod concurrent;
mod condition;
mod error;
mod transact;

use std::fmt;
use std::future::Future;

use crate::record::{AttributeValue, Item, ItemKey};
use crate::write::PutItem;
use crate::RecordStore;

/// Table the suite reads and writes.
pub const CONFORMANCE_TABLE: &str = "conformance-records";
/// Partition key attribute name of [`CONFORMANCE_TABLE`].
pub const PARTITION_KEY: &str = "pk";
/// Sort key attribute name of [`CONFORMANCE_TABLE`].
pub const SORT_KEY: &str = "sk";

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "condition", "transact").
    pub category: String,
    /// Test name (e.g. "put_not_exists_rejects_existing_item").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(condition::run_condition_tests(&factory).await);
    results.extend(transact::run_transact_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn make_key(pk: &str, sk: &str) -> ItemKey {
    ItemKey::new(PARTITION_KEY, pk, SORT_KEY, sk)
}

fn make_put(pk: &str, sk: &str, status: &str) -> PutItem {
    let mut attributes = Item::new();
    attributes.insert("status".to_string(), AttributeValue::s(status));
    PutItem::new(CONFORMANCE_TABLE, make_key(pk, sk), attributes)
}

/// Read the `status` attribute of an item, `None` if the item is missing.
async fn read_status<S: RecordStore>(s: &S, pk: &str, sk: &str) -> Result<Option<String>, String> {
    let item = s
        .get_item(CONFORMANCE_TABLE, &make_key(pk, sk))
        .await
        .map_err(|e| format!("get {pk}/{sk}: {e}"))?;
    Ok(item.and_then(|i| i.get("status").and_then(|v| v.as_s().map(str::to_string))))
}

/// Seed an item with an unconditional single-put transaction.
async fn seed<S: RecordStore>(s: &S, pk: &str, sk: &str, status: &str) -> Result<(), String> {
    s.transact_write(vec![make_put(pk, sk, status).into()])
        .await
        .map_err(|e| format!("seed {pk}/{sk}: {e}"))
}
