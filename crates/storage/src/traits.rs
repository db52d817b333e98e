use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{Item, ItemKey};
use crate::write::{TransactWriteItem, UpdateItem};

/// The storage trait consumed by the remediation status engine.
///
/// A `RecordStore` is a key-value store of [`Item`]s grouped into tables,
/// each table keyed by a string partition key plus a string sort key. It must
/// provide single-item reads, single-item updates, and atomic multi-item
/// conditional writes.
///
/// ## Transaction Semantics
///
/// `transact_write` is all-or-nothing. Every item's condition is evaluated
/// against the state before the transaction; if any condition fails, nothing
/// is written and the call returns
/// `Err(StorageError::TransactionCanceled { reasons })` with exactly one
/// reason per submitted item, in submission order. An item whose condition
/// held reports `CancellationReason::None`.
///
/// ## Retries
///
/// Implementations own their retry and timeout policy. Callers never retry a
/// `StorageError`.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so they can be shared
/// across async task boundaries.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Read one item by key. Returns `Ok(None)` if the item does not exist.
    async fn get_item(&self, table: &str, key: &ItemKey) -> Result<Option<Item>, StorageError>;

    /// Apply all writes atomically, or none of them.
    async fn transact_write(&self, items: Vec<TransactWriteItem>) -> Result<(), StorageError>;

    /// Apply a single update outside any transaction.
    ///
    /// An unconditional update creates the item if it does not exist. A failed
    /// condition returns `Err(StorageError::ConditionalCheckFailed)`.
    async fn update_item(&self, update: UpdateItem) -> Result<(), StorageError>;
}
