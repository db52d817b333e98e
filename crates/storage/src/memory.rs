//! In-process `RecordStore` backend.
//!
//! All tables live behind a single mutex, so a transaction evaluates every
//! condition and applies every write under one lock acquisition. That gives
//! the same all-or-nothing and exactly-one-creator guarantees a managed store
//! provides, which makes this backend suitable for tests and for embedding.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::{CancellationReason, StorageError};
use crate::record::{Item, ItemKey};
use crate::traits::RecordStore;
use crate::write::{TransactWriteItem, UpdateItem};

/// In-memory record store. Cloning shares the underlying tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    tables: BTreeMap<String, MemoryTable>,
    write_calls: usize,
}

struct MemoryTable {
    partition_key: String,
    sort_key: String,
    items: BTreeMap<(String, String), Item>,
}

impl MemoryTable {
    fn slot(&self, table: &str, key: &ItemKey) -> Result<(String, String), StorageError> {
        if key.partition_name != self.partition_key || key.sort_name != self.sort_key {
            return Err(StorageError::InvalidRequest(format!(
                "key ({}, {}) does not match schema ({}, {}) of table {table}",
                key.partition_name, key.sort_name, self.partition_key, self.sort_key
            )));
        }
        Ok((key.partition_value.clone(), key.sort_value.clone()))
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table with its partition and sort key attribute names.
    /// Re-registering an existing table keeps its items.
    pub fn with_table(self, name: &str, partition_key: &str, sort_key: &str) -> Self {
        self.lock()
            .tables
            .entry(name.to_string())
            .or_insert_with(|| MemoryTable {
                partition_key: partition_key.to_string(),
                sort_key: sort_key.to_string(),
                items: BTreeMap::new(),
            });
        self
    }

    /// Seed an item directly, bypassing conditions and the write counter.
    pub fn insert(&self, table: &str, key: &ItemKey, attributes: Item) -> Result<(), StorageError> {
        let mut inner = self.lock();
        let t = table_mut(&mut inner, table)?;
        let slot = t.slot(table, key)?;
        let mut item = attributes;
        item.extend(key.to_item());
        t.items.insert(slot, item);
        Ok(())
    }

    /// Delete an item directly, bypassing conditions and the write counter.
    /// Returns the removed item, if there was one.
    pub fn remove(&self, table: &str, key: &ItemKey) -> Result<Option<Item>, StorageError> {
        let mut inner = self.lock();
        let t = table_mut(&mut inner, table)?;
        let slot = t.slot(table, key)?;
        Ok(t.items.remove(&slot))
    }

    /// Snapshot of every item in `table`, in key order.
    pub fn items(&self, table: &str) -> Vec<Item> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.items.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of write calls (`transact_write` and `update_item`) received,
    /// successful or not.
    pub fn write_calls(&self) -> usize {
        self.lock().write_calls
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn table_mut<'a>(
    inner: &'a mut MemoryInner,
    table: &str,
) -> Result<&'a mut MemoryTable, StorageError> {
    inner
        .tables
        .get_mut(table)
        .ok_or_else(|| StorageError::TableNotFound {
            table: table.to_string(),
        })
}

fn apply_update(t: &mut MemoryTable, slot: (String, String), update: &UpdateItem) {
    let item = t
        .items
        .entry(slot)
        .or_insert_with(|| update.key.to_item());
    for (name, value) in &update.set {
        item.insert(name.clone(), value.clone());
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_item(&self, table: &str, key: &ItemKey) -> Result<Option<Item>, StorageError> {
        let mut inner = self.lock();
        let t = table_mut(&mut inner, table)?;
        let slot = t.slot(table, key)?;
        Ok(t.items.get(&slot).cloned())
    }

    async fn transact_write(&self, items: Vec<TransactWriteItem>) -> Result<(), StorageError> {
        let mut inner = self.lock();
        inner.write_calls += 1;

        if items.is_empty() {
            return Err(StorageError::InvalidRequest(
                "transaction must contain at least one item".to_string(),
            ));
        }

        // Resolve every target first; a transaction may touch an item only once.
        let mut targets = Vec::with_capacity(items.len());
        let mut seen = HashSet::new();
        for write in &items {
            let table = write.table();
            let slot = table_mut(&mut inner, table)?.slot(table, write.key())?;
            if !seen.insert((table.to_string(), slot.clone())) {
                return Err(StorageError::InvalidRequest(format!(
                    "transaction touches {table} ({}, {}) more than once",
                    slot.0, slot.1
                )));
            }
            targets.push(slot);
        }

        // Evaluate all conditions against the pre-transaction state.
        let mut reasons = Vec::with_capacity(items.len());
        for (write, slot) in items.iter().zip(&targets) {
            let exists = inner
                .tables
                .get(write.table())
                .is_some_and(|t| t.items.contains_key(slot));
            let held = write.condition().map_or(true, |c| c.holds(exists));
            reasons.push(if held {
                CancellationReason::None
            } else {
                CancellationReason::ConditionalCheckFailed
            });
        }
        if reasons.iter().any(CancellationReason::is_conditional_failure) {
            return Err(StorageError::TransactionCanceled { reasons });
        }

        for (write, slot) in items.into_iter().zip(targets) {
            let t = table_mut(&mut inner, write.table())?;
            match write {
                TransactWriteItem::Put(put) => {
                    t.items.insert(slot, put.item);
                }
                TransactWriteItem::Update(update) => apply_update(t, slot, &update),
            }
        }
        Ok(())
    }

    async fn update_item(&self, update: UpdateItem) -> Result<(), StorageError> {
        let mut inner = self.lock();
        inner.write_calls += 1;

        let t = table_mut(&mut inner, &update.table)?;
        let slot = t.slot(&update.table, &update.key)?;
        let exists = t.items.contains_key(&slot);
        if let Some(condition) = update.condition {
            if !condition.holds(exists) {
                return Err(StorageError::ConditionalCheckFailed {
                    table: update.table.clone(),
                });
            }
        }
        apply_update(t, slot, &update);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AttributeValue;
    use crate::write::{Condition, PutItem};

    fn store() -> MemoryStore {
        MemoryStore::new().with_table("findings", "findingType", "findingId")
    }

    fn key(id: &str) -> ItemKey {
        ItemKey::new("findingType", "EC2.1", "findingId", id)
    }

    #[tokio::test]
    async fn get_missing_item_returns_none() {
        let s = store();
        assert!(s.get_item("findings", &key("f-1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_table_is_reported() {
        let s = store();
        let err = s.get_item("nope", &key("f-1")).await.unwrap_err();
        assert!(matches!(err, StorageError::TableNotFound { table } if table == "nope"));
    }

    #[tokio::test]
    async fn mismatched_key_schema_is_invalid() {
        let s = store();
        let bad = ItemKey::new("pk", "a", "sk", "b");
        let err = s.get_item("findings", &bad).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn unconditional_update_upserts() {
        let s = store();
        s.update_item(
            UpdateItem::new("findings", key("f-1"))
                .set("remediationStatus", AttributeValue::s("SUCCESS")),
        )
        .await
        .unwrap();

        let item = s.get_item("findings", &key("f-1")).await.unwrap().unwrap();
        assert_eq!(item["remediationStatus"].as_s(), Some("SUCCESS"));
        assert_eq!(item["findingId"].as_s(), Some("f-1"));
        assert_eq!(s.write_calls(), 1);
    }

    #[tokio::test]
    async fn conditional_update_on_missing_item_fails() {
        let s = store();
        let err = s
            .update_item(
                UpdateItem::new("findings", key("f-1"))
                    .set("remediationStatus", AttributeValue::s("SUCCESS"))
                    .with_condition(Condition::KeyExists),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ConditionalCheckFailed { .. }));
        assert!(s.items("findings").is_empty());
    }

    #[tokio::test]
    async fn failed_transaction_writes_nothing() {
        let s = store();
        s.insert("findings", &key("f-2"), Item::new()).unwrap();

        let err = s
            .transact_write(vec![
                PutItem::new("findings", key("f-1"), Item::new()).into(),
                PutItem::new("findings", key("f-2"), Item::new())
                    .with_condition(Condition::KeyNotExists)
                    .into(),
            ])
            .await
            .unwrap_err();

        assert_eq!(
            err.cancellation_reasons().unwrap(),
            &[
                CancellationReason::None,
                CancellationReason::ConditionalCheckFailed
            ]
        );
        assert!(s.get_item("findings", &key("f-1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_targets_are_rejected() {
        let s = store();
        let err = s
            .transact_write(vec![
                PutItem::new("findings", key("f-1"), Item::new()).into(),
                UpdateItem::new("findings", key("f-1")).into(),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn empty_transaction_is_rejected() {
        let s = store();
        let err = s.transact_write(Vec::new()).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn remove_deletes_without_counting_a_write() {
        let s = store();
        s.insert("findings", &key("f-1"), Item::new()).unwrap();

        let removed = s.remove("findings", &key("f-1")).unwrap();
        assert_eq!(removed.unwrap()["findingId"].as_s(), Some("f-1"));
        assert!(s.remove("findings", &key("f-1")).unwrap().is_none());
        assert!(s.get_item("findings", &key("f-1")).await.unwrap().is_none());
        assert_eq!(s.write_calls(), 0);
    }

    #[tokio::test]
    async fn clones_share_tables() {
        let s = store();
        let other = s.clone();
        other.insert("findings", &key("f-1"), Item::new()).unwrap();
        assert_eq!(s.items("findings").len(), 1);
    }
}
