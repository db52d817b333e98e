//! DynamoDB-backed `RecordStore`.
//!
//! Maps the item model onto `aws_sdk_dynamodb` requests:
//! - conditions render as `attribute_exists(#pk) AND attribute_exists(#sk)`
//!   (or the `attribute_not_exists` form) with name placeholders,
//! - `TransactionCanceledException` cancellation reasons become
//!   [`CancellationReason`]s in submission order,
//! - every other SDK failure becomes [`StorageError::Backend`].
//!
//! Retries and timeouts are whatever the supplied SDK config specifies.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::{
    AttributeValue as DdbValue, CancellationReason as DdbReason, Put,
    TransactWriteItem as DdbWriteItem, Update,
};
use aws_sdk_dynamodb::Client;
use tracing::{debug, instrument};

use crate::error::{CancellationReason, StorageError};
use crate::record::{AttributeValue, Item, ItemKey};
use crate::traits::RecordStore;
use crate::write::{PutItem, TransactWriteItem, UpdateItem};

/// A `RecordStore` over a DynamoDB client.
#[derive(Clone)]
pub struct DynamoDbStore {
    client: Client,
}

impl DynamoDbStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the default AWS config chain.
    ///
    /// `endpoint_url` points the client at DynamoDB Local or another
    /// compatible endpoint.
    pub async fn from_env(region: Option<String>, endpoint_url: Option<String>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region));
        }
        if let Some(endpoint) = endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;
        Self::new(Client::new(&config))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn to_ddb_value(value: &AttributeValue) -> DdbValue {
    match value {
        AttributeValue::S(s) => DdbValue::S(s.clone()),
        AttributeValue::N(n) => DdbValue::N(n.clone()),
    }
}

fn to_ddb_item(item: &Item) -> HashMap<String, DdbValue> {
    item.iter()
        .map(|(name, value)| (name.clone(), to_ddb_value(value)))
        .collect()
}

/// Attributes of types the item model does not carry are skipped.
fn from_ddb_item(item: &HashMap<String, DdbValue>) -> Item {
    item.iter()
        .filter_map(|(name, value)| {
            let converted = match value {
                DdbValue::S(s) => AttributeValue::S(s.clone()),
                DdbValue::N(n) => AttributeValue::N(n.clone()),
                _ => {
                    debug!(attribute = %name, "skipping non-scalar attribute");
                    return None;
                }
            };
            Some((name.clone(), converted))
        })
        .collect()
}

fn non_empty<V>(map: BTreeMap<String, V>) -> Option<HashMap<String, V>> {
    if map.is_empty() {
        None
    } else {
        Some(map.into_iter().collect())
    }
}

fn build_put(put: &PutItem) -> Result<Put, StorageError> {
    let rendered = put.render();
    Put::builder()
        .table_name(&put.table)
        .set_item(Some(to_ddb_item(&put.item)))
        .set_condition_expression(rendered.condition_expression)
        .set_expression_attribute_names(non_empty(rendered.names))
        .build()
        .map_err(|e| StorageError::InvalidRequest(format!("put on {}: {e}", put.table)))
}

fn build_update(update: &UpdateItem) -> Result<Update, StorageError> {
    let rendered = update.render();
    let values = rendered
        .values
        .iter()
        .map(|(ph, value)| (ph.clone(), to_ddb_value(value)))
        .collect::<BTreeMap<_, _>>();
    Update::builder()
        .table_name(&update.table)
        .set_key(Some(to_ddb_item(&update.key.to_item())))
        .set_update_expression(rendered.update_expression)
        .set_condition_expression(rendered.condition_expression)
        .set_expression_attribute_names(non_empty(rendered.names))
        .set_expression_attribute_values(non_empty(values))
        .build()
        .map_err(|e| StorageError::InvalidRequest(format!("update on {}: {e}", update.table)))
}

/// One reason per submitted item, in submission order.
fn cancellation_reasons(reasons: &[DdbReason]) -> Vec<CancellationReason> {
    reasons
        .iter()
        .map(|r| CancellationReason::from_code(r.code()))
        .collect()
}

fn map_transact_error(err: SdkError<TransactWriteItemsError>, tables: String) -> StorageError {
    match err.into_service_error() {
        TransactWriteItemsError::TransactionCanceledException(e) => {
            StorageError::TransactionCanceled {
                reasons: cancellation_reasons(e.cancellation_reasons()),
            }
        }
        TransactWriteItemsError::ResourceNotFoundException(_) => {
            StorageError::TableNotFound { table: tables }
        }
        other => StorageError::Backend(DisplayErrorContext(&other).to_string()),
    }
}

#[async_trait]
impl RecordStore for DynamoDbStore {
    #[instrument(
        skip(self, key),
        fields(table = %table, pk = %key.partition_value, sk = %key.sort_value)
    )]
    async fn get_item(&self, table: &str, key: &ItemKey) -> Result<Option<Item>, StorageError> {
        let output = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(to_ddb_item(&key.to_item())))
            .consistent_read(true)
            .send()
            .await
            .map_err(|err| match err.into_service_error() {
                GetItemError::ResourceNotFoundException(_) => StorageError::TableNotFound {
                    table: table.to_string(),
                },
                other => StorageError::Backend(DisplayErrorContext(&other).to_string()),
            })?;
        Ok(output.item().map(from_ddb_item))
    }

    #[instrument(skip(self, items), fields(items = items.len()))]
    async fn transact_write(&self, items: Vec<TransactWriteItem>) -> Result<(), StorageError> {
        let tables = items
            .iter()
            .map(TransactWriteItem::table)
            .collect::<Vec<_>>()
            .join(",");
        let writes = items
            .iter()
            .map(|write| {
                Ok(match write {
                    TransactWriteItem::Put(put) => {
                        DdbWriteItem::builder().put(build_put(put)?).build()
                    }
                    TransactWriteItem::Update(update) => {
                        DdbWriteItem::builder().update(build_update(update)?).build()
                    }
                })
            })
            .collect::<Result<Vec<_>, StorageError>>()?;

        self.client
            .transact_write_items()
            .set_transact_items(Some(writes))
            .send()
            .await
            .map_err(|err| map_transact_error(err, tables))?;
        debug!("transaction committed");
        Ok(())
    }

    #[instrument(
        skip(self, update),
        fields(
            table = %update.table,
            pk = %update.key.partition_value,
            sk = %update.key.sort_value
        )
    )]
    async fn update_item(&self, update: UpdateItem) -> Result<(), StorageError> {
        let rendered = update.render();
        let values = rendered
            .values
            .iter()
            .map(|(ph, value)| (ph.clone(), to_ddb_value(value)))
            .collect::<BTreeMap<_, _>>();
        self.client
            .update_item()
            .table_name(&update.table)
            .set_key(Some(to_ddb_item(&update.key.to_item())))
            .set_update_expression(rendered.update_expression)
            .set_condition_expression(rendered.condition_expression)
            .set_expression_attribute_names(non_empty(rendered.names))
            .set_expression_attribute_values(non_empty(values))
            .send()
            .await
            .map_err(|err| match err.into_service_error() {
                UpdateItemError::ConditionalCheckFailedException(_) => {
                    StorageError::ConditionalCheckFailed {
                        table: update.table.clone(),
                    }
                }
                UpdateItemError::ResourceNotFoundException(_) => StorageError::TableNotFound {
                    table: update.table.clone(),
                },
                other => StorageError::Backend(DisplayErrorContext(&other).to_string()),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::write::Condition;

    fn reason(code: Option<&str>) -> DdbReason {
        DdbReason::builder().set_code(code.map(str::to_string)).build()
    }

    #[test]
    fn cancellation_reasons_keep_submission_order() {
        let reasons = cancellation_reasons(&[
            reason(Some("None")),
            reason(Some("ConditionalCheckFailed")),
            reason(None),
            reason(Some("TransactionConflict")),
        ]);
        assert_eq!(
            reasons,
            vec![
                CancellationReason::None,
                CancellationReason::ConditionalCheckFailed,
                CancellationReason::None,
                CancellationReason::Other("TransactionConflict".to_string()),
            ]
        );
    }

    #[test]
    fn conditional_update_renders_placeholders() {
        let update = UpdateItem::new(
            "findings",
            ItemKey::new("findingType", "EC2.1", "findingId", "f-1"),
        )
        .set("remediationStatus", AttributeValue::s("SUCCESS"))
        .with_condition(Condition::KeyExists);

        let built = build_update(&update).unwrap();
        assert_eq!(built.table_name(), "findings");
        assert!(built.update_expression().starts_with("SET "));
        assert!(built
            .condition_expression()
            .is_some_and(|c| c.contains("attribute_exists")));
        assert_eq!(
            built.key().get("findingId"),
            Some(&DdbValue::S("f-1".to_string()))
        );
    }
}
