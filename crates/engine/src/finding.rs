use std::collections::BTreeMap;

use remediation_storage::{
    AttributeValue, Condition, Item, ItemKey, RecordStore, StorageError, UpdateItem,
};
use tracing::warn;

use crate::config::EngineConfig;
use crate::request::RemediationUpdateRequest;
use crate::schema;

/// Metadata harvested from a finding record for history enrichment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialFindingData {
    pub account_id: Option<String>,
    pub resource_id: Option<String>,
    pub resource_type: Option<String>,
    pub severity: Option<String>,
    pub region: Option<String>,
    pub last_updated_by: Option<String>,
    /// Any other data attributes of the finding, e.g. `resourceTypeNormalized`.
    pub extra: BTreeMap<String, String>,
}

impl PartialFindingData {
    /// Named metadata as (attribute, value) pairs, skipping absent values.
    pub fn metadata(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            (schema::ACCOUNT_ID, &self.account_id),
            (schema::RESOURCE_ID, &self.resource_id),
            (schema::RESOURCE_TYPE, &self.resource_type),
            (schema::SEVERITY, &self.severity),
            (schema::REGION, &self.region),
            (schema::LAST_UPDATED_BY, &self.last_updated_by),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_deref().map(|v| (name, v)))
    }
}

/// Access to the findings table: one current-status record per
/// `(findingType, findingId)`.
///
/// Records are created by the ingestion path; this store only reads and
/// updates them.
#[derive(Debug, Clone)]
pub struct FindingRecordStore {
    table: String,
    scan_helper_attribute: String,
}

impl FindingRecordStore {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            table: config.findings_table.clone(),
            scan_helper_attribute: config.finding_scan_helper_attribute.clone(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn key(&self, finding_type: &str, finding_id: &str) -> ItemKey {
        ItemKey::new(schema::FINDING_TYPE, finding_type, schema::FINDING_ID, finding_id)
    }

    /// Read a finding. A failed lookup is logged and reported as absent.
    pub async fn get<S: RecordStore>(
        &self,
        store: &S,
        finding_type: &str,
        finding_id: &str,
    ) -> Option<Item> {
        match store
            .get_item(&self.table, &self.key(finding_type, finding_id))
            .await
        {
            Ok(item) => item,
            Err(e) => {
                warn!(
                    finding_type = %finding_type,
                    finding_id = %finding_id,
                    error = %e,
                    "Error retrieving finding data"
                );
                None
            }
        }
    }

    /// Read a finding and extract its enrichment metadata.
    pub async fn get_partial<S: RecordStore>(
        &self,
        store: &S,
        finding_type: &str,
        finding_id: &str,
    ) -> Option<PartialFindingData> {
        self.get(store, finding_type, finding_id)
            .await
            .map(|item| self.extract_partial(&item))
    }

    /// Split a finding item into named metadata and extra data attributes.
    ///
    /// Protocol attributes, the findings table's scan sentinel, composite
    /// index helpers (names containing `#`) and non-string values are not
    /// carried over.
    pub fn extract_partial(&self, item: &Item) -> PartialFindingData {
        let text = |name: &str| {
            item.get(name)
                .and_then(AttributeValue::as_s)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let extra = item
            .iter()
            .filter(|(name, _)| {
                !schema::METADATA_ATTRIBUTES.contains(&name.as_str())
                    && !schema::PROTOCOL_ATTRIBUTES.contains(&name.as_str())
                    && name.as_str() != self.scan_helper_attribute
                    && !name.contains('#')
            })
            .filter_map(|(name, value)| value.as_s().map(|v| (name.clone(), v.to_string())))
            .collect();

        PartialFindingData {
            account_id: text(schema::ACCOUNT_ID),
            resource_id: text(schema::RESOURCE_ID),
            resource_type: text(schema::RESOURCE_TYPE),
            severity: text(schema::SEVERITY),
            region: text(schema::REGION),
            last_updated_by: text(schema::LAST_UPDATED_BY),
            extra,
        }
    }

    /// Status update for the finding: status, execution id, and error when
    /// the request carries one. A previous error is left in place otherwise.
    pub fn build_update_item(
        &self,
        request: &RemediationUpdateRequest,
        condition: Option<Condition>,
    ) -> UpdateItem {
        let update = UpdateItem::new(
            &self.table,
            self.key(&request.finding_type, &request.finding_id),
        )
        .set(
            schema::REMEDIATION_STATUS,
            AttributeValue::s(&request.remediation_status),
        )
        .set_if_present(schema::EXECUTION_ID, Some(request.execution_id.as_str()))
        .set_if_present(schema::ERROR, request.error.as_deref());
        match condition {
            Some(c) => update.with_condition(c),
            None => update,
        }
    }

    /// Unconditional, non-transactional status update.
    pub async fn update<S: RecordStore>(
        &self,
        store: &S,
        request: &RemediationUpdateRequest,
    ) -> Result<(), StorageError> {
        store.update_item(self.build_update_item(request, None)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remediation_storage::MemoryStore;

    fn config() -> EngineConfig {
        EngineConfig {
            findings_table: "findings".to_string(),
            history_table: "history".to_string(),
            ..EngineConfig::default()
        }
    }

    fn item(pairs: &[(&str, &str)]) -> Item {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), AttributeValue::s(*v)))
            .collect()
    }

    #[test]
    fn extract_splits_metadata_and_extras() {
        let findings = FindingRecordStore::new(&config());
        let mut finding = item(&[
            ("findingType", "S3.1"),
            ("findingId", "f-1"),
            ("accountId", "123456789012"),
            ("resourceId", "bucket-name"),
            ("severity", "HIGH"),
            ("resourceTypeNormalized", "S3Bucket"),
            ("remediationStatus", "FAILED"),
            ("error", "old error"),
            ("FINDING_CONSTANT", "finding"),
            ("securityHubUpdatedAtTime#findingId", "2024-01-01T00:00:00Z#f-1"),
        ]);
        finding.insert("suppressed".to_string(), AttributeValue::n(0));

        let partial = findings.extract_partial(&finding);
        assert_eq!(partial.account_id.as_deref(), Some("123456789012"));
        assert_eq!(partial.severity.as_deref(), Some("HIGH"));
        assert!(partial.region.is_none());
        assert_eq!(
            partial.extra.keys().collect::<Vec<_>>(),
            vec!["resourceTypeNormalized"]
        );
        assert_eq!(partial.metadata().count(), 3);
    }

    #[test]
    fn update_item_sets_status_execution_and_error() {
        let findings = FindingRecordStore::new(&config());
        let request = RemediationUpdateRequest::new("f-1", "e-1", "EC2.1", "FAILED")
            .with_error("Lambda function timeout");

        let update = findings.build_update_item(&request, Some(Condition::KeyExists));
        assert_eq!(update.table, "findings");
        assert_eq!(update.key.sort_value, "f-1");
        assert_eq!(update.condition, Some(Condition::KeyExists));
        assert_eq!(
            update.assigned("remediationStatus"),
            Some(&AttributeValue::s("FAILED"))
        );
        assert_eq!(update.assigned("executionId"), Some(&AttributeValue::s("e-1")));
        assert_eq!(
            update.assigned("error"),
            Some(&AttributeValue::s("Lambda function timeout"))
        );
    }

    #[test]
    fn update_item_without_error_leaves_error_alone() {
        let findings = FindingRecordStore::new(&config());
        let request = RemediationUpdateRequest::new("f-1", "e-1", "EC2.1", "SUCCESS");
        let update = findings.build_update_item(&request, None);
        assert!(update.assigned("error").is_none());
        assert!(update.condition.is_none());
    }

    #[tokio::test]
    async fn get_degrades_to_none_on_store_failure() {
        // No tables registered: every lookup fails with TableNotFound.
        let store = MemoryStore::new();
        let findings = FindingRecordStore::new(&config());
        assert!(findings.get(&store, "EC2.1", "f-1").await.is_none());
        assert!(findings.get_partial(&store, "EC2.1", "f-1").await.is_none());
    }

    #[tokio::test]
    async fn get_partial_reads_existing_finding() {
        let store = MemoryStore::new().with_table("findings", "findingType", "findingId");
        let findings = FindingRecordStore::new(&config());
        store
            .insert(
                "findings",
                &findings.key("EC2.1", "f-1"),
                item(&[("region", "eu-west-1")]),
            )
            .unwrap();

        let partial = findings.get_partial(&store, "EC2.1", "f-1").await.unwrap();
        assert_eq!(partial.region.as_deref(), Some("eu-west-1"));
    }
}
