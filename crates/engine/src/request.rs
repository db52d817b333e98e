use serde::{Deserialize, Serialize};
use tracing::error;

use crate::config::DEFAULT_ACTOR;

fn default_actor() -> String {
    DEFAULT_ACTOR.to_string()
}

/// One remediation status update for a (finding, execution) pair.
///
/// `remediation_status` is stored verbatim; normalize upstream vocabulary
/// with [`StatusMapper`](crate::StatusMapper) before building the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemediationUpdateRequest {
    pub finding_id: String,
    pub execution_id: String,
    pub finding_type: String,
    pub remediation_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default = "default_actor")]
    pub last_updated_by: String,
}

impl RemediationUpdateRequest {
    pub fn new(
        finding_id: impl Into<String>,
        execution_id: impl Into<String>,
        finding_type: impl Into<String>,
        remediation_status: impl Into<String>,
    ) -> Self {
        Self {
            finding_id: finding_id.into(),
            execution_id: execution_id.into(),
            finding_type: finding_type.into(),
            remediation_status: remediation_status.into(),
            error: None,
            resource_id: None,
            resource_type: None,
            account_id: None,
            severity: None,
            region: None,
            last_updated_by: default_actor(),
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_resource(
        mut self,
        resource_id: impl Into<String>,
        resource_type: impl Into<String>,
    ) -> Self {
        self.resource_id = Some(resource_id.into());
        self.resource_type = Some(resource_type.into());
        self
    }

    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    pub fn with_severity(mut self, severity: impl Into<String>) -> Self {
        self.severity = Some(severity.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_last_updated_by(mut self, actor: impl Into<String>) -> Self {
        self.last_updated_by = actor.into();
        self
    }

    /// Sort key of this request's history record.
    pub fn history_sort_key(&self) -> String {
        format!("{}#{}", self.finding_id, self.execution_id)
    }

    /// True when all identifying fields are present. A request failing this
    /// check must not be written; the failure is logged here.
    pub fn validate(&self) -> bool {
        if self.finding_id.is_empty()
            || self.execution_id.is_empty()
            || self.finding_type.is_empty()
        {
            error!(
                finding_id = %self.finding_id,
                execution_id = %self.execution_id,
                finding_type = %self.finding_type,
                "Missing required parameters"
            );
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_request_is_valid() {
        let request = RemediationUpdateRequest::new("f-1", "e-1", "EC2.1", "SUCCESS");
        assert!(request.validate());
        assert_eq!(request.last_updated_by, "Automated");
        assert_eq!(request.history_sort_key(), "f-1#e-1");
    }

    #[test]
    fn any_missing_identifier_is_invalid() {
        assert!(!RemediationUpdateRequest::new("", "e-1", "EC2.1", "SUCCESS").validate());
        assert!(!RemediationUpdateRequest::new("f-1", "", "EC2.1", "SUCCESS").validate());
        assert!(!RemediationUpdateRequest::new("f-1", "e-1", "", "SUCCESS").validate());
    }

    #[test]
    fn empty_status_does_not_invalidate() {
        assert!(RemediationUpdateRequest::new("f-1", "e-1", "EC2.1", "").validate());
    }

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let request: RemediationUpdateRequest = serde_json::from_str(
            r#"{
                "findingId": "f-1",
                "executionId": "e-1",
                "findingType": "S3.1",
                "remediationStatus": "FAILED",
                "error": "Lambda function timeout",
                "accountId": "123456789012"
            }"#,
        )
        .unwrap();
        assert_eq!(request.error.as_deref(), Some("Lambda function timeout"));
        assert_eq!(request.account_id.as_deref(), Some("123456789012"));
        assert_eq!(request.last_updated_by, "Automated");
        assert!(request.region.is_none());
    }

    #[test]
    fn builder_sets_optional_fields() {
        let request = RemediationUpdateRequest::new("f-1", "e-1", "S3.1", "SUCCESS")
            .with_resource("bucket-name", "AwsS3Bucket")
            .with_account_id("123456789012")
            .with_severity("HIGH")
            .with_region("us-east-1")
            .with_last_updated_by("alice");
        assert_eq!(request.resource_type.as_deref(), Some("AwsS3Bucket"));
        assert_eq!(request.severity.as_deref(), Some("HIGH"));
        assert_eq!(request.last_updated_by, "alice");
    }
}
