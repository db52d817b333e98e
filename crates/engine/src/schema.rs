//! Attribute names shared by the findings and history tables.

/// Partition key of both tables.
pub const FINDING_TYPE: &str = "findingType";
/// Sort key of the findings table.
pub const FINDING_ID: &str = "findingId";
/// Sort key of the history table: `{findingId}#{executionId}`.
pub const FINDING_ID_EXECUTION_ID: &str = "findingId#executionId";

pub const EXECUTION_ID: &str = "executionId";
pub const REMEDIATION_STATUS: &str = "remediationStatus";
pub const ERROR: &str = "error";
pub const LAST_UPDATED_TIME: &str = "lastUpdatedTime";
/// Sort helper for time-ordered history queries: `{lastUpdatedTime}#{findingId}`.
pub const LAST_UPDATED_TIME_FINDING_ID: &str = "lastUpdatedTime#findingId";
pub const LAST_UPDATED_BY: &str = "lastUpdatedBy";
/// TTL attribute, Unix epoch seconds.
pub const EXPIRE_AT: &str = "expireAt";

pub const ACCOUNT_ID: &str = "accountId";
pub const RESOURCE_ID: &str = "resourceId";
pub const RESOURCE_TYPE: &str = "resourceType";
pub const SEVERITY: &str = "severity";
pub const REGION: &str = "region";

/// Denormalized metadata carried from a finding onto its history records.
pub const METADATA_ATTRIBUTES: [&str; 6] = [
    ACCOUNT_ID,
    RESOURCE_ID,
    RESOURCE_TYPE,
    SEVERITY,
    REGION,
    LAST_UPDATED_BY,
];

/// Attributes owned by the status protocol itself. Never copied from a
/// finding onto a history record.
pub const PROTOCOL_ATTRIBUTES: [&str; 9] = [
    FINDING_TYPE,
    FINDING_ID,
    FINDING_ID_EXECUTION_ID,
    EXECUTION_ID,
    REMEDIATION_STATUS,
    ERROR,
    LAST_UPDATED_TIME,
    LAST_UPDATED_TIME_FINDING_ID,
    EXPIRE_AT,
];
