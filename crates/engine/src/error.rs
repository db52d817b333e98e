use remediation_storage::StorageError;

use crate::coordinator::Tier;

/// Errors surfaced by the engine to its callers.
///
/// Validation failures, expected conditional conflicts and failed enrichment
/// reads are absorbed inside the engine and never show up here.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The finding record a status update targets does not exist.
    #[error("finding record missing: {finding_type}/{finding_id}")]
    FindingMissing {
        finding_type: String,
        finding_id: String,
    },

    /// A store call failed in a way no fallback tier can absorb.
    #[error(
        "{tier} failed for {finding_type}/{finding_id} execution {execution_id}: {source}"
    )]
    Store {
        tier: Tier,
        finding_type: String,
        finding_id: String,
        execution_id: String,
        #[source]
        source: StorageError,
    },

    /// Engine configuration could not be loaded or is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    /// Whether the error came from the backing store (as opposed to
    /// configuration).
    pub fn is_store_fault(&self) -> bool {
        matches!(
            self,
            EngineError::Store { .. } | EngineError::FindingMissing { .. }
        )
    }
}
