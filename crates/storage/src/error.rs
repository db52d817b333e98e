use std::fmt;

/// Why a single item in a cancelled transaction did not apply.
///
/// A cancelled transaction reports one reason per item, in submission order.
/// Items that were not at fault report [`CancellationReason::None`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancellationReason {
    /// The item was valid; the transaction was cancelled because of another item.
    None,
    /// The item's condition expression evaluated to false.
    ConditionalCheckFailed,
    /// Any other backend-reported code (throttling, conflicting transaction, ...).
    Other(String),
}

impl CancellationReason {
    /// Map a wire-level cancellation code onto a reason.
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            None | Some("None") | Some("") => CancellationReason::None,
            Some("ConditionalCheckFailed") => CancellationReason::ConditionalCheckFailed,
            Some(other) => CancellationReason::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            CancellationReason::None => "None",
            CancellationReason::ConditionalCheckFailed => "ConditionalCheckFailed",
            CancellationReason::Other(code) => code,
        }
    }

    pub fn is_conditional_failure(&self) -> bool {
        matches!(self, CancellationReason::ConditionalCheckFailed)
    }
}

impl fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// All errors that can be returned by a RecordStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A multi-item write was rejected as a whole. `reasons` holds one entry
    /// per submitted item, in the order the items were submitted.
    #[error("transaction canceled: [{}]", join_reasons(reasons))]
    TransactionCanceled { reasons: Vec<CancellationReason> },

    /// A single-item conditional write failed its condition.
    #[error("conditional check failed on table {table}")]
    ConditionalCheckFailed { table: String },

    /// The named table is not known to the backend.
    #[error("table not found: {table}")]
    TableNotFound { table: String },

    /// The request was malformed (missing key attributes, duplicate targets, ...).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A backend-specific storage error (throttling, permissions, connectivity, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// The per-item reasons if this is a cancelled transaction.
    pub fn cancellation_reasons(&self) -> Option<&[CancellationReason]> {
        match self {
            StorageError::TransactionCanceled { reasons } => Some(reasons),
            _ => None,
        }
    }

    /// Whether the item at `index` of a cancelled transaction failed its condition.
    pub fn item_failed_condition(&self, index: usize) -> bool {
        self.cancellation_reasons()
            .and_then(|reasons| reasons.get(index))
            .is_some_and(CancellationReason::is_conditional_failure)
    }
}

fn join_reasons(reasons: &[CancellationReason]) -> String {
    reasons
        .iter()
        .map(CancellationReason::code)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_from_code() {
        assert_eq!(CancellationReason::from_code(None), CancellationReason::None);
        assert_eq!(
            CancellationReason::from_code(Some("None")),
            CancellationReason::None
        );
        assert_eq!(
            CancellationReason::from_code(Some("ConditionalCheckFailed")),
            CancellationReason::ConditionalCheckFailed
        );
        assert_eq!(
            CancellationReason::from_code(Some("ThrottlingError")),
            CancellationReason::Other("ThrottlingError".to_string())
        );
    }

    #[test]
    fn item_failed_condition_inspects_the_right_index() {
        let err = StorageError::TransactionCanceled {
            reasons: vec![
                CancellationReason::None,
                CancellationReason::ConditionalCheckFailed,
            ],
        };
        assert!(!err.item_failed_condition(0));
        assert!(err.item_failed_condition(1));
        assert!(!err.item_failed_condition(2));
        assert_eq!(
            err.to_string(),
            "transaction canceled: [None, ConditionalCheckFailed]"
        );
    }

    #[test]
    fn non_transaction_errors_have_no_reasons() {
        let err = StorageError::Backend("throttled".to_string());
        assert!(err.cancellation_reasons().is_none());
        assert!(!err.item_failed_condition(0));
    }
}
