use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EngineConfig;

/// Upstream failure-reason codes that map to [`RemediationStatus::Failed`]
/// without a warning.
pub const DEFAULT_FAILURE_REASONS: [&str; 9] = [
    "FAILED",
    "LAMBDA_ERROR",
    "RUNBOOK_NOT_ACTIVE",
    "PLAYBOOK_NOT_ENABLED",
    "TIMEDOUT",
    "CANCELLED",
    "CANCELLING",
    "ASSUME_ROLE_FAILURE",
    "NO_RUNBOOK",
];

/// The four canonical remediation states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemediationStatus {
    NotStarted,
    InProgress,
    Success,
    Failed,
}

impl RemediationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RemediationStatus::NotStarted => "NOT_STARTED",
            RemediationStatus::InProgress => "IN_PROGRESS",
            RemediationStatus::Success => "SUCCESS",
            RemediationStatus::Failed => "FAILED",
        }
    }

    /// Whether no further transitions are expected for the execution.
    pub fn is_terminal(self) -> bool {
        matches!(self, RemediationStatus::Success | RemediationStatus::Failed)
    }
}

impl fmt::Display for RemediationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RemediationStatus> for String {
    fn from(status: RemediationStatus) -> Self {
        status.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a canonical remediation status: {0}")]
pub struct ParseStatusError(pub String);

/// Strict parse of a canonical status name (case-insensitive). Use
/// [`StatusMapper::classify`] for upstream vocabulary.
impl FromStr for RemediationStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NOT_STARTED" => Ok(RemediationStatus::NotStarted),
            "IN_PROGRESS" => Ok(RemediationStatus::InProgress),
            "SUCCESS" => Ok(RemediationStatus::Success),
            "FAILED" => Ok(RemediationStatus::Failed),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// Maps arbitrary upstream status strings onto [`RemediationStatus`].
///
/// Classification is total: unrecognised input becomes `Failed` so that no
/// update is ever dropped for using an unknown vocabulary.
#[derive(Debug, Clone)]
pub struct StatusMapper {
    failure_reasons: HashSet<String>,
}

impl StatusMapper {
    pub fn new<I, S>(failure_reasons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            failure_reasons: failure_reasons
                .into_iter()
                .map(|r| r.as_ref().to_ascii_uppercase())
                .collect(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.failure_reasons)
    }

    pub fn classify(&self, raw: Option<&str>) -> RemediationStatus {
        let raw = match raw {
            Some(s) if !s.is_empty() => s,
            _ => return RemediationStatus::NotStarted,
        };
        let upper = raw.to_ascii_uppercase();
        match upper.as_str() {
            "SUCCESS" => RemediationStatus::Success,
            "NOT_STARTED" => RemediationStatus::NotStarted,
            "QUEUED" | "RUNNING" | "IN_PROGRESS" => RemediationStatus::InProgress,
            _ if self.failure_reasons.contains(&upper) => {
                debug!(status = %upper, "mapping failure reason to FAILED");
                RemediationStatus::Failed
            }
            _ => {
                warn!(status = %raw, "unknown remediation status defaulted to FAILED");
                RemediationStatus::Failed
            }
        }
    }
}

impl Default for StatusMapper {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_REASONS)
    }
}

/// Classify with the default failure-reason set.
pub fn classify(raw: Option<&str>) -> RemediationStatus {
    StatusMapper::default().classify(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_statuses_map_to_themselves() {
        assert_eq!(classify(Some("SUCCESS")), RemediationStatus::Success);
        assert_eq!(classify(Some("success")), RemediationStatus::Success);
        assert_eq!(classify(Some("NOT_STARTED")), RemediationStatus::NotStarted);
        assert_eq!(classify(Some("In_Progress")), RemediationStatus::InProgress);
    }

    #[test]
    fn empty_or_absent_is_not_started() {
        assert_eq!(classify(None), RemediationStatus::NotStarted);
        assert_eq!(classify(Some("")), RemediationStatus::NotStarted);
    }

    #[test]
    fn queued_and_running_are_in_progress() {
        assert_eq!(classify(Some("QUEUED")), RemediationStatus::InProgress);
        assert_eq!(classify(Some("running")), RemediationStatus::InProgress);
    }

    #[test]
    fn failure_reasons_and_unknowns_are_failed() {
        assert_eq!(classify(Some("FAILED")), RemediationStatus::Failed);
        assert_eq!(classify(Some("lambda_error")), RemediationStatus::Failed);
        assert_eq!(classify(Some("UNKNOWN_STATUS")), RemediationStatus::Failed);
        assert_eq!(classify(Some("  ")), RemediationStatus::Failed);
        assert_eq!(classify(Some("\u{1F525}garbage")), RemediationStatus::Failed);
    }

    #[test]
    fn configured_reasons_are_case_insensitive() {
        let mapper = StatusMapper::new(["custom_reason"]);
        assert_eq!(
            mapper.classify(Some("CUSTOM_REASON")),
            RemediationStatus::Failed
        );
        // Canonical rules still win over the configured set.
        let mapper = StatusMapper::new(["QUEUED"]);
        assert_eq!(mapper.classify(Some("queued")), RemediationStatus::InProgress);
    }

    #[test]
    fn classify_is_total_over_assorted_input() {
        let inputs = [
            "", "x", "SUCCESS ", "\0", "💥", "IN-PROGRESS", "NOT NEW", "succeeded",
        ];
        for input in inputs {
            let status = classify(Some(input));
            assert!(matches!(
                status,
                RemediationStatus::NotStarted
                    | RemediationStatus::InProgress
                    | RemediationStatus::Success
                    | RemediationStatus::Failed
            ));
        }
    }

    #[test]
    fn parse_and_display_use_canonical_names() {
        assert_eq!(
            "in_progress".parse::<RemediationStatus>().unwrap(),
            RemediationStatus::InProgress
        );
        assert!("QUEUED".parse::<RemediationStatus>().is_err());
        assert_eq!(RemediationStatus::NotStarted.to_string(), "NOT_STARTED");
        assert_eq!(String::from(RemediationStatus::Failed), "FAILED");
        assert!(RemediationStatus::Success.is_terminal());
        assert!(!RemediationStatus::InProgress.is_terminal());
    }

    #[test]
    fn serde_uses_canonical_names() {
        let json = serde_json::to_string(&RemediationStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
    }
}
