//! Engine configuration.
//!
//! Loaded from TOML, from the environment, or both (environment overrides
//! file values).
//!
//! # Example
//!
//! ```toml
//! findings_table = "asr-findings"
//! history_table = "asr-remediation-history"
//! history_ttl_days = 365
//! failure_reasons = ["FAILED", "LAMBDA_ERROR", "TIMEDOUT"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::status::DEFAULT_FAILURE_REASONS;

pub const DEFAULT_HISTORY_TTL_DAYS: i64 = 365;
/// Upper bound on `history_ttl_days`: one hundred retention years.
pub const MAX_HISTORY_TTL_DAYS: i64 = 36_500;
pub const DEFAULT_ACTOR: &str = "Automated";

pub const ENV_FINDINGS_TABLE: &str = "FINDINGS_TABLE_NAME";
pub const ENV_HISTORY_TABLE: &str = "HISTORY_TABLE_NAME";
pub const ENV_HISTORY_TTL_DAYS: &str = "HISTORY_TTL_DAYS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Table holding one current-status record per finding.
    pub findings_table: String,
    /// Table holding one record per (finding, execution).
    pub history_table: String,
    /// Retention window for history records, in days.
    pub history_ttl_days: i64,
    /// Sentinel attribute written on every history record so a single index
    /// can scan all of them.
    pub scan_helper_attribute: String,
    pub scan_helper_value: String,
    /// The findings table's own sentinel; never carried onto history records.
    pub finding_scan_helper_attribute: String,
    /// Actor recorded when a request does not name one.
    pub default_actor: String,
    /// Upstream codes classified as FAILED without a warning.
    pub failure_reasons: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            findings_table: String::new(),
            history_table: String::new(),
            history_ttl_days: DEFAULT_HISTORY_TTL_DAYS,
            scan_helper_attribute: "REMEDIATION_CONSTANT".to_string(),
            scan_helper_value: "remediation".to_string(),
            finding_scan_helper_attribute: "FINDING_CONSTANT".to_string(),
            default_actor: DEFAULT_ACTOR.to_string(),
            failure_reasons: DEFAULT_FAILURE_REASONS
                .iter()
                .map(|r| r.to_string())
                .collect(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, EngineError> {
        toml::from_str(content)
            .map_err(|e| EngineError::Config(format!("could not parse config: {e}")))
    }

    /// Read and parse a TOML config file from `path`.
    pub fn from_path(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("could not read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, EngineError> {
        Self::default().with_env_overrides(|name| std::env::var(name).ok())
    }

    /// Apply `FINDINGS_TABLE_NAME`, `HISTORY_TABLE_NAME` and
    /// `HISTORY_TTL_DAYS` from `lookup` on top of `self`.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, EngineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(table) = lookup(ENV_FINDINGS_TABLE) {
            self.findings_table = table;
        }
        if let Some(table) = lookup(ENV_HISTORY_TABLE) {
            self.history_table = table;
        }
        if let Some(days) = lookup(ENV_HISTORY_TTL_DAYS) {
            self.history_ttl_days = days.trim().parse().map_err(|_| {
                EngineError::Config(format!("{ENV_HISTORY_TTL_DAYS} is not an integer: '{days}'"))
            })?;
        }
        Ok(self)
    }

    /// Check the settings the coordinator cannot run without.
    pub fn validate(&self) -> Result<(), EngineError> {
        let mut errors = Vec::new();
        if self.findings_table.is_empty() {
            errors.push("findings_table is empty".to_string());
        }
        if self.history_table.is_empty() {
            errors.push("history_table is empty".to_string());
        }
        if self.history_ttl_days <= 0 || self.history_ttl_days > MAX_HISTORY_TTL_DAYS {
            errors.push(format!(
                "history_ttl_days must be between 1 and {MAX_HISTORY_TTL_DAYS}, got {}",
                self.history_ttl_days
            ));
        }
        if self.scan_helper_attribute.is_empty() {
            errors.push("scan_helper_attribute is empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Config(errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.history_ttl_days, 365);
        assert_eq!(config.default_actor, "Automated");
        assert_eq!(config.scan_helper_attribute, "REMEDIATION_CONSTANT");
        assert!(config.failure_reasons.iter().any(|r| r == "LAMBDA_ERROR"));
    }

    #[test]
    fn toml_overrides_only_given_fields() {
        let config = EngineConfig::from_toml_str(
            r#"
            findings_table = "findings"
            history_table = "history"
            history_ttl_days = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.findings_table, "findings");
        assert_eq!(config.history_ttl_days, 30);
        assert_eq!(config.scan_helper_value, "remediation");
        config.validate().unwrap();
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = EngineConfig::from_toml_str("history_ttl_days = \"soon\"").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            (ENV_FINDINGS_TABLE, "env-findings"),
            (ENV_HISTORY_TABLE, "env-history"),
            (ENV_HISTORY_TTL_DAYS, "90"),
        ]
        .into_iter()
        .collect();
        let config = EngineConfig::default()
            .with_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.findings_table, "env-findings");
        assert_eq!(config.history_table, "env-history");
        assert_eq!(config.history_ttl_days, 90);
    }

    #[test]
    fn non_numeric_ttl_is_rejected() {
        let err = EngineConfig::default()
            .with_env_overrides(|k| (k == ENV_HISTORY_TTL_DAYS).then(|| "a year".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_HISTORY_TTL_DAYS));
    }

    #[test]
    fn validate_lists_every_problem() {
        let config = EngineConfig {
            history_ttl_days: 0,
            ..EngineConfig::default()
        };
        let msg = config.validate().unwrap_err().to_string();
        assert!(msg.contains("findings_table"));
        assert!(msg.contains("history_table"));
        assert!(msg.contains("history_ttl_days"));
    }

    #[test]
    fn oversized_ttl_from_env_is_rejected() {
        let config = EngineConfig {
            findings_table: "findings".to_string(),
            history_table: "history".to_string(),
            ..EngineConfig::default()
        }
        .with_env_overrides(|k| (k == ENV_HISTORY_TTL_DAYS).then(|| "4000000".to_string()))
        .unwrap();
        let msg = config.validate().unwrap_err().to_string();
        assert!(msg.contains("history_ttl_days"));

        let at_limit = EngineConfig {
            history_ttl_days: MAX_HISTORY_TTL_DAYS,
            ..config
        };
        at_limit.validate().unwrap();
    }

    #[test]
    fn from_path_reports_missing_file() {
        let err = EngineConfig::from_path(Path::new("/nonexistent/engine.toml")).unwrap_err();
        assert!(err.to_string().contains("could not read"));
    }
}
