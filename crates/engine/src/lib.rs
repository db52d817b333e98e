//! Remediation status consistency engine.
//!
//! Records the outcome of every remediation attempt against a finding in two
//! places at once: the finding's current-status record and a per-execution
//! history record. [`Coordinator`] keeps the two consistent using the backing
//! store's conditional multi-item writes; see its docs for the fallback
//! protocol.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod finding;
pub mod history;
pub mod request;
pub mod schema;
pub mod status;
pub mod telemetry;

pub use config::EngineConfig;
pub use coordinator::{ConflictKind, Coordinator, Tier, TierOutcome};
pub use error::EngineError;
pub use finding::{FindingRecordStore, PartialFindingData};
pub use history::{
    compute_expiry, expire_at_epoch, Clock, FixedClock, HistoryRecordStore, SystemClock,
};
pub use request::RemediationUpdateRequest;
pub use status::{classify, RemediationStatus, StatusMapper};
