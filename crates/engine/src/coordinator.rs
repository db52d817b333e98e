//! Three-tier consistency protocol for remediation status updates.
//!
//! Every update touches two records: the finding's current status and the
//! per-execution history record. The coordinator tries progressively weaker
//! writes until one is accepted:
//!
//! 1. update both records, each conditioned on already existing;
//! 2. create the history record (conditioned on not existing) while updating
//!    the finding;
//! 3. update the finding alone, unconditionally.
//!
//! All atomicity comes from the store's conditional transactions. The
//! coordinator holds no locks and never retries a tier.

use std::fmt;
use std::sync::Arc;

use remediation_storage::{
    CancellationReason, Condition, RecordStore, StorageError, TransactWriteItem,
};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::finding::FindingRecordStore;
use crate::history::{Clock, HistoryRecordStore, SystemClock};
use crate::request::RemediationUpdateRequest;
use crate::status::StatusMapper;

/// Position of the finding write in every transaction the coordinator submits.
const FINDING_INDEX: usize = 0;
/// Position of the history write.
const HISTORY_INDEX: usize = 1;

/// One stage of the fallback protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    UpdateUpdate,
    CreateHistory,
    FindingOnly,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tier::UpdateUpdate => "update-update",
            Tier::CreateHistory => "create-history",
            Tier::FindingOnly => "finding-only",
        })
    }
}

/// How a request was finally written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierOutcome {
    /// Tier 1: both existing records updated.
    UpdatedExisting,
    /// Tier 2: history record created, finding updated.
    CreatedHistory,
    /// Tier 3: finding updated, history untouched.
    FindingOnly,
    /// The request failed validation; nothing was written.
    Skipped,
}

/// Why a coordinator transaction was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    FindingMissing,
    HistoryMissing,
    HistoryAlreadyExists,
    OtherFault,
}

impl ConflictKind {
    /// Classify the failure of a Tier 1 transaction.
    pub fn after_update_update(err: &StorageError) -> Self {
        let Some(reasons) = err.cancellation_reasons() else {
            return ConflictKind::OtherFault;
        };
        if err.item_failed_condition(FINDING_INDEX) {
            ConflictKind::FindingMissing
        } else if has_foreign_reason(reasons) {
            ConflictKind::OtherFault
        } else if err.item_failed_condition(HISTORY_INDEX) {
            ConflictKind::HistoryMissing
        } else {
            ConflictKind::OtherFault
        }
    }

    /// Classify the failure of a Tier 2 transaction.
    pub fn after_create_history(err: &StorageError) -> Self {
        let Some(reasons) = err.cancellation_reasons() else {
            return ConflictKind::OtherFault;
        };
        if has_foreign_reason(reasons) {
            ConflictKind::OtherFault
        } else if err.item_failed_condition(HISTORY_INDEX) {
            ConflictKind::HistoryAlreadyExists
        } else if err.item_failed_condition(FINDING_INDEX) {
            ConflictKind::FindingMissing
        } else {
            ConflictKind::OtherFault
        }
    }
}

fn has_foreign_reason(reasons: &[CancellationReason]) -> bool {
    reasons
        .iter()
        .any(|r| matches!(r, CancellationReason::Other(_)))
}

/// Applies remediation status updates to the findings and history tables.
///
/// Stateless between calls; share it behind an `Arc` to use it from many
/// tasks at once.
pub struct Coordinator<S: RecordStore> {
    store: S,
    findings: FindingRecordStore,
    history: HistoryRecordStore,
    mapper: StatusMapper,
    clock: Arc<dyn Clock>,
}

impl<S: RecordStore> Coordinator<S> {
    /// Build a coordinator over `store`. Fails if `config` does not pass
    /// [`EngineConfig::validate`].
    pub fn new(store: S, config: &EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            store,
            findings: FindingRecordStore::new(config),
            history: HistoryRecordStore::new(config),
            mapper: StatusMapper::from_config(config),
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the clock used to stamp new history records.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The mapper built from this coordinator's configuration, for
    /// normalizing upstream statuses before building a request.
    pub fn status_mapper(&self) -> &StatusMapper {
        &self.mapper
    }

    /// Apply `request` and discard which tier completed it.
    pub async fn update_remediation_status_and_history(
        &self,
        request: &RemediationUpdateRequest,
    ) -> Result<(), EngineError> {
        self.apply(request).await.map(|_| ())
    }

    /// Apply `request`, reporting which tier completed it.
    pub async fn apply(
        &self,
        request: &RemediationUpdateRequest,
    ) -> Result<TierOutcome, EngineError> {
        if !request.validate() {
            return Ok(TierOutcome::Skipped);
        }

        debug!(
            finding_id = %request.finding_id,
            execution_id = %request.execution_id,
            finding_type = %request.finding_type,
            status = %request.remediation_status,
            "attempting update-update"
        );
        let err = match self.update_update(request).await {
            Ok(()) => return Ok(TierOutcome::UpdatedExisting),
            Err(err) => err,
        };

        match ConflictKind::after_update_update(&err) {
            ConflictKind::HistoryMissing => {
                warn!(
                    finding_id = %request.finding_id,
                    execution_id = %request.execution_id,
                    finding_type = %request.finding_type,
                    "update-update transaction canceled, history record missing"
                );
            }
            ConflictKind::FindingMissing => {
                error!(
                    finding_id = %request.finding_id,
                    execution_id = %request.execution_id,
                    finding_type = %request.finding_type,
                    error = %err,
                    "finding record missing, cannot update remediation status"
                );
                return Err(EngineError::FindingMissing {
                    finding_type: request.finding_type.clone(),
                    finding_id: request.finding_id.clone(),
                });
            }
            ConflictKind::HistoryAlreadyExists | ConflictKind::OtherFault => {
                return Err(self.fatal(Tier::UpdateUpdate, request, err));
            }
        }

        let items = self.create_history_items(request).await?;
        let err = match self.store.transact_write(items).await {
            Ok(()) => {
                info!(
                    finding_id = %request.finding_id,
                    execution_id = %request.execution_id,
                    finding_type = %request.finding_type,
                    "created history record and updated finding"
                );
                return Ok(TierOutcome::CreatedHistory);
            }
            Err(err) => err,
        };

        match ConflictKind::after_create_history(&err) {
            kind @ (ConflictKind::HistoryAlreadyExists | ConflictKind::FindingMissing) => {
                debug!(
                    finding_id = %request.finding_id,
                    execution_id = %request.execution_id,
                    finding_type = %request.finding_type,
                    conflict = ?kind,
                    "create-history transaction canceled, falling back to finding-only"
                );
            }
            ConflictKind::HistoryMissing | ConflictKind::OtherFault => {
                return Err(self.fatal(Tier::CreateHistory, request, err));
            }
        }

        match self.findings.update(&self.store, request).await {
            Ok(()) => {
                debug!(
                    finding_id = %request.finding_id,
                    execution_id = %request.execution_id,
                    finding_type = %request.finding_type,
                    "updated finding only"
                );
                Ok(TierOutcome::FindingOnly)
            }
            Err(err) => Err(self.fatal(Tier::FindingOnly, request, err)),
        }
    }

    async fn update_update(&self, request: &RemediationUpdateRequest) -> Result<(), StorageError> {
        let items: Vec<TransactWriteItem> = vec![
            self.findings
                .build_update_item(request, Some(Condition::KeyExists))
                .into(),
            self.history.build_update_item(request).into(),
        ];
        self.store.transact_write(items).await
    }

    /// Tier 2 writes: the conditional finding update and the history create.
    async fn create_history_items(
        &self,
        request: &RemediationUpdateRequest,
    ) -> Result<Vec<TransactWriteItem>, EngineError> {
        let finding = self
            .findings
            .get_partial(&self.store, &request.finding_type, &request.finding_id)
            .await;
        if finding.is_none() {
            debug!(
                finding_id = %request.finding_id,
                finding_type = %request.finding_type,
                "no finding data for enrichment"
            );
        }

        let create = self
            .history
            .build_create_item(request, finding.as_ref(), self.clock.now())
            .map_err(|err| {
                error!(
                    finding_id = %request.finding_id,
                    execution_id = %request.execution_id,
                    finding_type = %request.finding_type,
                    error = %err,
                    "could not build history record"
                );
                err
            })?;

        Ok(vec![
            self.findings
                .build_update_item(request, Some(Condition::KeyExists))
                .into(),
            create.into(),
        ])
    }

    fn fatal(
        &self,
        tier: Tier,
        request: &RemediationUpdateRequest,
        source: StorageError,
    ) -> EngineError {
        error!(
            finding_id = %request.finding_id,
            execution_id = %request.execution_id,
            finding_type = %request.finding_type,
            tier = %tier,
            error = %source,
            "remediation status update failed"
        );
        EngineError::Store {
            tier,
            finding_type: request.finding_type.clone(),
            finding_id: request.finding_id.clone(),
            execution_id: request.execution_id.clone(),
            source,
        }
    }
}
