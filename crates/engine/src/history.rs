use time::{Duration, Month, OffsetDateTime};

use remediation_storage::{AttributeValue, Condition, Item, ItemKey, PutItem, UpdateItem};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::finding::PartialFindingData;
use crate::request::RemediationUpdateRequest;
use crate::schema;

/// Source of the creation timestamp for history records.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Wall-clock UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

/// Days that make up one retention year.
pub const DAYS_PER_YEAR: i64 = 365;

/// Expiry of a record created at `created_at` and kept for `retention_days`.
///
/// Every full 365 days advance the calendar year, and the remainder is added
/// as whole days: a one-year retention ends on the same calendar date a year
/// later, leap years included. A record created on 29 February expires on
/// 28 February of a non-leap target year. Results outside the representable
/// date range are an [`EngineError::Config`] error.
pub fn compute_expiry(
    created_at: OffsetDateTime,
    retention_days: i64,
) -> Result<OffsetDateTime, EngineError> {
    let out_of_range = || {
        EngineError::Config(format!(
            "history expiry out of range: {retention_days} days after {}",
            format_timestamp(created_at)
        ))
    };

    let years = i32::try_from(retention_days / DAYS_PER_YEAR).map_err(|_| out_of_range())?;
    let remainder = Duration::days(retention_days % DAYS_PER_YEAR);
    let target_year = created_at.year().checked_add(years).ok_or_else(out_of_range)?;

    let shifted = match created_at.replace_year(target_year) {
        Ok(shifted) => shifted,
        Err(_) if created_at.month() == Month::February && created_at.day() == 29 => {
            created_at
                .replace_day(28)
                .and_then(|day| day.replace_year(target_year))
                .map_err(|_| out_of_range())?
        }
        Err(_) => return Err(out_of_range()),
    };
    shifted.checked_add(remainder).ok_or_else(out_of_range)
}

/// Expiry as Unix epoch seconds, the form stored in `expireAt`.
pub fn expire_at_epoch(
    created_at: OffsetDateTime,
    retention_days: i64,
) -> Result<i64, EngineError> {
    compute_expiry(created_at, retention_days).map(OffsetDateTime::unix_timestamp)
}

/// RFC 3339 UTC timestamp with microseconds and a `Z` suffix.
pub(crate) fn format_timestamp(at: OffsetDateTime) -> String {
    let at = at.to_offset(time::UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:06}Z",
        at.year(),
        at.month() as u8,
        at.day(),
        at.hour(),
        at.minute(),
        at.second(),
        at.microsecond()
    )
}

/// Write descriptors for the history table: one append-only record per
/// `(findingType, findingId#executionId)`.
#[derive(Debug, Clone)]
pub struct HistoryRecordStore {
    table: String,
    ttl_days: i64,
    scan_helper_attribute: String,
    scan_helper_value: String,
    default_actor: String,
}

impl HistoryRecordStore {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            table: config.history_table.clone(),
            ttl_days: config.history_ttl_days,
            scan_helper_attribute: config.scan_helper_attribute.clone(),
            scan_helper_value: config.scan_helper_value.clone(),
            default_actor: config.default_actor.clone(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn key(&self, request: &RemediationUpdateRequest) -> ItemKey {
        ItemKey::new(
            schema::FINDING_TYPE,
            &request.finding_type,
            schema::FINDING_ID_EXECUTION_ID,
            request.history_sort_key(),
        )
    }

    /// The full history record for `request`, conditioned on the record not
    /// existing yet.
    ///
    /// Attributes are layered so later sources win: the finding's extra
    /// fields, then its named metadata, then metadata from the request, then
    /// the protocol attributes. Empty values are never written.
    pub fn build_create_item(
        &self,
        request: &RemediationUpdateRequest,
        finding: Option<&PartialFindingData>,
        now: OffsetDateTime,
    ) -> Result<PutItem, EngineError> {
        let expire_at = expire_at_epoch(now, self.ttl_days)?;
        let mut item = Item::new();

        if let Some(finding) = finding {
            for (name, value) in &finding.extra {
                put_text(&mut item, name, value);
            }
            for (name, value) in finding.metadata() {
                put_text(&mut item, name, value);
            }
        }

        let request_metadata = [
            (schema::ACCOUNT_ID, request.account_id.as_deref()),
            (schema::RESOURCE_ID, request.resource_id.as_deref()),
            (schema::RESOURCE_TYPE, request.resource_type.as_deref()),
            (schema::SEVERITY, request.severity.as_deref()),
            (schema::REGION, request.region.as_deref()),
        ];
        for (name, value) in request_metadata {
            if let Some(value) = value {
                put_text(&mut item, name, value);
            }
        }

        let actor = if request.last_updated_by.is_empty() {
            &self.default_actor
        } else {
            &request.last_updated_by
        };
        put_text(&mut item, schema::LAST_UPDATED_BY, actor);

        let timestamp = format_timestamp(now);
        put_text(&mut item, schema::FINDING_ID, &request.finding_id);
        put_text(&mut item, schema::EXECUTION_ID, &request.execution_id);
        item.insert(
            schema::REMEDIATION_STATUS.to_string(),
            AttributeValue::s(&request.remediation_status),
        );
        item.insert(
            schema::LAST_UPDATED_TIME_FINDING_ID.to_string(),
            AttributeValue::s(format!("{}#{}", timestamp, request.finding_id)),
        );
        item.insert(
            schema::LAST_UPDATED_TIME.to_string(),
            AttributeValue::s(timestamp),
        );
        item.insert(
            self.scan_helper_attribute.clone(),
            AttributeValue::s(&self.scan_helper_value),
        );
        item.insert(schema::EXPIRE_AT.to_string(), AttributeValue::n(expire_at));
        if let Some(error) = request.error.as_deref() {
            put_text(&mut item, schema::ERROR, error);
        }

        Ok(PutItem::new(&self.table, self.key(request), item)
            .with_condition(Condition::KeyNotExists))
    }

    /// Status update for an existing history record.
    pub fn build_update_item(&self, request: &RemediationUpdateRequest) -> UpdateItem {
        UpdateItem::new(&self.table, self.key(request))
            .set(
                schema::REMEDIATION_STATUS,
                AttributeValue::s(&request.remediation_status),
            )
            .set_if_present(schema::ERROR, request.error.as_deref())
            .with_condition(Condition::KeyExists)
    }
}

fn put_text(item: &mut Item, name: &str, value: &str) {
    if !value.is_empty() {
        item.insert(name.to_string(), AttributeValue::s(value));
    }
}
