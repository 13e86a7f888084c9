//! Crew booking: date-ranged exclusive allocation of employees to
//! works. The advisory conflict report and the transactional write
//! share one collision rule; the write re-checks it inside the storage
//! transaction.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::calendar;
use crate::models::{ScheduleSlot, User, Work, SLOT_ASSIGNED, SLOT_RESERVED};
use crate::store::{BookingApply, BookingWrite, CrmStore, StoreError};

pub const SETTINGS_KEY_SCHEDULE: &str = "schedule";

pub const ACTION_BOOK_CREW: &str = "book_crew";
pub const ACTION_REBOOK_DATES: &str = "rebook_dates";

/// Booking policy, read fresh for every transaction (never cached: the
/// flag can change between two bookings).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingPolicy {
    pub block_on_conflict: bool,
    /// Usernames allowed to push a booking through despite conflicts.
    pub override_logins: Vec<String>,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            block_on_conflict: true,
            override_logins: Vec::new(),
        }
    }
}

impl BookingPolicy {
    pub fn from_value(value: Option<&Value>) -> Self {
        let defaults = Self::default();
        let Some(value) = value else {
            return defaults;
        };
        let block_on_conflict = value
            .get("block_on_conflict")
            .and_then(Value::as_bool)
            .unwrap_or(defaults.block_on_conflict);
        let override_logins = value
            .get("override_logins")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Self {
            block_on_conflict,
            override_logins,
        }
    }

    pub fn may_override(&self, username: &str) -> bool {
        self.override_logins.iter().any(|login| login == username)
    }
}

pub async fn load_policy(store: &dyn CrmStore) -> BookingPolicy {
    match store.load_setting(SETTINGS_KEY_SCHEDULE).await {
        Ok(value) => BookingPolicy::from_value(value.as_ref()),
        Err(err) => {
            warn!(error = %err, "schedule policy unavailable, using defaults");
            BookingPolicy::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotRef {
    pub date: NaiveDate,
    pub work_id: Option<Uuid>,
    pub kind: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceConflict {
    pub employee_id: Uuid,
    pub slots: Vec<SlotRef>,
}

/// Always materialized, so "no conflicts" is an explicit answer rather
/// than an absent one. Entries exist only for employees that collide.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConflictReport {
    pub entries: Vec<ResourceConflict>,
}

impl ConflictReport {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn from_slots(slots: &[ScheduleSlot]) -> Self {
        let mut grouped: BTreeMap<Uuid, BTreeMap<(NaiveDate, Option<Uuid>), SlotRef>> =
            BTreeMap::new();
        for slot in slots {
            grouped
                .entry(slot.employee_id)
                .or_default()
                .entry((slot.date, slot.work_id))
                .or_insert_with(|| SlotRef {
                    date: slot.date,
                    work_id: slot.work_id,
                    kind: slot.kind.clone(),
                });
        }
        let entries = grouped
            .into_iter()
            .map(|(employee_id, rows)| ResourceConflict {
                employee_id,
                slots: rows.into_values().collect(),
            })
            .collect();
        Self { entries }
    }
}

/// Pre-existing assigned/reserved slots on the requested days collide,
/// except slots belonging to `exclude_work` (re-booking the same work
/// over its own dates is not a conflict). Note slots never collide.
pub async fn find_conflicts(
    store: &dyn CrmStore,
    employee_ids: &[Uuid],
    dates: &[NaiveDate],
    exclude_work: Option<Uuid>,
) -> Result<ConflictReport, StoreError> {
    let slots = store.slots_for(employee_ids, dates).await?;
    let colliding: Vec<ScheduleSlot> = slots
        .into_iter()
        .filter(|slot| slot.kind == SLOT_ASSIGNED || slot.kind == SLOT_RESERVED)
        .filter(|slot| match (slot.work_id, exclude_work) {
            (Some(work_id), Some(excluded)) => work_id != excluded,
            _ => true,
        })
        .collect();
    Ok(ConflictReport::from_slots(&colliding))
}

#[derive(Debug, Clone)]
pub enum DateSelection {
    /// Inclusive range, both ends loose ISO strings.
    Range { start: String, end: String },
    Explicit(Vec<String>),
    /// Fall back to the work's planned dates, then its tender's.
    WorkPlan,
}

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub work_id: Uuid,
    pub employee_ids: Vec<Uuid>,
    pub dates: DateSelection,
    pub note: String,
    pub force: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingSummary {
    pub written: usize,
    pub dates: usize,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("no employees requested")]
    NoResources,
    #[error("no bookable dates resolved")]
    NoDates,
    #[error("unknown work")]
    UnknownWork,
    #[error("booking collides with existing allocations")]
    Conflict(ConflictReport),
    #[error("user {0} may not override the conflict policy")]
    Forbidden(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Books every requested employee for every resolved date: one
/// assigned, locked slot per (employee, day), the work roster grown by
/// union, one audit entry. On a blocking policy with conflicts nothing
/// is written and the caller gets the full report.
pub async fn book(
    store: &dyn CrmStore,
    request: BookingRequest,
    actor: &User,
) -> Result<BookingSummary, BookingError> {
    if request.employee_ids.is_empty() {
        return Err(BookingError::NoResources);
    }
    let work = store
        .get_work(request.work_id)
        .await?
        .ok_or(BookingError::UnknownWork)?;
    let dates = resolve_dates(store, &work, &request.dates).await?;
    if dates.is_empty() {
        return Err(BookingError::NoDates);
    }

    let policy = load_policy(store).await;
    if request.force && !policy.may_override(&actor.username) {
        return Err(BookingError::Forbidden(actor.username.clone()));
    }
    let enforce = policy.block_on_conflict && !request.force;

    let report = find_conflicts(store, &request.employee_ids, &dates, Some(work.id)).await?;
    if enforce && !report.is_empty() {
        return Err(BookingError::Conflict(report));
    }

    apply(
        store,
        &work,
        &request.employee_ids,
        dates,
        request.note,
        actor,
        ACTION_BOOK_CREW,
        false,
        enforce,
    )
    .await
}

/// Moves an already-crewed work to a new date range: the previous slots
/// for its roster are replaced by the new span in the same transaction.
pub async fn rebook_dates(
    store: &dyn CrmStore,
    work_id: Uuid,
    new_start: &str,
    new_end: &str,
    actor: &User,
) -> Result<BookingSummary, BookingError> {
    let work = store
        .get_work(work_id)
        .await?
        .ok_or(BookingError::UnknownWork)?;
    let crew = store.work_crew(work.id).await?;
    if crew.is_empty() {
        // No one booked yet, nothing to move.
        return Ok(BookingSummary {
            written: 0,
            dates: 0,
            start: None,
            end: None,
        });
    }

    let dates = range_dates(new_start, new_end);
    if dates.is_empty() {
        return Err(BookingError::NoDates);
    }

    let policy = load_policy(store).await;
    let report = find_conflicts(store, &crew, &dates, Some(work.id)).await?;
    if policy.block_on_conflict && !report.is_empty() {
        return Err(BookingError::Conflict(report));
    }

    apply(
        store,
        &work,
        &crew,
        dates,
        "rebooked after date change".to_string(),
        actor,
        ACTION_REBOOK_DATES,
        true,
        policy.block_on_conflict,
    )
    .await
}

#[allow(clippy::too_many_arguments)]
async fn apply(
    store: &dyn CrmStore,
    work: &Work,
    employee_ids: &[Uuid],
    dates: Vec<NaiveDate>,
    note: String,
    actor: &User,
    action: &str,
    replace_work_slots: bool,
    enforce_exclusive: bool,
) -> Result<BookingSummary, BookingError> {
    let write = BookingWrite {
        work_id: work.id,
        employee_ids: employee_ids.to_vec(),
        dates: dates.clone(),
        note,
        actor_id: Some(actor.id),
        action: action.to_string(),
        enforce_exclusive,
        replace_work_slots,
    };
    match store.apply_booking(write).await? {
        BookingApply::Applied { written } => Ok(BookingSummary {
            written,
            dates: dates.len(),
            start: dates.first().copied(),
            end: dates.last().copied(),
        }),
        // A competing booking landed between the advisory check and the
        // transaction; surface it the same way.
        BookingApply::Conflicted { slots } => {
            Err(BookingError::Conflict(ConflictReport::from_slots(&slots)))
        }
    }
}

async fn resolve_dates(
    store: &dyn CrmStore,
    work: &Work,
    selection: &DateSelection,
) -> Result<Vec<NaiveDate>, BookingError> {
    let mut dates = match selection {
        DateSelection::Explicit(raw) => raw
            .iter()
            .filter_map(|value| calendar::parse_day(value))
            .collect(),
        DateSelection::Range { start, end } => range_dates(start, end),
        DateSelection::WorkPlan => {
            let (start, end) = work_plan_range(store, work).await?;
            match (start, end) {
                (Some(start), Some(end)) => range_dates(&start, &end),
                _ => Vec::new(),
            }
        }
    };
    dates.sort_unstable();
    dates.dedup();
    Ok(dates)
}

fn range_dates(start: &str, end: &str) -> Vec<NaiveDate> {
    match (calendar::parse_day(start), calendar::parse_day(end)) {
        (Some(start), Some(end)) => calendar::expand_range(start, end),
        _ => Vec::new(),
    }
}

async fn work_plan_range(
    store: &dyn CrmStore,
    work: &Work,
) -> Result<(Option<String>, Option<String>), StoreError> {
    let mut start = work.start_plan.clone();
    let mut end = work.end_plan.clone();
    if start.is_none() || end.is_none() {
        if let Some(tender_id) = work.tender_id {
            if let Some(tender) = store.get_tender(tender_id).await? {
                start = start.or(tender.work_start_plan);
                end = end.or(tender.work_end_plan);
            }
        }
    }
    Ok((start, end))
}
