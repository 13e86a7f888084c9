use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Employee, Estimate, NewNotification, Notification, ScheduleSlot, Tender, User, Work,
};

mod pg;

pub use pg::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Everything `apply_booking` needs to run as one storage transaction:
/// the exclusivity re-check, the per-day slot upserts, the roster union
/// and the audit entry all commit or roll back together.
#[derive(Debug, Clone)]
pub struct BookingWrite {
    pub work_id: Uuid,
    pub employee_ids: Vec<Uuid>,
    /// Sorted ascending; the audit span is taken from the ends.
    pub dates: Vec<NaiveDate>,
    pub note: String,
    pub actor_id: Option<Uuid>,
    pub action: String,
    /// When set, any colliding assigned/reserved slot aborts the write.
    pub enforce_exclusive: bool,
    /// Rebooking path: drop the work's previous slots for these
    /// employees before writing the new ones.
    pub replace_work_slots: bool,
}

#[derive(Debug)]
pub enum BookingApply {
    Applied { written: usize },
    Conflicted { slots: Vec<ScheduleSlot> },
}

/// Persistence boundary of the engine core. Production talks to
/// Postgres via [`PgStore`]; tests drive the same trait with an
/// in-memory store. Implementations must give read-your-writes
/// consistency within a single tick.
#[async_trait]
pub trait CrmStore: Send + Sync + 'static {
    async fn list_active_users(&self) -> StoreResult<Vec<User>>;

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn list_active_employees(&self) -> StoreResult<Vec<Employee>>;

    async fn list_tenders(&self) -> StoreResult<Vec<Tender>>;

    async fn list_estimates(&self) -> StoreResult<Vec<Estimate>>;

    async fn get_tender(&self, id: Uuid) -> StoreResult<Option<Tender>>;

    async fn get_work(&self, id: Uuid) -> StoreResult<Option<Work>>;

    /// Roster of every employee ever booked onto the work.
    async fn work_crew(&self, work_id: Uuid) -> StoreResult<Vec<Uuid>>;

    async fn load_setting(&self, key: &str) -> StoreResult<Option<serde_json::Value>>;

    /// Single conditional insert keyed on (user, dedup key). Returns
    /// false when an identical notification already exists; the unique
    /// constraint makes this safe against overlapping ticks.
    async fn record_notification(&self, new: NewNotification) -> StoreResult<bool>;

    async fn notifications_for_user(
        &self,
        user_id: Uuid,
        is_read: Option<bool>,
    ) -> StoreResult<Vec<Notification>>;

    async fn unread_count(&self, user_id: Uuid) -> StoreResult<i64>;

    async fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> StoreResult<bool>;

    async fn mark_all_read(&self, user_id: Uuid) -> StoreResult<usize>;

    async fn delete_notification(&self, user_id: Uuid, id: Uuid) -> StoreResult<bool>;

    /// Allocation facts for the given employees restricted to the given
    /// dates, ordered by employee then date.
    async fn slots_for(
        &self,
        employee_ids: &[Uuid],
        dates: &[NaiveDate],
    ) -> StoreResult<Vec<ScheduleSlot>>;

    async fn apply_booking(&self, write: BookingWrite) -> StoreResult<BookingApply>;
}
