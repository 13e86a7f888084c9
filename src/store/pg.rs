use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use uuid::Uuid;

use crate::db::PgPool;
use crate::models::{
    Employee, Estimate, NewAuditEntry, NewNotification, NewScheduleSlot, NewWorkCrew,
    Notification, ScheduleSlot, Tender, User, Work, SLOT_ASSIGNED, SLOT_RESERVED,
    SLOT_SOURCE_BOOKING,
};
use crate::schema::{
    app_settings, audit_log, employees, estimates, notifications, schedule_slots, tenders, users,
    work_crew, works,
};

use super::{BookingApply, BookingWrite, CrmStore, StoreError, StoreResult};

type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> StoreResult<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|err| StoreError::Pool(err.to_string()))
    }
}

#[async_trait]
impl CrmStore for PgStore {
    async fn list_active_users(&self) -> StoreResult<Vec<User>> {
        let mut conn = self.conn()?;
        let rows = users::table
            .filter(users::is_active.eq(true))
            .order(users::username.asc())
            .load(&mut conn)?;
        Ok(rows)
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let mut conn = self.conn()?;
        let row = users::table.find(id).first(&mut conn).optional()?;
        Ok(row)
    }

    async fn list_active_employees(&self) -> StoreResult<Vec<Employee>> {
        let mut conn = self.conn()?;
        let rows = employees::table
            .filter(employees::is_active.eq(true))
            .order(employees::full_name.asc())
            .load(&mut conn)?;
        Ok(rows)
    }

    async fn list_tenders(&self) -> StoreResult<Vec<Tender>> {
        let mut conn = self.conn()?;
        let rows = tenders::table.load(&mut conn)?;
        Ok(rows)
    }

    async fn list_estimates(&self) -> StoreResult<Vec<Estimate>> {
        let mut conn = self.conn()?;
        let rows = estimates::table.load(&mut conn)?;
        Ok(rows)
    }

    async fn get_tender(&self, id: Uuid) -> StoreResult<Option<Tender>> {
        let mut conn = self.conn()?;
        let row = tenders::table.find(id).first(&mut conn).optional()?;
        Ok(row)
    }

    async fn get_work(&self, id: Uuid) -> StoreResult<Option<Work>> {
        let mut conn = self.conn()?;
        let row = works::table.find(id).first(&mut conn).optional()?;
        Ok(row)
    }

    async fn work_crew(&self, work_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let mut conn = self.conn()?;
        let rows = work_crew::table
            .filter(work_crew::work_id.eq(work_id))
            .select(work_crew::employee_id)
            .order(work_crew::employee_id.asc())
            .load(&mut conn)?;
        Ok(rows)
    }

    async fn load_setting(&self, key: &str) -> StoreResult<Option<serde_json::Value>> {
        let mut conn = self.conn()?;
        let value = app_settings::table
            .find(key)
            .select(app_settings::value)
            .first(&mut conn)
            .optional()?;
        Ok(value)
    }

    async fn record_notification(&self, new: NewNotification) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let inserted = diesel::insert_into(notifications::table)
            .values(&new)
            .on_conflict((notifications::user_id, notifications::dedup_key))
            .do_nothing()
            .execute(&mut conn)?;
        Ok(inserted > 0)
    }

    async fn notifications_for_user(
        &self,
        user_id: Uuid,
        is_read: Option<bool>,
    ) -> StoreResult<Vec<Notification>> {
        let mut conn = self.conn()?;
        let mut query = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .into_boxed();
        if let Some(is_read) = is_read {
            query = query.filter(notifications::is_read.eq(is_read));
        }
        let rows = query
            .order(notifications::created_at.desc())
            .load(&mut conn)?;
        Ok(rows)
    }

    async fn unread_count(&self, user_id: Uuid) -> StoreResult<i64> {
        let mut conn = self.conn()?;
        let count = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .filter(notifications::is_read.eq(false))
            .count()
            .get_result(&mut conn)?;
        Ok(count)
    }

    async fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let updated = diesel::update(
            notifications::table
                .filter(notifications::id.eq(id))
                .filter(notifications::user_id.eq(user_id)),
        )
        .set(notifications::is_read.eq(true))
        .execute(&mut conn)?;
        Ok(updated > 0)
    }

    async fn mark_all_read(&self, user_id: Uuid) -> StoreResult<usize> {
        let mut conn = self.conn()?;
        let updated = diesel::update(
            notifications::table
                .filter(notifications::user_id.eq(user_id))
                .filter(notifications::is_read.eq(false)),
        )
        .set(notifications::is_read.eq(true))
        .execute(&mut conn)?;
        Ok(updated)
    }

    async fn delete_notification(&self, user_id: Uuid, id: Uuid) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let deleted = diesel::delete(
            notifications::table
                .filter(notifications::id.eq(id))
                .filter(notifications::user_id.eq(user_id)),
        )
        .execute(&mut conn)?;
        Ok(deleted > 0)
    }

    async fn slots_for(
        &self,
        employee_ids: &[Uuid],
        dates: &[NaiveDate],
    ) -> StoreResult<Vec<ScheduleSlot>> {
        let mut conn = self.conn()?;
        let rows = schedule_slots::table
            .filter(schedule_slots::employee_id.eq_any(employee_ids))
            .filter(schedule_slots::date.eq_any(dates))
            .order((schedule_slots::employee_id.asc(), schedule_slots::date.asc()))
            .load(&mut conn)?;
        Ok(rows)
    }

    async fn apply_booking(&self, write: BookingWrite) -> StoreResult<BookingApply> {
        let mut conn = self.conn()?;
        let now = Utc::now().naive_utc();

        let apply = conn.transaction::<BookingApply, diesel::result::Error, _>(|conn| {
            // Exclusivity is re-checked inside the transaction so a
            // concurrent booking cannot slip in between the caller's
            // advisory check and this write. The work's own slots are
            // never collisions, so this runs before any replacement.
            let colliding: Vec<ScheduleSlot> = schedule_slots::table
                .filter(schedule_slots::employee_id.eq_any(&write.employee_ids))
                .filter(schedule_slots::date.eq_any(&write.dates))
                .filter(schedule_slots::kind.eq_any(vec![SLOT_ASSIGNED, SLOT_RESERVED]))
                .filter(
                    schedule_slots::work_id
                        .is_null()
                        .or(schedule_slots::work_id.ne(write.work_id)),
                )
                .order((
                    schedule_slots::employee_id.asc(),
                    schedule_slots::date.asc(),
                ))
                .load(conn)?;
            if write.enforce_exclusive && !colliding.is_empty() {
                return Ok(BookingApply::Conflicted { slots: colliding });
            }

            if write.replace_work_slots {
                diesel::delete(
                    schedule_slots::table
                        .filter(schedule_slots::work_id.eq(write.work_id))
                        .filter(schedule_slots::employee_id.eq_any(&write.employee_ids)),
                )
                .execute(conn)?;
            }

            let mut written = 0usize;
            for employee_id in &write.employee_ids {
                for date in &write.dates {
                    let slot = NewScheduleSlot {
                        id: Uuid::new_v4(),
                        employee_id: *employee_id,
                        date: *date,
                        kind: SLOT_ASSIGNED.to_string(),
                        work_id: Some(write.work_id),
                        note: write.note.clone(),
                        locked: true,
                        source: SLOT_SOURCE_BOOKING.to_string(),
                    };
                    diesel::insert_into(schedule_slots::table)
                        .values(&slot)
                        .on_conflict((schedule_slots::employee_id, schedule_slots::date))
                        .do_update()
                        .set((
                            schedule_slots::kind.eq(SLOT_ASSIGNED),
                            schedule_slots::work_id.eq(Some(write.work_id)),
                            schedule_slots::note.eq(write.note.clone()),
                            schedule_slots::locked.eq(true),
                            schedule_slots::source.eq(SLOT_SOURCE_BOOKING),
                            schedule_slots::updated_at.eq(now),
                        ))
                        .execute(conn)?;
                    written += 1;
                }
            }

            for employee_id in &write.employee_ids {
                diesel::insert_into(work_crew::table)
                    .values(&NewWorkCrew {
                        work_id: write.work_id,
                        employee_id: *employee_id,
                    })
                    .on_conflict((work_crew::work_id, work_crew::employee_id))
                    .do_nothing()
                    .execute(conn)?;
            }

            let entry = NewAuditEntry {
                id: Uuid::new_v4(),
                actor_id: write.actor_id,
                entity_type: "work".to_string(),
                entity_id: Some(write.work_id),
                action: write.action.clone(),
                payload: serde_json::json!({
                    "work_id": write.work_id,
                    "employees": write.employee_ids,
                    "dates_count": write.dates.len(),
                    "span": { "start": write.dates.first(), "end": write.dates.last() },
                    "note": write.note,
                }),
            };
            diesel::insert_into(audit_log::table)
                .values(&entry)
                .execute(conn)?;

            Ok(BookingApply::Applied { written })
        })?;

        Ok(apply)
    }
}
