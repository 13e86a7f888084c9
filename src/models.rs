use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

/// Office staff with CRM accounts. Lifecycle fields entered through the
/// CRUD screens (`birth_date` included) are loose ISO-8601 strings; the
/// engine parses them defensively and skips what it cannot read.
#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub role: String,
    pub is_active: bool,
    pub birth_date: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Field crew. No accounts, only schedule and birthday facts.
#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = employees)]
pub struct Employee {
    pub id: Uuid,
    pub full_name: String,
    pub position: Option<String>,
    pub birth_date: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = tenders)]
pub struct Tender {
    pub id: Uuid,
    pub customer: String,
    pub status: String,
    pub docs_deadline: Option<String>,
    pub handoff_at: Option<String>,
    pub responsible_pm_id: Option<Uuid>,
    pub work_start_plan: Option<String>,
    pub work_end_plan: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

pub const APPROVAL_SENT: &str = "sent";
pub const APPROVAL_REWORK: &str = "rework";
pub const APPROVAL_QUESTION: &str = "question";

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = estimates)]
#[diesel(belongs_to(Tender))]
pub struct Estimate {
    pub id: Uuid,
    pub tender_id: Uuid,
    pub pm_id: Option<Uuid>,
    pub approval_status: String,
    pub sent_for_approval_at: Option<String>,
    pub rework_requested_at: Option<String>,
    pub decided_at: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = works)]
pub struct Work {
    pub id: Uuid,
    pub tender_id: Option<Uuid>,
    pub title: String,
    pub status: String,
    pub start_plan: Option<String>,
    pub end_plan: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = notifications)]
#[diesel(belongs_to(User))]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub link: String,
    pub kind: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub day_key: String,
    pub dedup_key: String,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub link: String,
    pub kind: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub day_key: String,
    pub dedup_key: String,
}

pub const SLOT_ASSIGNED: &str = "assigned";
pub const SLOT_RESERVED: &str = "reserved";
pub const SLOT_NOTE: &str = "note";

pub const SLOT_SOURCE_MANUAL: &str = "manual";
pub const SLOT_SOURCE_BOOKING: &str = "booking";

/// One allocation fact per (employee, date); ranges are expanded into a
/// row per day and upserts replace, never accumulate. `locked` + a
/// `booking` source mark rows a manual edit would clobber.
#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = schedule_slots)]
pub struct ScheduleSlot {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub date: NaiveDate,
    pub kind: String,
    pub work_id: Option<Uuid>,
    pub note: String,
    pub locked: bool,
    pub source: String,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schedule_slots)]
pub struct NewScheduleSlot {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub date: NaiveDate,
    pub kind: String,
    pub work_id: Option<Uuid>,
    pub note: String,
    pub locked: bool,
    pub source: String,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Queryable, Associations)]
#[diesel(table_name = work_crew)]
#[diesel(belongs_to(Work))]
#[diesel(belongs_to(Employee))]
#[diesel(primary_key(work_id, employee_id))]
pub struct WorkCrew {
    pub work_id: Uuid,
    pub employee_id: Uuid,
    pub assigned_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = work_crew)]
pub struct NewWorkCrew {
    pub work_id: Uuid,
    pub employee_id: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = audit_log)]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub action: String,
    pub payload: serde_json::Value,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = audit_log)]
pub struct NewAuditEntry {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub action: String,
    pub payload: serde_json::Value,
}
