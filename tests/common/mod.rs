#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use chrono::{NaiveDate, Utc};
use http_body_util::BodyExt;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

use crewplan::config::AppConfig;
use crewplan::models::{
    AuditEntry, Employee, Estimate, NewAuditEntry, NewNotification, Notification, ScheduleSlot,
    Tender, User, Work, SLOT_ASSIGNED, SLOT_RESERVED, SLOT_SOURCE_BOOKING,
};
use crewplan::routes;
use crewplan::state::AppState;
use crewplan::store::{BookingApply, BookingWrite, CrmStore, StoreResult};

/// In-memory stand-in for the Postgres store. Single-threaded semantics
/// behind one lock, so every trait call is trivially atomic — the same
/// guarantees the production transactions give.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<MemInner>,
}

#[derive(Default)]
struct MemInner {
    users: HashMap<Uuid, User>,
    employees: HashMap<Uuid, Employee>,
    tenders: HashMap<Uuid, Tender>,
    estimates: HashMap<Uuid, Estimate>,
    works: HashMap<Uuid, Work>,
    work_crew: BTreeSet<(Uuid, Uuid)>,
    notifications: Vec<Notification>,
    dedup: HashSet<(Uuid, String)>,
    slots: HashMap<(Uuid, NaiveDate), ScheduleSlot>,
    audit: Vec<AuditEntry>,
    settings: HashMap<String, Value>,
}

impl MemStore {
    pub async fn put_user(&self, user: User) {
        self.inner.lock().await.users.insert(user.id, user);
    }

    pub async fn put_employee(&self, employee: Employee) {
        self.inner
            .lock()
            .await
            .employees
            .insert(employee.id, employee);
    }

    pub async fn put_tender(&self, tender: Tender) {
        self.inner.lock().await.tenders.insert(tender.id, tender);
    }

    pub async fn put_estimate(&self, estimate: Estimate) {
        self.inner
            .lock()
            .await
            .estimates
            .insert(estimate.id, estimate);
    }

    pub async fn put_work(&self, work: Work) {
        self.inner.lock().await.works.insert(work.id, work);
    }

    pub async fn put_slot(&self, slot: ScheduleSlot) {
        self.inner
            .lock()
            .await
            .slots
            .insert((slot.employee_id, slot.date), slot);
    }

    pub async fn set_setting(&self, key: &str, value: Value) {
        self.inner
            .lock()
            .await
            .settings
            .insert(key.to_string(), value);
    }

    pub async fn all_notifications(&self) -> Vec<Notification> {
        self.inner.lock().await.notifications.clone()
    }

    pub async fn all_slots(&self) -> Vec<ScheduleSlot> {
        let inner = self.inner.lock().await;
        let mut slots: Vec<ScheduleSlot> = inner.slots.values().cloned().collect();
        slots.sort_by_key(|slot| (slot.employee_id, slot.date));
        slots
    }

    #[allow(dead_code)]
    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.inner.lock().await.audit.clone()
    }
}

#[async_trait]
impl CrmStore for MemStore {
    async fn list_active_users(&self) -> StoreResult<Vec<User>> {
        let inner = self.inner.lock().await;
        let mut users: Vec<User> = inner
            .users
            .values()
            .filter(|u| u.is_active)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.inner.lock().await.users.get(&id).cloned())
    }

    async fn list_active_employees(&self) -> StoreResult<Vec<Employee>> {
        let inner = self.inner.lock().await;
        let mut employees: Vec<Employee> = inner
            .employees
            .values()
            .filter(|e| e.is_active)
            .cloned()
            .collect();
        employees.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(employees)
    }

    async fn list_tenders(&self) -> StoreResult<Vec<Tender>> {
        Ok(self.inner.lock().await.tenders.values().cloned().collect())
    }

    async fn list_estimates(&self) -> StoreResult<Vec<Estimate>> {
        Ok(self.inner.lock().await.estimates.values().cloned().collect())
    }

    async fn get_tender(&self, id: Uuid) -> StoreResult<Option<Tender>> {
        Ok(self.inner.lock().await.tenders.get(&id).cloned())
    }

    async fn get_work(&self, id: Uuid) -> StoreResult<Option<Work>> {
        Ok(self.inner.lock().await.works.get(&id).cloned())
    }

    async fn work_crew(&self, work_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .work_crew
            .iter()
            .filter(|(work, _)| *work == work_id)
            .map(|(_, employee)| *employee)
            .collect())
    }

    async fn load_setting(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.inner.lock().await.settings.get(key).cloned())
    }

    async fn record_notification(&self, new: NewNotification) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        if !inner.dedup.insert((new.user_id, new.dedup_key.clone())) {
            return Ok(false);
        }
        inner.notifications.push(Notification {
            id: new.id,
            user_id: new.user_id,
            title: new.title,
            message: new.message,
            link: new.link,
            kind: new.kind,
            entity_type: new.entity_type,
            entity_id: new.entity_id,
            day_key: new.day_key,
            dedup_key: new.dedup_key,
            is_read: false,
            created_at: Utc::now().naive_utc(),
        });
        Ok(true)
    }

    async fn notifications_for_user(
        &self,
        user_id: Uuid,
        is_read: Option<bool>,
    ) -> StoreResult<Vec<Notification>> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<Notification> = inner
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .filter(|n| is_read.map_or(true, |flag| n.is_read == flag))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn unread_count(&self, user_id: Uuid) -> StoreResult<i64> {
        let inner = self.inner.lock().await;
        Ok(inner
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count() as i64)
    }

    async fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        for notification in inner.notifications.iter_mut() {
            if notification.id == id && notification.user_id == user_id {
                notification.is_read = true;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn mark_all_read(&self, user_id: Uuid) -> StoreResult<usize> {
        let mut inner = self.inner.lock().await;
        let mut updated = 0;
        for notification in inner.notifications.iter_mut() {
            if notification.user_id == user_id && !notification.is_read {
                notification.is_read = true;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn delete_notification(&self, user_id: Uuid, id: Uuid) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let before = inner.notifications.len();
        inner
            .notifications
            .retain(|n| !(n.id == id && n.user_id == user_id));
        Ok(inner.notifications.len() != before)
    }

    async fn slots_for(
        &self,
        employee_ids: &[Uuid],
        dates: &[NaiveDate],
    ) -> StoreResult<Vec<ScheduleSlot>> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<ScheduleSlot> = inner
            .slots
            .values()
            .filter(|slot| employee_ids.contains(&slot.employee_id) && dates.contains(&slot.date))
            .cloned()
            .collect();
        rows.sort_by_key(|slot| (slot.employee_id, slot.date));
        Ok(rows)
    }

    async fn apply_booking(&self, write: BookingWrite) -> StoreResult<BookingApply> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now().naive_utc();

        let mut colliding: Vec<ScheduleSlot> = inner
            .slots
            .values()
            .filter(|slot| {
                write.employee_ids.contains(&slot.employee_id)
                    && write.dates.contains(&slot.date)
                    && (slot.kind == SLOT_ASSIGNED || slot.kind == SLOT_RESERVED)
                    && slot.work_id != Some(write.work_id)
            })
            .cloned()
            .collect();
        colliding.sort_by_key(|slot| (slot.employee_id, slot.date));
        if write.enforce_exclusive && !colliding.is_empty() {
            return Ok(BookingApply::Conflicted { slots: colliding });
        }

        if write.replace_work_slots {
            inner.slots.retain(|_, slot| {
                !(slot.work_id == Some(write.work_id)
                    && write.employee_ids.contains(&slot.employee_id))
            });
        }

        let mut written = 0;
        for employee_id in &write.employee_ids {
            for date in &write.dates {
                inner.slots.insert(
                    (*employee_id, *date),
                    ScheduleSlot {
                        id: Uuid::new_v4(),
                        employee_id: *employee_id,
                        date: *date,
                        kind: SLOT_ASSIGNED.to_string(),
                        work_id: Some(write.work_id),
                        note: write.note.clone(),
                        locked: true,
                        source: SLOT_SOURCE_BOOKING.to_string(),
                        updated_at: now,
                    },
                );
                written += 1;
            }
        }

        for employee_id in &write.employee_ids {
            inner.work_crew.insert((write.work_id, *employee_id));
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
        inner.audit.push(AuditEntry {
            id: entry.id,
            actor_id: entry.actor_id,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            action: entry.action,
            payload: entry.payload,
            created_at: now,
        });

        Ok(BookingApply::Applied { written })
    }
}

pub fn user(username: &str, role: &str) -> User {
    let now = Utc::now().naive_utc();
    User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        full_name: username.to_string(),
        role: role.to_string(),
        is_active: true,
        birth_date: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn employee(full_name: &str) -> Employee {
    let now = Utc::now().naive_utc();
    Employee {
        id: Uuid::new_v4(),
        full_name: full_name.to_string(),
        position: None,
        birth_date: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

pub fn tender(customer: &str) -> Tender {
    let now = Utc::now().naive_utc();
    Tender {
        id: Uuid::new_v4(),
        customer: customer.to_string(),
        status: "new".to_string(),
        docs_deadline: None,
        handoff_at: None,
        responsible_pm_id: None,
        work_start_plan: None,
        work_end_plan: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn estimate(tender_id: Uuid, pm_id: Option<Uuid>) -> Estimate {
    let now = Utc::now().naive_utc();
    Estimate {
        id: Uuid::new_v4(),
        tender_id,
        pm_id,
        approval_status: "draft".to_string(),
        sent_for_approval_at: None,
        rework_requested_at: None,
        decided_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn work(title: &str) -> Work {
    let now = Utc::now().naive_utc();
    Work {
        id: Uuid::new_v4(),
        tender_id: None,
        title: title.to_string(),
        status: "new".to_string(),
        start_plan: None,
        end_plan: None,
        created_at: now,
        updated_at: now,
    }
}

#[allow(dead_code)]
pub fn slot(employee_id: Uuid, date: NaiveDate, kind: &str, work_id: Option<Uuid>) -> ScheduleSlot {
    ScheduleSlot {
        id: Uuid::new_v4(),
        employee_id,
        date,
        kind: kind.to_string(),
        work_id,
        note: String::new(),
        locked: false,
        source: "manual".to_string(),
        updated_at: Utc::now().naive_utc(),
    }
}

#[allow(dead_code)]
pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub struct TestApp {
    pub store: Arc<MemStore>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let config = AppConfig {
            database_url: "postgres://unused".to_string(),
            database_max_pool_size: 1,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            cors_allowed_origin: None,
        };
        let store = Arc::new(MemStore::default());
        let state = AppState::new(config, store.clone());
        let router = routes::create_router(state);
        Self { store, router }
    }

    #[allow(dead_code)]
    pub async fn get(&self, path: &str, user: Option<Uuid>) -> Response {
        self.send(Method::GET, path, None::<&()>, user).await
    }

    #[allow(dead_code)]
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        user: Option<Uuid>,
    ) -> Response {
        self.send(Method::POST, path, Some(payload), user).await
    }

    #[allow(dead_code)]
    pub async fn put(&self, path: &str, user: Option<Uuid>) -> Response {
        self.send(Method::PUT, path, None::<&()>, user).await
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, user: Option<Uuid>) -> Response {
        self.send(Method::DELETE, path, None::<&()>, user).await
    }

    async fn send<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: Option<&T>,
        user: Option<Uuid>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(user) = user {
            builder = builder.header("x-user-id", user.to_string());
        }
        let request = match payload {
            Some(payload) => {
                let body = serde_json::to_vec(payload).expect("serializable payload");
                builder
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .expect("valid request")
            }
            None => builder.body(Body::empty()).expect("valid request"),
        };
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response")
    }
}

#[allow(dead_code)]
pub async fn body_json(response: Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("readable body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("JSON body")
}
