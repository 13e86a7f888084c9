use chrono::NaiveDate;
use uuid::Uuid;

use crate::calendar;
use crate::models::NewNotification;
use crate::rules::RuleKind;
use crate::store::{CrmStore, StoreResult};

/// A notification before it has been through the dedup gate.
#[derive(Debug, Clone)]
pub struct NoticeDraft {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub link: String,
    pub kind: RuleKind,
    pub entity_type: &'static str,
    pub entity_id: Uuid,
    pub day: NaiveDate,
}

/// The idempotence partition: one notification per (rule, entity,
/// calendar day) per recipient, however often a tick runs.
pub fn dedup_key(kind: RuleKind, entity_type: &str, entity_id: Uuid, day_key: &str) -> String {
    format!(
        "sla:{}:{}:{}:{}",
        kind.as_str(),
        entity_type,
        entity_id,
        day_key
    )
}

/// Writes the record unless the recipient already holds one with the
/// same dedup key. The store enforces uniqueness in a single
/// conditional insert, so overlapping ticks cannot both win.
pub async fn notify_once(store: &dyn CrmStore, draft: NoticeDraft) -> StoreResult<bool> {
    let day_key = calendar::day_key(draft.day);
    let dedup_key = dedup_key(draft.kind, draft.entity_type, draft.entity_id, &day_key);
    let record = NewNotification {
        id: Uuid::new_v4(),
        user_id: draft.user_id,
        title: draft.title,
        message: draft.message,
        link: draft.link,
        kind: draft.kind.as_str().to_string(),
        entity_type: draft.entity_type.to_string(),
        entity_id: draft.entity_id,
        day_key,
        dedup_key,
    };
    store.record_notification(record).await
}
