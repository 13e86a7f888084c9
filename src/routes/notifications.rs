use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Notification;
use crate::state::AppState;

use super::CurrentUser;

#[derive(Deserialize)]
pub struct ListQuery {
    pub is_read: Option<bool>,
}

#[derive(Serialize)]
pub struct NotificationView {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub link: String,
    pub kind: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub day_key: String,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}

impl From<Notification> for NotificationView {
    fn from(value: Notification) -> Self {
        Self {
            id: value.id,
            title: value.title,
            message: value.message,
            link: value.link,
            kind: value.kind,
            entity_type: value.entity_type,
            entity_id: value.entity_id,
            day_key: value.day_key,
            is_read: value.is_read,
            created_at: value.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct NotificationList {
    pub notifications: Vec<NotificationView>,
    pub unread_count: i64,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<NotificationList>> {
    let notifications = state
        .store
        .notifications_for_user(user.id, query.is_read)
        .await?;
    let unread_count = state.store.unread_count(user.id).await?;
    Ok(Json(NotificationList {
        notifications: notifications.into_iter().map(Into::into).collect(),
        unread_count,
    }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let updated = state.store.mark_notification_read(user.id, id).await?;
    if updated {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found())
    }
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Value>> {
    let updated = state.store.mark_all_read(user.id).await?;
    Ok(Json(json!({ "updated": updated })))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let deleted = state.store.delete_notification(user.id, id).await?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found())
    }
}
