use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::booking::{self, BookingError, BookingRequest, BookingSummary, DateSelection};
use crate::calendar;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

use super::CurrentUser;

#[derive(Deserialize)]
pub struct ConflictCheckPayload {
    pub employee_ids: Vec<Uuid>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub dates: Option<Vec<String>>,
    /// Allocations belonging to this work are not conflicts.
    pub work_id: Option<Uuid>,
}

pub async fn check_conflicts(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Json(payload): Json<ConflictCheckPayload>,
) -> AppResult<Json<serde_json::Value>> {
    let dates = collect_dates(
        payload.dates.as_deref(),
        payload.start.as_deref(),
        payload.end.as_deref(),
    );
    if payload.employee_ids.is_empty() || dates.is_empty() {
        return Err(AppError::bad_request(
            "employee_ids and a date range are required",
        ));
    }

    let report = booking::find_conflicts(
        state.store.as_ref(),
        &payload.employee_ids,
        &dates,
        payload.work_id,
    )
    .await?;
    Ok(Json(json!({
        "clear": report.is_empty(),
        "conflicts": report.entries,
    })))
}

#[derive(Deserialize)]
pub struct BookingPayload {
    pub work_id: Uuid,
    pub employee_ids: Vec<Uuid>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub dates: Option<Vec<String>>,
    pub note: Option<String>,
    #[serde(default)]
    pub force: bool,
}

pub async fn create_booking(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(payload): Json<BookingPayload>,
) -> Response {
    let dates = match (payload.dates, payload.start, payload.end) {
        (Some(dates), _, _) => DateSelection::Explicit(dates),
        (None, Some(start), Some(end)) => DateSelection::Range { start, end },
        _ => DateSelection::WorkPlan,
    };
    let request = BookingRequest {
        work_id: payload.work_id,
        employee_ids: payload.employee_ids,
        dates,
        note: payload.note.unwrap_or_default(),
        force: payload.force,
    };

    match booking::book(state.store.as_ref(), request, &actor).await {
        Ok(summary) => summary_response(StatusCode::CREATED, &summary),
        Err(err) => booking_error_response(err),
    }
}

#[derive(Deserialize)]
pub struct RebookPayload {
    pub work_id: Uuid,
    pub start: String,
    pub end: String,
}

pub async fn rebook_work(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(payload): Json<RebookPayload>,
) -> Response {
    match booking::rebook_dates(
        state.store.as_ref(),
        payload.work_id,
        &payload.start,
        &payload.end,
        &actor,
    )
    .await
    {
        Ok(summary) => summary_response(StatusCode::OK, &summary),
        Err(err) => booking_error_response(err),
    }
}

fn summary_response(status: StatusCode, summary: &BookingSummary) -> Response {
    (
        status,
        Json(json!({
            "written": summary.written,
            "dates": summary.dates,
            "start": summary.start,
            "end": summary.end,
        })),
    )
        .into_response()
}

/// Only the conflict case carries structure; everything else maps onto
/// a plain status + message.
fn booking_error_response(err: BookingError) -> Response {
    let message = err.to_string();
    match err {
        BookingError::Conflict(report) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "conflict", "conflicts": report.entries })),
        )
            .into_response(),
        BookingError::NoDates | BookingError::NoResources => {
            AppError::bad_request(message).into_response()
        }
        BookingError::UnknownWork => AppError::not_found().into_response(),
        BookingError::Forbidden(_) => AppError::forbidden(message).into_response(),
        BookingError::Store(err) => AppError::from(err).into_response(),
    }
}

fn collect_dates(
    explicit: Option<&[String]>,
    start: Option<&str>,
    end: Option<&str>,
) -> Vec<NaiveDate> {
    let mut dates: Vec<NaiveDate> = match (explicit, start, end) {
        (Some(values), _, _) => values
            .iter()
            .filter_map(|value| calendar::parse_day(value))
            .collect(),
        (None, Some(start), Some(end)) => {
            match (calendar::parse_day(start), calendar::parse_day(end)) {
                (Some(start), Some(end)) => calendar::expand_range(start, end),
                _ => Vec::new(),
            }
        }
        _ => Vec::new(),
    };
    dates.sort_unstable();
    dates.dedup();
    dates
}
