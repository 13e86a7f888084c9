use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::sla;
use crate::state::AppState;

use super::CurrentUser;

/// Navigation hook. The scan is best-effort by contract: whatever
/// happens inside is logged, and the caller always gets an OK so page
/// loads are never blocked by alerting.
pub async fn run_tick(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> Json<Value> {
    sla::run_tick(state.store.as_ref(), &actor).await;
    Json(json!({ "status": "ok" }))
}
