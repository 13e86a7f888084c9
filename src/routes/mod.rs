use axum::http::HeaderValue;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::{error::AppError, models::User, state::AppState};

pub mod health;
pub mod notifications;
pub mod schedule;
pub mod tick;

/// Identity established by the out-of-scope auth layer and forwarded as
/// an `x-user-id` header. This core only resolves the user record and
/// refuses inactive accounts.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .ok_or_else(AppError::unauthorized)?;
        let user_id = Uuid::parse_str(raw).map_err(|_| AppError::unauthorized())?;
        let user = state
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(AppError::unauthorized)?;
        if !user.is_active {
            return Err(AppError::unauthorized());
        }
        Ok(CurrentUser(user))
    }
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let notifications_routes = Router::new()
        .route("/", get(notifications::list_notifications))
        .route("/read-all", put(notifications::mark_all_read))
        .route("/:id/read", put(notifications::mark_read))
        .route("/:id", delete(notifications::delete_notification));

    let schedule_routes = Router::new()
        .route("/conflicts", post(schedule::check_conflicts))
        .route("/bookings", post(schedule::create_booking))
        .route("/rebook", post(schedule::rebook_work));

    Router::new()
        .nest("/api/notifications", notifications_routes)
        .nest("/api/schedule", schedule_routes)
        .route("/api/sla/tick", post(tick::run_tick))
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
