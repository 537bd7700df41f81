//! JSON routes.

pub mod admin;
pub mod auth;
pub mod notifications;
pub mod profiles;
pub mod proverbs;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};

use ph_core::error::PhError;

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/health`: 200 when the database answers (even if the cache
/// store does not), 503 otherwise.
pub async fn health(State(state): State<AppState>) -> Response {
    let report = state.registry.health_check().await;
    let status = StatusCode::from_u16(report.http_status()).unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
    (status, Json(report)).into_response()
}

async fn not_found() -> ApiError {
    ApiError(PhError::not_found("route"))
}

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        // Auth
        .route("/api/auth/check-rate-limit", post(auth::check_rate_limit))
        .route("/api/auth/signup", post(auth::sign_up))
        .route("/api/auth/login", post(auth::sign_in))
        .route("/api/auth/logout", post(auth::sign_out))
        .route("/api/account/email", post(auth::change_email))
        .route("/api/account/password", post(auth::change_password))
        // Proverbs
        .route("/api/feed", get(proverbs::feed))
        .route("/api/proverbs", post(proverbs::create))
        .route(
            "/api/proverbs/{id}",
            get(proverbs::get).patch(proverbs::update).delete(proverbs::delete),
        )
        .route("/api/proverbs/{id}/like", post(proverbs::toggle_like))
        .route("/api/proverbs/{id}/bookmark", post(proverbs::toggle_bookmark))
        .route(
            "/api/proverbs/{id}/comments",
            get(proverbs::list_comments).post(proverbs::create_comment),
        )
        .route("/api/proverbs/{id}/report", post(proverbs::report))
        .route("/api/comments/{id}", delete(proverbs::delete_comment))
        .route("/api/bookmarks", get(proverbs::bookmarks))
        // Profiles
        .route("/api/profiles/{username}", get(profiles::get_profile))
        .route("/api/profiles/{username}/followers", get(profiles::followers))
        .route("/api/profiles/{username}/following", get(profiles::following))
        .route("/api/profile", patch(profiles::update_profile))
        .route("/api/users/{username}/follow", post(profiles::toggle_follow))
        .route("/api/leaderboard", get(profiles::leaderboard))
        // Notifications
        .route("/api/notifications", get(notifications::list))
        .route("/api/notifications/read-all", post(notifications::mark_all_read))
        .route("/api/notifications/{id}/read", post(notifications::mark_read))
        // Admin
        .route("/api/admin/logs", get(admin::logs))
        .route("/api/admin/reports", get(admin::reports))
        .route("/api/admin/reports/{id}/resolve", post(admin::resolve_report))
        .route("/api/admin/users/{id}/ban", post(admin::ban_user))
        .route("/api/admin/users/{id}/role", post(admin::set_role))
        .fallback(not_found)
}
