//! Admin-only endpoints. Every handler checks the caller's role first.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use ph_core::constants::DEFAULT_LOG_PAGE_SIZE;
use ph_models::queries::{LogPage, LogQuery};
use ph_models::{LogLevel, Report, ReportStatus};
use ph_services::ReportAction;

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::session::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LogsParams {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub search: Option<String>,
}

impl LogsParams {
    fn into_query(self) -> ApiResult<LogQuery> {
        let level = match self.level.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(level) => Some(level.parse::<LogLevel>()?),
        };
        Ok(LogQuery {
            level,
            search: self.search,
            page: self.page.unwrap_or(1),
            limit: self.limit.unwrap_or(DEFAULT_LOG_PAGE_SIZE),
        })
    }
}

pub async fn logs(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(params): ApiQuery<LogsParams>,
) -> ApiResult<Json<LogPage>> {
    state.registry.auth.require_admin(&user)?;
    let query = params.into_query()?;
    Ok(Json(state.registry.audit.query_logs(&query)?))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportsParams {
    #[serde(default)]
    pub status: Option<ReportStatus>,
    #[serde(default)]
    pub page: Option<u32>,
}

pub async fn reports(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(params): ApiQuery<ReportsParams>,
) -> ApiResult<Json<Vec<Report>>> {
    let reports = state.registry.moderation.list_reports(&user, params.status, params.page)?;
    Ok(Json(reports))
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub action: ReportAction,
}

pub async fn resolve_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<ResolveRequest>,
) -> ApiResult<Json<Report>> {
    Ok(Json(state.registry.moderation.resolve_report(&user, id, req.action)?))
}

#[derive(Debug, Deserialize)]
pub struct BanRequest {
    pub banned: bool,
}

pub async fn ban_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<BanRequest>,
) -> ApiResult<StatusCode> {
    state.registry.moderation.set_banned(&user, id, req.banned)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

pub async fn set_role(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<RoleRequest>,
) -> ApiResult<StatusCode> {
    state.registry.moderation.set_role(&user, id, &req.role)?;
    Ok(StatusCode::NO_CONTENT)
}
