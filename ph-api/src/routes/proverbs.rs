use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use ph_models::queries::{FeedFilter, ProverbView};
use ph_models::{Comment, CommentView, Report};
use ph_services::{ProverbInput, ProverbPage, Toggled};

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::session::{CurrentUser, MaybeUser};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub filter: Option<FeedFilter>,
    /// Full-text search instead of a feed.
    #[serde(default)]
    pub q: Option<String>,
    /// Restrict to one author.
    #[serde(default)]
    pub author: Option<String>,
}

pub async fn feed(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    ApiQuery(query): ApiQuery<FeedQuery>,
) -> ApiResult<Json<ProverbPage>> {
    let proverbs = &state.registry.proverbs;
    let page = if let Some(q) = query.q.as_deref() {
        proverbs.search(q, query.page, viewer.as_ref())?
    } else if let Some(author) = query.author.as_deref() {
        proverbs.by_user(author, query.page, viewer.as_ref())?
    } else {
        proverbs
            .feed(viewer.as_ref(), query.page.unwrap_or(1), query.filter.unwrap_or_default())
            .await?
    };
    Ok(Json(page))
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(input): ApiJson<ProverbInput>,
) -> ApiResult<(StatusCode, Json<ProverbView>)> {
    let view = state.registry.proverbs.create(&user, &input)?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<ProverbView>> {
    Ok(Json(state.registry.proverbs.get(id, viewer.as_ref())?))
}

pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<ProverbInput>,
) -> ApiResult<Json<ProverbView>> {
    Ok(Json(state.registry.proverbs.update(&user, id, &input)?))
}

pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    state.registry.proverbs.delete(&user, id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_like(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Toggled>> {
    Ok(Json(state.registry.likes.toggle_like(&user, id)?))
}

pub async fn toggle_bookmark(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Toggled>> {
    Ok(Json(state.registry.bookmarks.toggle_bookmark(&user, id)?))
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<u32>,
}

pub async fn bookmarks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Json<ProverbPage>> {
    Ok(Json(state.registry.bookmarks.list_bookmarks(&user, query.page)?))
}

pub async fn list_comments(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Json<Vec<CommentView>>> {
    Ok(Json(state.registry.comments.list_comments(id, query.page)?))
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

pub async fn create_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let comment = state.registry.comments.create_comment(&user, id, &req.content)?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    state.registry.comments.delete_comment(&user, id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub reason: String,
}

pub async fn report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<ReportRequest>,
) -> ApiResult<(StatusCode, Json<Report>)> {
    let report = state.registry.moderation.report_proverb(&user, id, &req.reason)?;
    Ok((StatusCode::CREATED, Json(report)))
}
