use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use ph_models::queries::LeaderboardEntry;
use ph_models::{ProfileUpdate, PublicProfile};
use ph_services::{ProfilePage, Toggled};

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::routes::proverbs::PageQuery;
use crate::session::{CurrentUser, MaybeUser};
use crate::state::AppState;

pub async fn get_profile(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    ApiPath(username): ApiPath<String>,
) -> ApiResult<Json<ProfilePage>> {
    let page = state.registry.profiles.profile_page(&username, viewer.as_ref()).await?;
    Ok(Json(page))
}

pub async fn followers(
    State(state): State<AppState>,
    ApiPath(username): ApiPath<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Json<Vec<PublicProfile>>> {
    Ok(Json(state.registry.profiles.followers(&username, query.page)?))
}

pub async fn following(
    State(state): State<AppState>,
    ApiPath(username): ApiPath<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Json<Vec<PublicProfile>>> {
    Ok(Json(state.registry.profiles.following(&username, query.page)?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> ApiResult<Json<PublicProfile>> {
    Ok(Json(state.registry.profiles.update_profile(&user, &update).await?))
}

pub async fn toggle_follow(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(username): ApiPath<String>,
) -> ApiResult<Json<Toggled>> {
    Ok(Json(state.registry.follows.toggle_follow(&user, &username)?))
}

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

pub async fn leaderboard(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<LeaderboardQuery>,
) -> ApiResult<Json<Vec<LeaderboardEntry>>> {
    Ok(Json(state.registry.profiles.leaderboard(query.limit).await?))
}
