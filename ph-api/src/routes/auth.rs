use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use ph_core::error::PhError;
use ph_services::{IssuedSession, Limiter};

use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::session::{ClientIp, CurrentUser, SessionToken};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CheckRateLimitRequest {
    /// Limiter name; defaults to `login`.
    #[serde(default)]
    pub limiter: Option<String>,
}

/// Report the caller's standing with a limiter without spending a request.
/// The identifier is always the client address, the same key sign-in
/// charges. Answers 200 when the next request would be allowed and 429 when
/// not, with the same `{success, limit, remaining, reset}` body. A store
/// outage reports success.
pub async fn check_rate_limit(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    body: Bytes,
) -> ApiResult<Response> {
    // The body is optional
    let req: CheckRateLimitRequest = if body.is_empty() {
        CheckRateLimitRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| PhError::validation(format!("invalid request body: {e}")))?
    };
    let limiter = match req.limiter {
        Some(name) => name.parse::<Limiter>()?,
        None => Limiter::Login,
    };
    let identifier = format!("ip:{}", ip.as_deref().unwrap_or("unknown"));

    let result = state.registry.limiter.peek_rate_limit(&identifier, limiter).await;
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::TOO_MANY_REQUESTS
    };
    Ok((status, Json(result)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

fn session_cookie(state: &AppState, value: &str, max_age_secs: i64) -> Result<HeaderValue, ApiError> {
    let mut cookie = format!(
        "{}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}",
        state.config.auth.session_cookie
    );
    if state.config.server.secure_cookies {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| ApiError(PhError::Internal(e.to_string())))
}

fn session_response(state: &AppState, status: StatusCode, session: IssuedSession) -> ApiResult<Response> {
    let cookie = session_cookie(state, &session.token, state.config.auth.session_ttl_hours * 3600)?;
    let mut response = (
        status,
        Json(json!({
            "user": session.user,
            "expiresAt": session.expires_at,
        })),
    )
        .into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

pub async fn sign_up(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ApiJson(req): ApiJson<SignUpRequest>,
) -> ApiResult<Response> {
    let session = state
        .registry
        .auth
        .sign_up(&req.email, &req.username, &req.password, ip.as_deref())?;
    session_response(&state, StatusCode::CREATED, session)
}

pub async fn sign_in(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ApiJson(req): ApiJson<SignInRequest>,
) -> ApiResult<Response> {
    let session = state.registry.auth.sign_in(&req.email, &req.password, ip.as_deref()).await?;
    session_response(&state, StatusCode::OK, session)
}

pub async fn sign_out(State(state): State<AppState>, SessionToken(token): SessionToken) -> ApiResult<Response> {
    if let Some(token) = token {
        state.registry.auth.sign_out(&token)?;
    }
    let mut response = StatusCode::NO_CONTENT.into_response();
    response.headers_mut().insert(header::SET_COOKIE, session_cookie(&state, "", 0)?);
    Ok(response)
}

#[derive(Debug, Deserialize)]
pub struct ChangeEmailRequest {
    pub email: String,
    pub password: String,
}

pub async fn change_email(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<ChangeEmailRequest>,
) -> ApiResult<StatusCode> {
    state.registry.auth.change_email(&user, &req.email, &req.password).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let revoked = state
        .registry
        .auth
        .change_password(&user, &req.current_password, &req.new_password)
        .await?;
    Ok(Json(json!({ "revokedSessions": revoked })))
}
