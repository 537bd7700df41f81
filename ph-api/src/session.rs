//! Session lookup for requests.
//!
//! The session token travels in the configured cookie, or as a bearer token
//! for non-browser clients. The session gate resolves it once per request and
//! stores the result as a [`Viewer`] extension; the extractors below read it
//! from there.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, Extensions, HeaderMap};
use tracing::warn;

use ph_core::error::PhError;
use ph_services::AuthUser;

use crate::error::ApiError;
use crate::state::AppState;

/// The signed-in user for this request, if any.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<AuthUser>);

/// Pull the session token out of the cookie header or an
/// `Authorization: Bearer` header.
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    for value in headers.get_all(header::COOKIE) {
        let Ok(value) = value.to_str() else { continue };
        for pair in value.split(';') {
            if let Some((name, token)) = pair.trim().split_once('=') {
                if name == cookie_name && !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Resolve the request's session. Lookup failures are logged and treated as
/// signed out.
pub fn resolve_viewer(state: &AppState, headers: &HeaderMap) -> Viewer {
    let Some(token) = session_token(headers, &state.config.auth.session_cookie) else {
        return Viewer(None);
    };
    match state.registry.auth.resolve_session(&token) {
        Ok(user) => Viewer(user),
        Err(e) => {
            warn!("session lookup failed: {e}");
            Viewer(None)
        }
    }
}

/// Client address: first `X-Forwarded-For` hop, else the socket peer.
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    forwarded.or_else(|| {
        extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    })
}

fn viewer_from_parts(parts: &Parts, state: &AppState) -> Viewer {
    match parts.extensions.get::<Viewer>() {
        Some(viewer) => viewer.clone(),
        None => resolve_viewer(state, &parts.headers),
    }
}

/// Extractor for handlers that require a session. Rejects with a 401 JSON
/// error.
pub struct CurrentUser(pub AuthUser);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        viewer_from_parts(parts, state)
            .0
            .map(CurrentUser)
            .ok_or_else(|| ApiError(PhError::unauthenticated()))
    }
}

/// Extractor for handlers that only personalize their output.
pub struct MaybeUser(pub Option<AuthUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(viewer_from_parts(parts, state).0))
    }
}

/// The raw session token, for sign-out.
pub struct SessionToken(pub Option<String>);

impl FromRequestParts<AppState> for SessionToken {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(SessionToken(session_token(&parts.headers, &state.config.auth.session_cookie)))
    }
}

/// Client address extractor.
pub struct ClientIp(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip(&parts.headers, &parts.extensions)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; ph_session=abc123; other=1"),
        );
        assert_eq!(session_token(&headers, "ph_session").as_deref(), Some("abc123"));
        assert_eq!(session_token(&headers, "missing"), None);
    }

    #[test]
    fn test_token_from_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok"));
        assert_eq!(session_token(&headers, "ph_session").as_deref(), Some("tok"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert_eq!(session_token(&headers, "ph_session"), None);
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&headers, &Extensions::new()).as_deref(), Some("203.0.113.7"));
        assert_eq!(client_ip(&HeaderMap::new(), &Extensions::new()), None);
    }
}
