//! Request middleware: security headers, the session gate and the generic
//! API rate limit.

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use tracing::debug;

use ph_services::Limiter;

use crate::error::ApiError;
use crate::route_class::{classify, login_redirect, RouteClass};
use crate::session::{client_ip, resolve_viewer, Viewer};
use crate::state::AppState;

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; img-src 'self' https: data:; \
     style-src 'self' 'unsafe-inline'; frame-ancestors 'none'; base-uri 'self'; form-action 'self'";

pub async fn security_headers(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(header::CONTENT_SECURITY_POLICY, HeaderValue::from_static(CONTENT_SECURITY_POLICY));
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(header::REFERRER_POLICY, HeaderValue::from_static("strict-origin-when-cross-origin"));
    headers.insert(
        "permissions-policy",
        HeaderValue::from_static("camera=(), microphone=(), geolocation=()"),
    );
    if state.config.server.secure_cookies {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }
    response
}

/// Resolve the session, attach it as a [`Viewer`] and redirect signed-out
/// visitors away from protected pages.
pub async fn session_gate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let viewer = resolve_viewer(&state, request.headers());

    if classify(request.uri().path()) == RouteClass::Protected && viewer.0.is_none() {
        let target = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| request.uri().path());
        debug!("redirecting signed-out request for {target} to login");
        return Redirect::to(&login_redirect(&state.config.server.login_path, target)).into_response();
    }

    request.extensions_mut().insert(viewer);
    next.run(request).await
}

fn is_mutation(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Apply the generic API limiter to `/api/` mutations, keyed by user id or
/// client address. Fails open when the store is down.
pub async fn api_rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !request.uri().path().starts_with("/api/") || !is_mutation(request.method()) {
        return next.run(request).await;
    }

    let user_id = request
        .extensions()
        .get::<Viewer>()
        .and_then(|v| v.0.as_ref())
        .map(|u| u.id);
    let identifier = match user_id {
        Some(id) => format!("user:{id}"),
        None => format!(
            "ip:{}",
            client_ip(request.headers(), request.extensions()).unwrap_or_else(|| "unknown".into())
        ),
    };

    let result = state.registry.limiter.check_rate_limit(&identifier, Limiter::Api).await;
    if let Err(e) = result.into_result() {
        return ApiError(e).into_response();
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(result.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(result.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(result.reset));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutations() {
        assert!(is_mutation(&Method::POST));
        assert!(is_mutation(&Method::DELETE));
        assert!(!is_mutation(&Method::GET));
        assert!(!is_mutation(&Method::OPTIONS));
    }
}
