//! Mapping of service errors onto HTTP responses.
//!
//! Every failure leaves the server as
//! `{ "error": "<label>", "message": "<text>" }` with the status code of the
//! underlying [`PhError`]. Server-side failures are logged and their details
//! replaced with a generic message.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use ph_core::error::PhError;

pub type ApiResult<T> = Result<T, ApiError>;

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset: Option<i64>,
}

#[derive(Debug)]
pub struct ApiError(pub PhError);

impl From<PhError> for ApiError {
    fn from(e: PhError) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self(PhError::validation(e.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        Self(PhError::validation(e.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        Self(PhError::validation(e.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = if self.0.is_client_error() {
            self.0.to_string()
        } else {
            error!("request failed: {}", self.0);
            "internal server error".to_string()
        };

        let (limit, remaining, reset) = match &self.0 {
            PhError::RateLimited { limit, remaining, reset } => (Some(*limit), Some(*remaining), Some(*reset)),
            _ => (None, None, None),
        };

        let body = ErrorBody {
            error: self.0.label(),
            message,
            limit,
            remaining,
            reset,
        };

        let mut response = (status, Json(body)).into_response();
        if let (Some(limit), Some(remaining), Some(reset)) = (limit, remaining, reset) {
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
            headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
            headers.insert("x-ratelimit-reset", HeaderValue::from(reset));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (PhError::validation("bad"), StatusCode::BAD_REQUEST),
            (PhError::unauthenticated(), StatusCode::UNAUTHORIZED),
            (PhError::forbidden("no"), StatusCode::FORBIDDEN),
            (PhError::not_found("proverb"), StatusCode::NOT_FOUND),
            (PhError::Conflict("taken".into()), StatusCode::CONFLICT),
            (PhError::Database("disk I/O error".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_rate_limit_headers() {
        let response = ApiError(PhError::RateLimited {
            limit: 5,
            remaining: 0,
            reset: 1_700_000_000_000,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["x-ratelimit-limit"], "5");
        assert_eq!(response.headers()["x-ratelimit-reset"], "1700000000000");
    }
}
