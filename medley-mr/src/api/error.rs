//! API error responses
//!
//! Maps the resolver's error taxonomy onto HTTP statuses. Bodies carry
//! `{error: {kind, message, retryable}}` so automated callers can act on
//! the retryable flag without parsing messages.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use medley_common::Error;
use serde_json::json;
use thiserror::Error as ThisError;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, ThisError)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::Core(err) = self;

        let status = match &err {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            // Upstream trouble, not ours
            Error::Auth(_) | Error::Timeout(_) | Error::Source(_) => StatusCode::BAD_GATEWAY,
            Error::Database(_) | Error::Io(_) | Error::Config(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let mut error_body = json!({
            "kind": err.kind(),
            "message": err.to_string(),
            "retryable": err.retryable(),
        });
        if let Error::RateLimited { retry_after_ms: Some(ms), .. } = &err {
            error_body["retry_after_ms"] = json!(ms);
        }

        (status, Json(json!({ "error": error_body }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_for(err: Error) -> StatusCode {
        ApiError::Core(err).into_response().status()
    }

    #[test]
    fn taxonomy_maps_to_expected_statuses() {
        assert_eq!(status_for(Error::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_for(Error::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(Error::RateLimited { message: "x".into(), retry_after_ms: Some(2000) }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(status_for(Error::Auth("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(Error::Timeout("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(Error::Source("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_for(Error::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
