// File: src/error.rs
// Purpose: Errors raised while building a redirect

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RedirectError {
    /// A request-dependent operation ran before `set_request`.
    #[error("no request is attached to the redirect response")]
    MissingRequest,

    #[error("the attached request carries no session")]
    MissingSession,

    #[error("cannot build a message bag from {0}")]
    UnsupportedErrorShape(String),

    #[error("cannot redirect to an empty URL")]
    EmptyTargetUrl,

    #[error("the HTTP status code {0} is not a redirect")]
    NotARedirect(u16),

    #[error("failed to serialize flash data: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for RedirectError {
    fn into_response(self) -> Response {
        tracing::error!("Redirect failed: {}", self);
        let body = Json(ErrorBody {
            error: self.to_string(),
        });

        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_is_internal() {
        let resp = RedirectError::MissingRequest.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            RedirectError::NotARedirect(200).to_string(),
            "the HTTP status code 200 is not a redirect"
        );
        assert_eq!(
            RedirectError::UnsupportedErrorShape("a number".into()).to_string(),
            "cannot build a message bag from a number"
        );
    }
}
