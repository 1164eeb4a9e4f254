use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::engine::EngineError;
use crate::store::StoreError;

/// Every failure a handler can return. Rendered as `{"error": ..., "reason": ...}`.
#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    BadRequest(String),
    /// The caller named itself and is not the booking's owner.
    Forbidden,
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Engine(e) => match e {
                EngineError::Denied(_) | EngineError::AlreadyExists(_) => StatusCode::CONFLICT,
                EngineError::NotFound(_) => StatusCode::NOT_FOUND,
                EngineError::Invalid(_) => StatusCode::BAD_REQUEST,
                // The upstream store refused the write.
                EngineError::Store(StoreError::Rejected { .. }) => StatusCode::CONFLICT,
                EngineError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error, reason) = match &self {
            ApiError::Engine(EngineError::Denied(reason)) => (reason.to_string(), Some(*reason)),
            ApiError::Engine(EngineError::Store(e)) => {
                tracing::error!(error = %e, "store failure");
                (self.to_string(), None)
            }
            _ => (self.to_string(), None),
        };
        (status, Json(json!({ "error": error, "reason": reason }))).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Engine(e) => write!(f, "{e}"),
            ApiError::BadRequest(msg) => write!(f, "bad request: {msg}"),
            ApiError::Forbidden => write!(f, "not the owner of this booking"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Engine(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DenyReason;

    #[test]
    fn status_mapping() {
        let cases = [
            (ApiError::from(EngineError::Denied(DenyReason::TeamBusy)), StatusCode::CONFLICT),
            (ApiError::from(EngineError::AlreadyExists("b1".into())), StatusCode::CONFLICT),
            (ApiError::from(EngineError::NotFound("b1".into())), StatusCode::NOT_FOUND),
            (ApiError::from(EngineError::Invalid("duration too long")), StatusCode::BAD_REQUEST),
            (ApiError::from(EngineError::Store(StoreError::Closed)), StatusCode::SERVICE_UNAVAILABLE),
            (
                ApiError::from(EngineError::Store(StoreError::Rejected {
                    status: 409,
                    message: "TeamBusy".into(),
                })),
                StatusCode::CONFLICT,
            ),
            (ApiError::Forbidden, StatusCode::FORBIDDEN),
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
        ];
        for (err, want) in cases {
            assert_eq!(err.into_response().status(), want);
        }
    }
}
