// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping of coordinator errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use parley_core::ChatError;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// An HTTP-mapped error.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// 403 for reads on resources the caller does not own.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        let status = match &err {
            ChatError::NotFound(_) => StatusCode::NOT_FOUND,
            ChatError::AlreadyClosed(_)
            | ChatError::ConflictOwner
            | ChatError::NoLongerAvailable => StatusCode::CONFLICT,
            ChatError::AgentCapacityExceeded | ChatError::InvalidArgument(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ChatError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ChatError::Contention { .. } | ChatError::Timeout { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ChatError::Backend { .. } => StatusCode::BAD_GATEWAY,
            ChatError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_the_contract() {
        let cases = [
            (ChatError::NotFound("c".into()), StatusCode::NOT_FOUND),
            (ChatError::AlreadyClosed("c".into()), StatusCode::CONFLICT),
            (ChatError::ConflictOwner, StatusCode::CONFLICT),
            (ChatError::NoLongerAvailable, StatusCode::CONFLICT),
            (
                ChatError::AgentCapacityExceeded,
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ChatError::InvalidArgument("x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ChatError::Unauthorized("x".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (
                ChatError::Contention {
                    name: "lock".into(),
                    waited_ms: 1,
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ChatError::backend(std::io::Error::other("down")),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status, expected);
        }
    }

    #[test]
    fn error_body_serializes() {
        let body = ErrorBody {
            error: "conversation not found: c-1".into(),
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("conversation not found"));
    }
}
