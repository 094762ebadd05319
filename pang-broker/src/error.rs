//! API error codes and their JSON rendering.
//!
//! Clients of the broker branch on the numeric `code`, never on the HTTP
//! status: every error is delivered with `200 OK` and a body of the form
//! `{"error": <message>, "status": "error", "code": <number>}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::provider::ProviderError;

/// Numeric error codes understood by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    ConnectionRequired = 1000,
    ConnectionInvalid = 1001,
    ChatIdRequired = 1002,
    InvalidJson = 1003,
    BodyTooLarge = 1004,
    NotFound = 1005,
    ServerError = 1006,
}

impl ErrorCode {
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.as_u16())
    }
}

/// Errors returned by broker handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("connectionId required. Call /createconnection first.")]
    ConnectionRequired,

    #[error("connectionId not valid. Call /createconnection again.")]
    ConnectionInvalid,

    #[error("chatId required")]
    ChatIdRequired,

    /// Malformed JSON; the message names what failed to parse.
    #[error("{0}")]
    InvalidJson(String),

    #[error("Body too large")]
    BodyTooLarge,

    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    Server(String),
}

impl ApiError {
    /// The request body itself was not JSON.
    pub fn invalid_body() -> Self {
        Self::InvalidJson("Invalid JSON".into())
    }

    pub fn invalid_history() -> Self {
        Self::InvalidJson("Invalid JSON for history".into())
    }

    pub fn invalid_chats() -> Self {
        Self::InvalidJson("Invalid JSON for chats".into())
    }

    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::ConnectionRequired => ErrorCode::ConnectionRequired,
            Self::ConnectionInvalid => ErrorCode::ConnectionInvalid,
            Self::ChatIdRequired => ErrorCode::ChatIdRequired,
            Self::InvalidJson(_) => ErrorCode::InvalidJson,
            Self::BodyTooLarge => ErrorCode::BodyTooLarge,
            Self::NotFound => ErrorCode::NotFound,
            Self::Server(_) => ErrorCode::ServerError,
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        Self::Server(err.to_string())
    }
}

impl From<pang_common::Error> for ApiError {
    fn from(err: pang_common::Error) -> Self {
        Self::Server(err.to_string())
    }
}

/// Wire shape of an error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub status: &'static str,
    pub code: ErrorCode,
}

impl From<&ApiError> for ErrorBody {
    fn from(err: &ApiError) -> Self {
        Self {
            error: err.to_string(),
            status: "error",
            code: err.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if matches!(self, Self::Server(_)) {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(code = self.code().as_u16(), error = %self, "Request rejected");
        }

        (StatusCode::OK, Json(ErrorBody::from(&self))).into_response()
    }
}

/// Result alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use test_case::test_case;

    #[test_case(ApiError::ConnectionRequired, 1000 ; "connection required")]
    #[test_case(ApiError::ConnectionInvalid, 1001 ; "connection invalid")]
    #[test_case(ApiError::ChatIdRequired, 1002 ; "chat id required")]
    #[test_case(ApiError::invalid_body(), 1003 ; "invalid json")]
    #[test_case(ApiError::BodyTooLarge, 1004 ; "body too large")]
    #[test_case(ApiError::NotFound, 1005 ; "not found")]
    #[test_case(ApiError::Server("boom".into()), 1006 ; "server error")]
    fn test_codes(err: ApiError, expected: u16) {
        assert_eq!(err.code().as_u16(), expected);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ApiError::ConnectionRequired.to_string(),
            "connectionId required. Call /createconnection first."
        );
        assert_eq!(ApiError::invalid_history().to_string(), "Invalid JSON for history");
        assert_eq!(ApiError::invalid_chats().to_string(), "Invalid JSON for chats");
    }

    #[tokio::test]
    async fn test_response_is_200_with_error_body() {
        let response = ApiError::ChatIdRequired.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"error": "chatId required", "status": "error", "code": 1002})
        );
    }
}
