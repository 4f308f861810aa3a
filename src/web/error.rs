//! Typed API errors for malformed requests and failed mutating commands.
//!
//! Dataset reads never produce these; they degrade inside the response
//! envelope instead.

use crate::openclaw::InvokeError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ApiErrorCode {
    InvalidJobId,
    UnknownDataset,
    CommandTimeout,
    CommandFailed,
}

impl ApiErrorCode {
    fn status(self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidJobId => StatusCode::BAD_REQUEST,
            ApiErrorCode::UnknownDataset => StatusCode::NOT_FOUND,
            ApiErrorCode::CommandTimeout => StatusCode::GATEWAY_TIMEOUT,
            ApiErrorCode::CommandFailed => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    /// `InvokeError::kind` of the underlying failure, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }
}

impl From<InvokeError> for ApiError {
    fn from(err: InvokeError) -> Self {
        let code = match err {
            InvokeError::Timeout { .. } => ApiErrorCode::CommandTimeout,
            _ => ApiErrorCode::CommandFailed,
        };
        Self {
            code,
            message: err.to_string(),
            cause: Some(err.kind().to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}
