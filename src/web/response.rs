//! JSON response writing
//!
//! Every API response, success or failure, goes through [`json_response`] so
//! handlers share one wire format.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

/// Upload body could not be parsed (malformed or over the size limit)
pub const MSG_PARSE_FORM: &str = "Failed to parse form";
/// Upload body has no usable `video` file part
pub const MSG_GET_FILE: &str = "Failed to get file";
/// Upload could not be written to storage
pub const MSG_SAVE_FILE: &str = "Failed to save file";
/// Upload directory could not be read
pub const MSG_READ_VIDEOS: &str = "Failed to read videos";
/// Requested recording does not exist
pub const MSG_VIDEO_NOT_FOUND: &str = "Video not found";
/// Dev server did not answer
pub const MSG_UPSTREAM: &str = "Failed to reach development server";

/// Serialize `payload` as a JSON response with the given status.
///
/// A payload that fails to serialize is logged and answered with the same
/// status and an empty body.
pub fn json_response<T: Serialize + ?Sized>(status: StatusCode, payload: &T) -> Response {
    let body = match serde_json::to_vec(payload) {
        Ok(body) => body,
        Err(e) => {
            error!(error = %e, %status, "failed to encode response");
            Vec::new()
        }
    };

    (
        status,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )],
        body,
    )
        .into_response()
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a str,
}

/// API error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Client sent something unusable
    BadRequest(&'static str),
    /// Nothing at that path
    NotFound(&'static str),
    /// Storage failure
    Internal(&'static str),
    /// Dev server unreachable
    BadGateway(&'static str),
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Client-facing message
    pub fn message(&self) -> &'static str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::Internal(msg)
            | ApiError::BadGateway(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        json_response(
            self.status(),
            &ErrorBody {
                error: self.message(),
            },
        )
    }
}
