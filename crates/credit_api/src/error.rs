use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use credit_protocol::{ErrorResponse, ParseError};
use credit_store::StoreError;
use thiserror::Error;
use tracing::{debug, error};

/// Failure of an HTTP operation.
///
/// Responses only ever carry [`ApiError::public_message`]. Store and
/// configuration details are logged, never returned to the client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("empty body")]
    EmptyBody,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("content must be multipart/form-data")]
    NotMultipart,

    #[error("malformed multipart body: {0}")]
    MalformedMultipart(String),

    #[error("no files sent")]
    NoFiles,

    #[error("request body too large")]
    PayloadTooLarge,

    #[error("proposal not found")]
    NotFound,

    #[error("input bucket is not configured")]
    MissingBucket,

    #[error("{context}: {source}")]
    Store {
        context: &'static str,
        #[source]
        source: StoreError,
    },
}

impl ApiError {
    pub fn store(context: &'static str, source: StoreError) -> Self {
        ApiError::Store { context, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::EmptyBody
            | ApiError::InvalidJson(_)
            | ApiError::NotMultipart
            | ApiError::MalformedMultipart(_)
            | ApiError::NoFiles => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MissingBucket | ApiError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message placed in the `erro` field of the response body.
    pub fn public_message(&self) -> &'static str {
        match self {
            ApiError::EmptyBody => "empty body",
            ApiError::InvalidJson(_) => "invalid JSON",
            ApiError::NotMultipart => "content must be multipart/form-data",
            ApiError::MalformedMultipart(_) => "malformed multipart body",
            ApiError::NoFiles => "no files sent",
            ApiError::PayloadTooLarge => "request body too large",
            ApiError::NotFound => "proposal not found",
            ApiError::MissingBucket => "storage is not configured",
            ApiError::Store { context, .. } => context,
        }
    }
}

impl From<ParseError> for ApiError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::EmptyBody => ApiError::EmptyBody,
            ParseError::InvalidJson(detail) | ParseError::Shape(detail) => {
                ApiError::InvalidJson(detail)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(ErrorResponse::new(self.public_message()))).into_response()
    }
}
