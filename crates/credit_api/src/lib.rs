//! HTTP surface of the credit proposal pipeline.
//!
//! | Method | Path | |
//! |---|---|---|
//! | GET | `/` | service banner |
//! | POST | `/propostas` | validate and store a proposal |
//! | GET | `/propostas/{id}` | raw stored proposal |
//! | POST | `/propostas/{id}/documentos` | multipart document upload |
//!
//! Each handler is a thin wrapper over an `*_impl` function that takes the
//! shared [`ApiState`] and returns a typed result, so the logic can be tested
//! without a listener.

mod error;
mod handlers;

pub use error::ApiError;
pub use handlers::{
    create_proposal_impl, get_proposal_impl, upload_documents_impl, UploadedFile,
};

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use credit_protocol::defaults::DEFAULT_MAX_BODY_BYTES;
use credit_store::ObjectStore;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Default cap for a whole document upload request.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn ObjectStore>,
    /// Bucket holding proposals and documents. Blank means unconfigured.
    pub input_bucket: String,
    pub max_body_bytes: usize,
    pub max_upload_bytes: usize,
}

impl ApiState {
    pub fn new(store: Arc<dyn ObjectStore>, input_bucket: impl Into<String>) -> Self {
        Self {
            store,
            input_bucket: input_bucket.into(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub(crate) fn input_bucket(&self) -> Result<&str, ApiError> {
        let bucket = self.input_bucket.trim();
        if bucket.is_empty() {
            Err(ApiError::MissingBucket)
        } else {
            Ok(bucket)
        }
    }
}

pub fn router(state: ApiState) -> Router {
    let documents = Router::new()
        .route("/propostas/{id}/documentos", post(handlers::upload_documents))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(RequestBodyLimitLayer::new(state.max_upload_bytes));

    Router::new()
        .route("/", get(handlers::banner))
        .route("/propostas", post(handlers::create_proposal))
        .route("/propostas/{id}", get(handlers::get_proposal))
        .layer(DefaultBodyLimit::max(state.max_body_bytes))
        .layer(RequestBodyLimitLayer::new(state.max_body_bytes))
        .merge(documents)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(
    listener: tokio::net::TcpListener,
    state: ApiState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
