use axum::body::Bytes;
use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use credit_ids::{DocumentId, ProposalId};
use credit_protocol::defaults::{
    JSON_CONTENT_TYPE, OCTET_STREAM_CONTENT_TYPE, PROPOSAL_STORED_MESSAGE, SERVICE_BANNER,
};
use credit_protocol::keys::is_safe_segment;
use credit_protocol::{
    document_key, object_uri, proposal_key, proposal_key_for, validate_json, BannerResponse,
    CreateProposalResponse, DocumentUploadResponse, DocumentUploadResult,
};
use tracing::{debug, error, info};

use crate::{ApiError, ApiState};

const DOCUMENT_STORE_FAILED: &str = "failed to store document";

/// One file part of a document upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

pub(crate) async fn banner() -> Json<BannerResponse> {
    Json(BannerResponse {
        mensagem: SERVICE_BANNER.to_string(),
    })
}

pub(crate) async fn create_proposal(State(state): State<ApiState>, body: Bytes) -> Response {
    match create_proposal_impl(&state, &body).await {
        Ok(resp) => {
            let location = format!("/propostas/{}", resp.id);
            (
                StatusCode::CREATED,
                [(header::LOCATION, location)],
                Json(resp),
            )
                .into_response()
        }
        Err(err) => err.into_response(),
    }
}

/// Validate and store a proposal under a fresh id.
///
/// The stored object is the request body byte for byte.
pub async fn create_proposal_impl(
    state: &ApiState,
    body: &[u8],
) -> Result<CreateProposalResponse, ApiError> {
    validate_json(body)?;
    let bucket = state.input_bucket()?;

    let id = ProposalId::new();
    let key = proposal_key(&id);
    let meta = state
        .store
        .put(bucket, &key, JSON_CONTENT_TYPE, body.to_vec())
        .await
        .map_err(|e| ApiError::store("failed to store proposal", e))?;
    info!(proposal_id = %id, bucket, key = %key, size = meta.size, "proposal stored");

    Ok(CreateProposalResponse {
        local: object_uri(state.store.scheme(), bucket, &key),
        id: id.into_string(),
        mensagem: PROPOSAL_STORED_MESSAGE.to_string(),
    })
}

pub(crate) async fn get_proposal(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match get_proposal_impl(&state, &id).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)],
            bytes,
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

/// Raw bytes of a stored proposal.
pub async fn get_proposal_impl(state: &ApiState, id: &str) -> Result<Vec<u8>, ApiError> {
    let bucket = state.input_bucket()?;
    let Some(key) = proposal_key_for(id) else {
        debug!(id, "rejecting unsafe proposal id");
        return Err(ApiError::NotFound);
    };
    state.store.get(bucket, &key).await.map_err(|e| {
        if e.is_not_found() {
            ApiError::NotFound
        } else {
            ApiError::store("failed to read proposal", e)
        }
    })
}

pub(crate) async fn upload_documents(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            debug!(error = %rejection, "document upload is not multipart");
            return ApiError::NotMultipart.into_response();
        }
    };
    let files = match read_files(multipart).await {
        Ok(files) => files,
        Err(err) => return err.into_response(),
    };
    match upload_documents_impl(&state, &id, files).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Collect every part that carries a file name. Plain form fields are skipped.
async fn read_files(mut multipart: Multipart) -> Result<Vec<UploadedFile>, ApiError> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        files.push(UploadedFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    Ok(files)
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::MalformedMultipart(err.body_text())
    }
}

/// Store each file under `documents/{id}/`.
///
/// A failed file does not abort the others; it is reported in its result
/// entry instead.
pub async fn upload_documents_impl(
    state: &ApiState,
    proposal_id: &str,
    files: Vec<UploadedFile>,
) -> Result<DocumentUploadResponse, ApiError> {
    if !is_safe_segment(proposal_id) {
        return Err(ApiError::NotFound);
    }
    if files.is_empty() {
        return Err(ApiError::NoFiles);
    }
    let bucket = state.input_bucket()?;
    let scheme = state.store.scheme();

    let mut resultados = Vec::with_capacity(files.len());
    for file in files {
        let key = document_key(proposal_id, &DocumentId::new(), &file.file_name);
        let content_type = file
            .content_type
            .as_deref()
            .unwrap_or(OCTET_STREAM_CONTENT_TYPE);
        match state.store.put(bucket, &key, content_type, file.bytes).await {
            Ok(meta) => {
                info!(proposal_id, key = %key, size = meta.size, "document stored");
                resultados.push(DocumentUploadResult::stored(
                    file.file_name,
                    object_uri(scheme, bucket, &key),
                ));
            }
            Err(e) => {
                error!(proposal_id, key = %key, error = %e, "failed to store document");
                resultados.push(DocumentUploadResult::failed(
                    file.file_name,
                    DOCUMENT_STORE_FAILED,
                ));
            }
        }
    }

    Ok(DocumentUploadResponse {
        id: proposal_id.to_string(),
        resultados,
    })
}
