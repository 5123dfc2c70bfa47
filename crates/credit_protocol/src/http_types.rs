//! JSON bodies of the HTTP surface.
//!
//! Field names are part of the public contract and stay in the API's
//! Portuguese vocabulary (`local`, `mensagem`, `erro`, ...).

use serde::{Deserialize, Serialize};

/// `GET /`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BannerResponse {
    pub mensagem: String,
}

/// `201 Created` body of `POST /propostas`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProposalResponse {
    pub id: String,
    /// Store URI of the written object.
    pub local: String,
    pub mensagem: String,
}

/// Body of every 4xx/5xx response. Carries a generic message only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub erro: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            erro: message.into(),
        }
    }
}

/// Body of `POST /propostas/{id}/documentos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUploadResponse {
    pub id: String,
    pub resultados: Vec<DocumentUploadResult>,
}

/// Outcome for one uploaded file: either `local` or `erro` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUploadResult {
    pub arquivo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub erro: Option<String>,
}

impl DocumentUploadResult {
    pub fn stored(file_name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            arquivo: file_name.into(),
            local: Some(location.into()),
            erro: None,
        }
    }

    pub fn failed(file_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            arquivo: file_name.into(),
            local: None,
            erro: Some(message.into()),
        }
    }
}
