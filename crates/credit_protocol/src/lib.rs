//! Shared contracts for the credit proposal pipeline.
//!
//! Everything that crosses a process or storage boundary lives here:
//!
//! - [`proposal`]: the proposal codec (validation, parsing, serialization)
//! - [`decision`]: the persisted decision record
//! - [`keys`]: the storage key scheme binding proposals to decisions
//! - [`events`]: the storage notification delivered to the decision worker
//! - [`http_types`]: JSON bodies of the HTTP surface

mod amount;
pub mod decision;
pub mod defaults;
pub mod events;
pub mod http_types;
pub mod keys;
pub mod proposal;

pub use decision::{DecisionResult, DecisionStatus};
pub use events::StorageNotification;
pub use http_types::{
    BannerResponse, CreateProposalResponse, DocumentUploadResponse, DocumentUploadResult,
    ErrorResponse,
};
pub use keys::{
    base_name, decision_key, document_key, is_json_object_name, object_uri, proposal_key,
    proposal_key_for,
};
pub use proposal::{parse, serialize, serialize_pretty, validate_json, ParseError, Proposal};
