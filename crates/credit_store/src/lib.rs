//! Object store abstraction.
//!
//! Objects are addressed by `(bucket, key)`. Keys are `/`-separated relative
//! paths. Every backend guarantees that a `put` is atomic per object: readers
//! see either the previous content or the complete new content, never a
//! partial write.
//!
//! Backends:
//! - [`FsStore`]: one directory per bucket under a root directory
//! - [`MemoryStore`]: in-process map that also records every call, used as a
//!   test double and for ephemeral runs
//!
//! [`NotifyingStore`] wraps any backend and emits a
//! [`StorageNotification`](credit_protocol::StorageNotification) after each
//! successful `put`.

mod fs;
mod memory;
mod notify;

pub use fs::FsStore;
pub use memory::{MemoryStore, StoreCall};
pub use notify::NotifyingStore;

use async_trait::async_trait;
use thiserror::Error;

/// Metadata of a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    /// `None` when the backend does not persist content types.
    pub content_type: Option<String>,
}

/// Errors returned by store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("invalid object address {bucket}/{key}: {reason}")]
    InvalidKey {
        bucket: String,
        key: String,
        reason: &'static str,
    },

    #[error("{message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Backend refused or failed the operation for a non-I/O reason.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn not_found(bucket: &str, key: &str) -> Self {
        StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        StoreError::Io {
            message: message.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Durable blob store addressed by `(bucket, key)`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// URI scheme used when reporting object locations (`file`, `mem`, ...).
    fn scheme(&self) -> &'static str;

    /// Write `bytes` under `key`, replacing any previous object atomically.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> StoreResult<ObjectMeta>;

    /// Read the full content of an object.
    async fn get(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>>;

    /// All objects whose key starts with `prefix`, sorted by key.
    async fn list(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<ObjectMeta>>;

    /// True if an object exists under exactly `key`.
    async fn exists(&self, bucket: &str, key: &str) -> StoreResult<bool> {
        Ok(self
            .list(bucket, key)
            .await?
            .iter()
            .any(|meta| meta.key == key))
    }
}

/// Validate an object address before it reaches a backend.
///
/// Buckets are a single segment; keys are relative paths without empty,
/// `.` or `..` segments.
pub fn validate_address(bucket: &str, key: &str) -> StoreResult<()> {
    let invalid = |reason| StoreError::InvalidKey {
        bucket: bucket.to_string(),
        key: key.to_string(),
        reason,
    };

    if bucket.is_empty() {
        return Err(invalid("bucket name is empty"));
    }
    if bucket.contains(['/', '\\']) || bucket == "." || bucket == ".." {
        return Err(invalid("bucket name must be a single path segment"));
    }
    if key.is_empty() {
        return Err(invalid("key is empty"));
    }
    if key.contains('\\') || key.contains('\0') {
        return Err(invalid("key contains a forbidden character"));
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(invalid("key contains an empty or relative segment"));
    }
    Ok(())
}

/// Validate a listing prefix. An empty prefix lists the whole bucket.
pub(crate) fn validate_prefix(bucket: &str, prefix: &str) -> StoreResult<()> {
    if prefix.is_empty() {
        return validate_address(bucket, "_");
    }
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        return validate_address(bucket, "_");
    }
    validate_address(bucket, trimmed)
}
