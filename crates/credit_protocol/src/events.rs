//! Event surface between the object store and the decision worker.

use serde::{Deserialize, Serialize};

/// Delivered once (at least) per successful object write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageNotification {
    pub bucket: String,
    pub name: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl StorageNotification {
    pub fn new(
        bucket: impl Into<String>,
        name: impl Into<String>,
        size: u64,
        content_type: Option<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
            size,
            content_type,
        }
    }
}
