use async_trait::async_trait;
use credit_protocol::StorageNotification;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{ObjectMeta, ObjectStore, StoreResult};

/// Emits a [`StorageNotification`] after every successful `put` on the
/// wrapped store.
///
/// The notification is sent only once the object is durably written, so a
/// consumer can always read what it is notified about. If the receiving side
/// has gone away the write still succeeds and the notification is dropped.
#[derive(Clone)]
pub struct NotifyingStore {
    inner: Arc<dyn ObjectStore>,
    tx: mpsc::Sender<StorageNotification>,
}

impl NotifyingStore {
    pub fn new(inner: Arc<dyn ObjectStore>, tx: mpsc::Sender<StorageNotification>) -> Self {
        Self { inner, tx }
    }

    /// Wrap `inner` and return the receiving end of a new notification channel.
    pub fn channel(
        inner: Arc<dyn ObjectStore>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<StorageNotification>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(inner, tx), rx)
    }
}

#[async_trait]
impl ObjectStore for NotifyingStore {
    fn scheme(&self) -> &'static str {
        self.inner.scheme()
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> StoreResult<ObjectMeta> {
        let meta = self.inner.put(bucket, key, content_type, bytes).await?;
        let notification = StorageNotification::new(
            meta.bucket.clone(),
            meta.key.clone(),
            meta.size,
            meta.content_type.clone(),
        );
        if self.tx.send(notification).await.is_err() {
            warn!(bucket, key, "notification receiver closed, dropping event");
        } else {
            debug!(bucket, key, "notification queued");
        }
        Ok(meta)
    }

    async fn get(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>> {
        self.inner.get(bucket, key).await
    }

    async fn list(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<ObjectMeta>> {
        self.inner.list(bucket, prefix).await
    }
}
