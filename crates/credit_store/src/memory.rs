use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::{validate_address, validate_prefix, ObjectMeta, ObjectStore, StoreError, StoreResult};

/// One recorded store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Put { bucket: String, key: String },
    Get { bucket: String, key: String },
    List { bucket: String, prefix: String },
}

#[derive(Debug, Clone)]
struct StoredObject {
    content_type: String,
    bytes: Vec<u8>,
}

/// In-process backend.
///
/// Records every call so tests can assert on store traffic, and can be told
/// to fail reads or writes to exercise error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<(String, String), StoredObject>>,
    calls: Mutex<Vec<StoreCall>>,
    fail_puts: AtomicBool,
    fail_gets: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every call made so far, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        lock(&self.calls).map(|c| c.clone()).unwrap_or_default()
    }

    pub fn put_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, StoreCall::Put { .. }))
            .count()
    }

    /// Keys currently stored in `bucket`.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        lock(&self.objects)
            .map(|objects| {
                objects
                    .keys()
                    .filter(|(b, _)| b == bucket)
                    .map(|(_, k)| k.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn content_type(&self, bucket: &str, key: &str) -> Option<String> {
        lock(&self.objects).ok().and_then(|objects| {
            objects
                .get(&(bucket.to_string(), key.to_string()))
                .map(|o| o.content_type.clone())
        })
    }

    /// Make subsequent `put` calls fail with [`StoreError::Unavailable`].
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `get` calls fail with [`StoreError::Unavailable`].
    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    /// Seed an object without recording a call.
    pub fn insert(&self, bucket: &str, key: &str, content_type: &str, bytes: impl Into<Vec<u8>>) {
        if let Ok(mut objects) = lock(&self.objects) {
            objects.insert(
                (bucket.to_string(), key.to_string()),
                StoredObject {
                    content_type: content_type.to_string(),
                    bytes: bytes.into(),
                },
            );
        }
    }

    fn record(&self, call: StoreCall) -> StoreResult<()> {
        lock(&self.calls)?.push(call);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> StoreResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn scheme(&self) -> &'static str {
        "mem"
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> StoreResult<ObjectMeta> {
        self.record(StoreCall::Put {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })?;
        validate_address(bucket, key)?;
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "injected put failure for {bucket}/{key}"
            )));
        }

        let size = bytes.len() as u64;
        lock(&self.objects)?.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                content_type: content_type.to_string(),
                bytes,
            },
        );
        Ok(ObjectMeta {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size,
            content_type: Some(content_type.to_string()),
        })
    }

    async fn get(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>> {
        self.record(StoreCall::Get {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })?;
        validate_address(bucket, key)?;
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "injected get failure for {bucket}/{key}"
            )));
        }

        lock(&self.objects)?
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.bytes.clone())
            .ok_or_else(|| StoreError::not_found(bucket, key))
    }

    async fn list(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<ObjectMeta>> {
        self.record(StoreCall::List {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
        })?;
        validate_prefix(bucket, prefix)?;

        Ok(lock(&self.objects)?
            .iter()
            .filter(|((b, k), _)| b == bucket && k.starts_with(prefix))
            .map(|((b, k), o)| ObjectMeta {
                bucket: b.clone(),
                key: k.clone(),
                size: o.bytes.len() as u64,
                content_type: Some(o.content_type.clone()),
            })
            .collect())
    }
}
