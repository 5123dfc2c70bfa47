use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::{validate_address, validate_prefix, ObjectMeta, ObjectStore, StoreError, StoreResult};

const TEMP_SUFFIX: &str = ".tmp";

/// Filesystem backend: `{root}/{bucket}/{key}`.
///
/// Writes go to a hidden temp file in the destination directory and are
/// promoted with a rename, so a reader never observes a partial object.
/// Content types are not persisted.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        let mut path = self.root.join(bucket);
        for segment in key.split('/') {
            path.push(segment);
        }
        path
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    fn scheme(&self) -> &'static str {
        "file"
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> StoreResult<ObjectMeta> {
        validate_address(bucket, key)?;
        let final_path = self.object_path(bucket, key);
        let dir = final_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());

        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            StoreError::io(format!("Failed to create directory {}", dir.display()), e)
        })?;

        let file_name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = dir.join(format!(
            ".{}.{}{}",
            file_name,
            uuid::Uuid::new_v4().simple(),
            TEMP_SUFFIX
        ));

        let size = bytes.len() as u64;
        let mut staged = StagedFile::new(temp_path.clone());
        tokio::fs::write(&temp_path, &bytes).await.map_err(|e| {
            StoreError::io(
                format!("Failed to write temp file {}", temp_path.display()),
                e,
            )
        })?;
        tokio::fs::rename(&temp_path, &final_path)
            .await
            .map_err(|e| {
                StoreError::io(
                    format!(
                        "Failed to rename {} -> {}",
                        temp_path.display(),
                        final_path.display()
                    ),
                    e,
                )
            })?;
        staged.committed();

        debug!(bucket, key, size, "stored object at {}", final_path.display());
        Ok(ObjectMeta {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size,
            content_type: Some(content_type.to_string()),
        })
    }

    async fn get(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>> {
        validate_address(bucket, key)?;
        let path = self.object_path(bucket, key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::not_found(bucket, key)),
            Err(e) => Err(StoreError::io(
                format!("Failed to read {}", path.display()),
                e,
            )),
        }
    }

    async fn list(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<ObjectMeta>> {
        validate_prefix(bucket, prefix)?;
        let bucket_root = self.root.join(bucket);
        let mut out = Vec::new();
        let mut pending = vec![(bucket_root, String::new())];

        while let Some((dir, key_prefix)) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(StoreError::io(
                        format!("Failed to list {}", dir.display()),
                        e,
                    ))
                }
            };

            while let Some(entry) = entries.next_entry().await.map_err(|e| {
                StoreError::io(format!("Failed to list {}", dir.display()), e)
            })? {
                let name = entry.file_name().to_string_lossy().into_owned();
                if is_temp_name(&name) {
                    continue;
                }
                let key = format!("{key_prefix}{name}");
                let file_type = entry.file_type().await.map_err(|e| {
                    StoreError::io(format!("Failed to stat {}", entry.path().display()), e)
                })?;

                if file_type.is_dir() {
                    let dir_key = format!("{key}/");
                    // Only descend into directories that can contain matches.
                    if dir_key.starts_with(prefix) || prefix.starts_with(&dir_key) {
                        pending.push((entry.path(), dir_key));
                    }
                } else if key.starts_with(prefix) {
                    let size = match entry.metadata().await {
                        Ok(meta) => meta.len(),
                        Err(e) => {
                            warn!("Failed to stat {}: {}", entry.path().display(), e);
                            0
                        }
                    };
                    out.push(ObjectMeta {
                        bucket: bucket.to_string(),
                        key,
                        size,
                        content_type: None,
                    });
                }
            }
        }

        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }
}

fn is_temp_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
}

/// Removes the temp file if the write is abandoned before the rename, e.g.
/// when the caller's future is dropped mid-write.
struct StagedFile {
    path: Option<PathBuf>,
}

impl StagedFile {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn committed(&mut self) {
        self.path = None;
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if path.exists() {
                let _ = std::fs::remove_file(&path);
                warn!("Cleaned up orphaned temp file: {}", path.display());
            }
        }
    }
}
