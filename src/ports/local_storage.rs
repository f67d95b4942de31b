//! Filesystem-backed [`StoragePort`].
//!
//! Objects live under `root/<owner>/<uuid>.<ext>` and are addressed by
//! `base_url/<owner>/<uuid>.<ext>`.

use std::path::PathBuf;

use async_trait::async_trait;

use super::{ObjectMeta, StoragePort};
use crate::error::StorageError;

pub struct LocalStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Map a URL issued by this store back to its file, rejecting anything else.
    fn object_path(&self, url: &str) -> Result<PathBuf, StorageError> {
        let key = url
            .strip_prefix(&self.base_url)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| StorageError::InvalidUrl(url.to_string()))?;

        let valid = !key.is_empty()
            && key
                .split('/')
                .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
        if !valid {
            return Err(StorageError::InvalidUrl(url.to_string()));
        }

        Ok(self.root.join(key))
    }
}

/// Pick a file extension from the original name, falling back to the MIME type.
fn extension_for(meta: &ObjectMeta) -> String {
    let from_name = meta
        .file_name
        .as_deref()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    if let Some(ext) = from_name {
        return ext;
    }

    match meta.content_type.as_deref() {
        Some("image/jpeg") => "jpg",
        Some("image/png") => "png",
        Some("image/heic") => "heic",
        Some("image/webp") => "webp",
        Some("image/gif") => "gif",
        _ => "bin",
    }
    .to_string()
}

#[async_trait]
impl StoragePort for LocalStorage {
    async fn put(&self, bytes: Vec<u8>, meta: &ObjectMeta) -> Result<String, StorageError> {
        let key = format!(
            "{}/{}.{}",
            meta.owner_id,
            uuid::Uuid::now_v7(),
            extension_for(meta)
        );
        let path = self.root.join(&key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;

        tracing::debug!(path = %path.display(), size = bytes.len(), "object stored");
        Ok(format!("{}/{key}", self.base_url))
    }

    async fn delete(&self, url: &str) -> Result<(), StorageError> {
        let path = self.object_path(url)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(url, "object already gone");
                Ok(())
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}
