//! Upload collaborator.
//!
//! Content and profile mutations hand media to a [`MediaStore`] and keep
//! only the returned public URL. Deletion failures are reported, never fatal.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{MediaError, ServiceError};

/// Caller mistakes surface as validation errors; storage faults stay internal.
pub(crate) fn upload_error(err: MediaError) -> ServiceError {
    match err {
        MediaError::Invalid(msg) => ServiceError::validation(msg),
        other => ServiceError::Media(other),
    }
}

/// A file received from the caller, already decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl MediaUpload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Stores the file and returns its public URL. `owner_hint` pins the
    /// stored name (profile media), otherwise a timestamped name is used.
    async fn upload(&self, file: MediaUpload, owner_hint: Option<String>)
        -> Result<String, MediaError>;

    async fn delete(&self, url: &str) -> Result<(), MediaError>;
}

/// Writes uploads under a local directory served at `public_prefix`.
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
    public_prefix: String,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_prefix: public_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn stored_name(filename: &str, owner_hint: Option<&str>) -> Result<String, MediaError> {
        let base = Path::new(filename)
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| MediaError::Invalid(format!("bad filename '{}'", filename)))?;

        Ok(match owner_hint {
            Some(owner) => {
                let ext = Path::new(base)
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| format!(".{e}"))
                    .unwrap_or_default();
                format!("{owner}{ext}")
            }
            None => format!("{}-{}", Utc::now().timestamp_millis(), base),
        })
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn upload(
        &self,
        file: MediaUpload,
        owner_hint: Option<String>,
    ) -> Result<String, MediaError> {
        if file.bytes.is_empty() {
            return Err(MediaError::Invalid("empty upload".to_string()));
        }

        let name = Self::stored_name(&file.filename, owner_hint.as_deref())?;
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(&name), &file.bytes).await?;

        debug!(file = %name, bytes = file.bytes.len(), "Stored upload");
        Ok(format!("{}/{}", self.public_prefix, name))
    }

    async fn delete(&self, url: &str) -> Result<(), MediaError> {
        let name = Path::new(url)
            .file_name()
            .ok_or_else(|| MediaError::Invalid(format!("bad media url '{}'", url)))?;
        let path = self.root.join(name);

        if !tokio::fs::try_exists(&path).await? {
            return Err(MediaError::Missing(url.to_string()));
        }

        tokio::fs::remove_file(&path).await?;
        debug!(url = %url, "Deleted upload");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_then_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path(), "/uploads/");

        let url = store
            .upload(MediaUpload::new("cat.png", vec![1, 2, 3]), None)
            .await
            .unwrap();
        assert!(url.starts_with("/uploads/"));
        assert!(url.ends_with("-cat.png"));

        store.delete(&url).await.unwrap();
        let err = store.delete(&url).await.unwrap_err();
        assert!(matches!(err, MediaError::Missing(_)));
    }

    #[tokio::test]
    async fn owner_hint_pins_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path(), "/uploads");

        let url = store
            .upload(
                MediaUpload::new("selfie.JPG", vec![9]),
                Some("alice".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(url, "/uploads/alice.JPG");
        assert!(dir.path().join("alice.JPG").exists());
    }

    #[tokio::test]
    async fn path_components_are_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path(), "/uploads");

        let url = store
            .upload(MediaUpload::new("../../etc/passwd", vec![1]), None)
            .await
            .unwrap();
        assert!(url.ends_with("-passwd"));
        assert!(!url.contains(".."));
    }

    #[test]
    fn invalid_upload_maps_to_validation() {
        let err = upload_error(MediaError::Invalid("empty upload".into()));
        assert!(matches!(err, ServiceError::ValidationFailed(_)));
        let err = upload_error(MediaError::Missing("/uploads/x".into()));
        assert!(err.is_internal());
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path(), "/uploads");
        let err = store
            .upload(MediaUpload::new("a.png", Vec::new()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Invalid(_)));
    }
}
