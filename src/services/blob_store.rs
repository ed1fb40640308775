//! Disk-backed blob storage addressed by `folder/filename` keys.
//!
//! Payloads live under `base_path/{folder}/{filename}` on a single logical
//! namespace; the store also maps each blob to the public path recorded in
//! the catalog (`<public-base-url>/<folder>/<filename>`).

use crate::services::file_store::{FileStoreError, FileStoreResult};
use chrono::Utc;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

/// Joins the upload timestamp and the original client filename in generated
/// blob keys.
const KEY_SEPARATOR: &str = "_";

const MAX_SEGMENT_LEN: usize = 255;

/// Outcome of a blob deletion. Deleting a path that is already gone is a
/// reported no-op, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobDelete {
    Deleted,
    Missing,
}

/// Path-addressed byte store over a local directory tree.
#[derive(Clone, Debug)]
pub struct BlobStore {
    base_path: PathBuf,
    public_base_url: String,
}

impl BlobStore {
    pub fn new(base_path: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        let public_base_url = public_base_url.into().trim_end_matches('/').to_string();
        Self {
            base_path: base_path.into(),
            public_base_url,
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Build the blob key for a new upload: unix timestamp, separator, then
    /// the original client filename. Practically unique across sequential
    /// uploads; a same-second collision on the same original name is an
    /// accepted gap.
    pub fn generate_key(original_name: &str) -> String {
        format!(
            "{}{}{}",
            Utc::now().timestamp(),
            KEY_SEPARATOR,
            original_name
        )
    }

    /// Public path recorded in the catalog and handed back to clients.
    pub fn public_path(&self, folder: &str, filename: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, folder, filename)
    }

    /// Basic segment validation to avoid trivial path traversal vectors.
    ///
    /// Rejects empty or oversized segments, embedded separators, `..`, and
    /// control bytes.
    fn ensure_segment_safe(segment: &str) -> FileStoreResult<()> {
        if segment.is_empty() || segment.len() > MAX_SEGMENT_LEN {
            return Err(FileStoreError::InvalidPath(segment.to_string()));
        }
        if segment.contains('/') || segment.contains("..") {
            return Err(FileStoreError::InvalidPath(segment.to_string()));
        }
        if segment
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(FileStoreError::InvalidPath(segment.to_string()));
        }
        Ok(())
    }

    fn disk_path(&self, folder: &str, filename: &str) -> FileStoreResult<PathBuf> {
        Self::ensure_segment_safe(folder)?;
        Self::ensure_segment_safe(filename)?;
        Ok(self.base_path.join(folder).join(filename))
    }

    /// Map a public path back to the on-disk location of its blob.
    fn resolve_public(&self, path: &str) -> FileStoreResult<PathBuf> {
        let relative = path
            .strip_prefix(&self.public_base_url)
            .map(|rest| rest.trim_start_matches('/'))
            .ok_or_else(|| FileStoreError::InvalidPath(path.to_string()))?;
        let (folder, filename) = relative
            .split_once('/')
            .ok_or_else(|| FileStoreError::InvalidPath(path.to_string()))?;
        self.disk_path(folder, filename)
    }

    /// Write `bytes` under `folder/filename`, creating the folder directory
    /// if absent and overwriting any existing blob.
    ///
    /// Writes go through a temp file, are fsynced, and are renamed into
    /// place; temp files are cleaned up on error.
    pub async fn put(&self, folder: &str, filename: &str, bytes: &[u8]) -> FileStoreResult<()> {
        let target = self.disk_path(folder, filename)?;
        let parent = self.base_path.join(folder);
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;
        if let Err(err) = file.write_all(bytes).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(FileStoreError::Io(err));
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(FileStoreError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(FileStoreError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &target).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&target).await?;
                fs::rename(&tmp_path, &target).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(FileStoreError::Io(err));
            }
        }

        debug!("wrote blob {}/{}", folder, filename);
        Ok(())
    }

    /// Whether a blob exists at the given public path. Malformed paths
    /// report `false` rather than erroring.
    pub async fn exists(&self, path: &str) -> bool {
        match self.resolve_public(path) {
            Ok(target) => fs::try_exists(&target).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Remove the blob at the given public path if present.
    pub async fn delete(&self, path: &str) -> FileStoreResult<BlobDelete> {
        let target = self.resolve_public(path)?;
        match fs::remove_file(&target).await {
            Ok(_) => {
                debug!("removed blob {}", target.display());
                Ok(BlobDelete::Deleted)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("blob {} already missing", target.display());
                Ok(BlobDelete::Missing)
            }
            Err(err) => Err(FileStoreError::Io(err)),
        }
    }

    /// Open a blob for reading, ready for streaming out.
    pub async fn open(&self, folder: &str, filename: &str) -> FileStoreResult<File> {
        let target = self.disk_path(folder, filename)?;
        File::open(&target).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                FileStoreError::BlobNotFound(format!("{}/{}", folder, filename))
            } else {
                FileStoreError::Io(err)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, BlobStore) {
        let dir = TempDir::new().expect("create temp dir");
        let store = BlobStore::new(dir.path(), "/storage");
        (dir, store)
    }

    #[tokio::test]
    async fn put_then_exists_then_delete() {
        let (_dir, store) = test_store();
        store
            .put("documents", "1722_report.pdf", b"pdf bytes")
            .await
            .expect("put should succeed");

        let path = store.public_path("documents", "1722_report.pdf");
        assert!(store.exists(&path).await);

        assert_eq!(store.delete(&path).await.unwrap(), BlobDelete::Deleted);
        assert!(!store.exists(&path).await);
    }

    #[tokio::test]
    async fn delete_of_missing_blob_is_a_noop() {
        let (_dir, store) = test_store();
        let path = store.public_path("documents", "never-written.txt");
        assert_eq!(store.delete(&path).await.unwrap(), BlobDelete::Missing);
    }

    #[tokio::test]
    async fn put_overwrites_existing_blob() {
        let (dir, store) = test_store();
        store.put("f", "same.txt", b"first").await.unwrap();
        store.put("f", "same.txt", b"second").await.unwrap();

        let bytes = tokio::fs::read(dir.path().join("f").join("same.txt"))
            .await
            .unwrap();
        assert_eq!(bytes, b"second");
    }

    #[tokio::test]
    async fn rejects_traversal_segments() {
        let (_dir, store) = test_store();
        let err = store.put("../escape", "x.txt", b"x").await.unwrap_err();
        assert!(matches!(err, FileStoreError::InvalidPath(_)));

        let err = store.open("folder", "..").await.unwrap_err();
        assert!(matches!(err, FileStoreError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn foreign_public_path_is_invalid() {
        let (_dir, store) = test_store();
        let err = store.delete("/elsewhere/f/a.txt").await.unwrap_err();
        assert!(matches!(err, FileStoreError::InvalidPath(_)));
    }

    #[test]
    fn generated_keys_carry_timestamp_and_name() {
        let key = BlobStore::generate_key("photo.png");
        let (stamp, name) = key.split_once('_').expect("separator present");
        assert!(stamp.parse::<i64>().is_ok());
        assert_eq!(name, "photo.png");
    }
}
