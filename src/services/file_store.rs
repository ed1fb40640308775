//! FileStore — the facade composing the blob store and the metadata catalog.
//!
//! Every observable policy lives here: upload ordering (blob first, catalog
//! second), the preserve/replace semantics of versioned updates, soft vs
//! hard deletion, bulk restore, and latest-version selection. The two
//! backing stores are never atomic with each other; a blob write that lands
//! before a failed catalog write leaves an orphaned blob, which is accepted.

use crate::models::file_record::{FileRecord, TrashMode};
use crate::services::{
    blob_store::BlobStore,
    catalog::{Catalog, NewFileRecord},
};
use bytes::Bytes;
use sqlx::SqlitePool;
use std::{cmp::Ordering, io, path::{Path, PathBuf}, sync::Arc};
use thiserror::Error;
use tokio::fs::File;
use tracing::warn;

pub const DEFAULT_VERSION: &str = "V0";
pub const DEFAULT_CONTENT_TYPE: &str = "undefined";

#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("missing required argument: {0}")]
    InvalidArgument(&'static str),
    #[error("invalid storage path `{0}`")]
    InvalidPath(String),
    #[error("no file payload was provided")]
    NullFile,
    #[error("file record {0} not found")]
    NotFound(i64),
    #[error("blob `{0}` not found")]
    BlobNotFound(String),
    #[error("failed to restore file record {0}")]
    RestoreFailed(i64),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type FileStoreResult<T> = Result<T, FileStoreError>;

/// Bytes and client-supplied metadata of one uploaded file.
#[derive(Clone, Debug)]
pub struct FilePayload {
    /// Original filename as sent by the client.
    pub name: String,
    /// MIME type as sent by the client, if any.
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Orchestrates the blob store and the metadata catalog.
///
/// Constructed once at startup and cloned into handlers; there is no global
/// instance. Each operation is a sequential run of blob and catalog calls on
/// the caller's own task — concurrent callers racing on the same
/// `(owner_id, folder)` scope resolve last-writer-wins.
#[derive(Clone)]
pub struct FileStore {
    blob: BlobStore,
    catalog: Catalog,
}

impl FileStore {
    pub fn new(
        db: Arc<SqlitePool>,
        base_path: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            blob: BlobStore::new(base_path, public_base_url),
            catalog: Catalog::new(db),
        }
    }

    /// Shared pool, used by the readiness probe.
    pub fn db(&self) -> &SqlitePool {
        self.catalog.pool()
    }

    /// Root directory of the blob store, used by the readiness probe.
    pub fn storage_root(&self) -> &Path {
        self.blob.base_path()
    }

    /// Store a new file: write its bytes under a generated key, then create
    /// the catalog record pointing at them, versioned `"V0"`.
    pub async fn upload(
        &self,
        folder: &str,
        owner_id: i64,
        payload: Option<FilePayload>,
    ) -> FileStoreResult<FileRecord> {
        self.upload_version(folder, owner_id, payload, DEFAULT_VERSION)
            .await
    }

    async fn upload_version(
        &self,
        folder: &str,
        owner_id: i64,
        payload: Option<FilePayload>,
        version: &str,
    ) -> FileStoreResult<FileRecord> {
        if folder.is_empty() {
            return Err(FileStoreError::InvalidArgument("folder"));
        }
        let payload = payload.ok_or(FileStoreError::NullFile)?;

        // Blob first. A failure here aborts before any catalog row exists;
        // a crash after it leaves an orphaned blob, which is accepted.
        let key = BlobStore::generate_key(&payload.name);
        self.blob.put(folder, &key, &payload.bytes).await?;

        self.catalog
            .create(NewFileRecord {
                owner_id,
                folder: folder.to_string(),
                name: payload.name,
                path: self.blob.public_path(folder, &key),
                content_type: payload
                    .content_type
                    .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
                version: version.to_string(),
            })
            .await
    }

    /// Replace the bytes behind an existing record in place.
    ///
    /// The old blob is deleted before the new one is written under a fresh
    /// key in the record's existing folder; the record then has its path,
    /// name and content type updated. The version tag is untouched.
    pub async fn modify(&self, id: i64, payload: Option<FilePayload>) -> FileStoreResult<FileRecord> {
        let record = self.catalog.find_by_id(id).await?;
        let payload = payload.ok_or(FileStoreError::NullFile)?;

        self.blob.delete(&record.path).await?;

        let key = BlobStore::generate_key(&payload.name);
        self.blob.put(&record.folder, &key, &payload.bytes).await?;

        let path = self.blob.public_path(&record.folder, &key);
        let content_type = payload
            .content_type
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        self.catalog
            .update_payload(id, &path, &payload.name, &content_type)
            .await
    }

    /// Versioned-replace policy over a whole `(owner_id, folder)` scope.
    ///
    /// - Empty scope: plain upload at `"V0"`.
    /// - `preserve`: append-only — the new file becomes a fresh record with
    ///   `"V" + count(existing live records)`, prior records untouched.
    /// - Otherwise: every live record is purged (rows in one transaction,
    ///   blobs best-effort after it) and the new file lands as `"V0"`.
    pub async fn update(
        &self,
        folder: &str,
        owner_id: i64,
        payload: Option<FilePayload>,
        preserve: bool,
    ) -> FileStoreResult<FileRecord> {
        if folder.is_empty() {
            return Err(FileStoreError::InvalidArgument("folder"));
        }
        let existing = self
            .catalog
            .query_scope(owner_id, folder, TrashMode::None)
            .await?;
        if existing.is_empty() {
            return self
                .upload_version(folder, owner_id, payload, DEFAULT_VERSION)
                .await;
        }

        if preserve {
            let version = format!("V{}", existing.len());
            return self
                .upload_version(folder, owner_id, payload, &version)
                .await;
        }

        let purged = self.catalog.purge_scope(owner_id, folder).await?;
        for record in &purged {
            if let Err(err) = self.blob.delete(&record.path).await {
                warn!(
                    "failed to delete blob {} while replacing scope: {}",
                    record.path, err
                );
            }
        }
        self.upload_version(folder, owner_id, payload, DEFAULT_VERSION)
            .await
    }

    /// Delete one record. With `preserve` the row is soft-deleted and the
    /// blob kept, so a later restore brings the file back without a
    /// re-upload; without it the blob and the row are both gone for good.
    pub async fn delete(&self, id: i64, preserve: bool) -> FileStoreResult<()> {
        let record = self.catalog.find_by_id(id).await?;
        if preserve {
            self.catalog.soft_delete(id).await
        } else {
            self.blob.delete(&record.path).await?;
            self.catalog.hard_delete(id).await
        }
    }

    /// Delete every live record in a scope. Each record is attempted
    /// independently; one failure does not stop the rest.
    pub async fn delete_all(
        &self,
        folder: &str,
        owner_id: i64,
        preserve: bool,
    ) -> FileStoreResult<()> {
        if folder.is_empty() {
            return Err(FileStoreError::InvalidArgument("folder"));
        }
        let records = self
            .catalog
            .query_scope(owner_id, folder, TrashMode::None)
            .await?;
        for record in records {
            if let Err(err) = self.delete(record.id, preserve).await {
                warn!("failed to delete file record {}: {}", record.id, err);
            }
        }
        Ok(())
    }

    /// Restore every soft-deleted record in a scope. Hard-deleted records
    /// are absent from the trash set and stay gone. Per-record failures are
    /// isolated.
    pub async fn restore(&self, folder: &str, owner_id: i64) -> FileStoreResult<()> {
        if folder.is_empty() {
            return Err(FileStoreError::InvalidArgument("folder"));
        }
        let records = self
            .catalog
            .query_scope(owner_id, folder, TrashMode::Only)
            .await?;
        for record in records {
            if let Err(err) = self.catalog.restore(record.id).await {
                warn!("failed to restore file record {}: {}", record.id, err);
            }
        }
        Ok(())
    }

    /// All records in a scope, newest id first.
    pub async fn get_all(
        &self,
        folder: &str,
        owner_id: i64,
        trash: TrashMode,
    ) -> FileStoreResult<Vec<FileRecord>> {
        if folder.is_empty() {
            return Err(FileStoreError::InvalidArgument("folder"));
        }
        self.catalog.query_scope(owner_id, folder, trash).await
    }

    /// The record whose version tag compares greatest under natural
    /// ordering, or none for an empty scope. Equal versions are broken by
    /// the higher id.
    pub async fn get_latest(
        &self,
        folder: &str,
        owner_id: i64,
        trash: TrashMode,
    ) -> FileStoreResult<Option<FileRecord>> {
        let records = self.get_all(folder, owner_id, trash).await?;
        Ok(records
            .into_iter()
            .max_by(|a, b| natural_cmp(&a.version, &b.version).then(a.id.cmp(&b.id))))
    }

    /// Open a stored blob for streaming out, with the content type its
    /// catalog record carries (octet-stream when no record references it).
    pub async fn open_blob(&self, folder: &str, filename: &str) -> FileStoreResult<(String, File)> {
        let file = self.blob.open(folder, filename).await?;
        let content_type = self
            .catalog
            .find_by_path(&self.blob.public_path(folder, filename))
            .await?
            .map(|record| record.content_type)
            .unwrap_or_else(|| "application/octet-stream".to_string());
        Ok((content_type, file))
    }
}

/// Compare strings treating embedded digit runs as numbers, so `"V10"`
/// sorts after `"V9"` instead of before it lexicographically.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let mut x = i;
            while x < a.len() && a[x].is_ascii_digit() {
                x += 1;
            }
            let mut y = j;
            while y < b.len() && b[y].is_ascii_digit() {
                y += 1;
            }
            let run_a = trim_leading_zeros(&a[i..x]);
            let run_b = trim_leading_zeros(&b[j..y]);
            let ord = run_a.len().cmp(&run_b.len()).then_with(|| run_a.cmp(run_b));
            if ord != Ordering::Equal {
                return ord;
            }
            i = x;
            j = y;
        } else {
            let ord = a[i].cmp(&b[j]);
            if ord != Ordering::Equal {
                return ord;
            }
            i += 1;
            j += 1;
        }
    }
    (a.len() - i).cmp(&(b.len() - j))
}

fn trim_leading_zeros(run: &[u8]) -> &[u8] {
    let zeros = run.iter().take_while(|b| **b == b'0').count();
    if zeros == run.len() {
        &run[run.len() - 1..]
    } else {
        &run[zeros..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use tempfile::TempDir;

    const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

    async fn test_store() -> (TempDir, FileStore) {
        let dir = TempDir::new().expect("create temp dir");
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("open in-memory sqlite");
        for stmt in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(stmt).execute(&pool).await.expect("apply schema");
        }
        let store = FileStore::new(Arc::new(pool), dir.path(), "/storage");
        (dir, store)
    }

    fn payload(name: &str, body: &str) -> Option<FilePayload> {
        Some(FilePayload {
            name: name.into(),
            content_type: Some("text/plain".into()),
            bytes: Bytes::from(body.to_string()),
        })
    }

    #[tokio::test]
    async fn upload_lands_at_head_of_listing() {
        let (_dir, store) = test_store().await;
        store.upload("docs", 1, payload("a.txt", "a")).await.unwrap();
        let b = store.upload("docs", 1, payload("b.txt", "b")).await.unwrap();

        let all = store.get_all("docs", 1, TrashMode::None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, b.id);
        assert_eq!(all[0].name, "b.txt");
    }

    #[tokio::test]
    async fn upload_without_payload_is_rejected() {
        let (_dir, store) = test_store().await;
        let err = store.upload("docs", 1, None).await.unwrap_err();
        assert!(matches!(err, FileStoreError::NullFile));

        let all = store.get_all("docs", 1, TrashMode::With).await.unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn upload_defaults_version_and_content_type() {
        let (_dir, store) = test_store().await;
        let record = store
            .upload(
                "docs",
                1,
                Some(FilePayload {
                    name: "mystery.bin".into(),
                    content_type: None,
                    bytes: Bytes::from_static(b"\x00\x01"),
                }),
            )
            .await
            .unwrap();
        assert_eq!(record.version, "V0");
        assert_eq!(record.content_type, "undefined");
        assert!(record.path.starts_with("/storage/docs/"));
        assert!(record.path.ends_with("_mystery.bin"));
    }

    #[tokio::test]
    async fn upload_with_empty_folder_is_invalid() {
        let (_dir, store) = test_store().await;
        let err = store.upload("", 1, payload("a.txt", "a")).await.unwrap_err();
        assert!(matches!(err, FileStoreError::InvalidArgument("folder")));
    }

    #[tokio::test]
    async fn soft_delete_then_restore_keeps_path_and_blob() {
        let (_dir, store) = test_store().await;
        let record = store.upload("docs", 1, payload("keep.txt", "keep")).await.unwrap();

        store.delete(record.id, true).await.unwrap();
        assert!(store.get_all("docs", 1, TrashMode::None).await.unwrap().is_empty());
        assert_eq!(store.get_all("docs", 1, TrashMode::Only).await.unwrap().len(), 1);
        // the bytes survive the soft delete
        assert!(store.blob.exists(&record.path).await);

        store.restore("docs", 1).await.unwrap();
        let restored = &store.get_all("docs", 1, TrashMode::None).await.unwrap()[0];
        assert_eq!(restored.path, record.path);
        assert!(restored.deleted_at.is_none());
        assert!(store.blob.exists(&record.path).await);
    }

    #[tokio::test]
    async fn hard_delete_removes_blob_and_double_delete_is_noop() {
        let (_dir, store) = test_store().await;
        let record = store.upload("docs", 1, payload("gone.txt", "gone")).await.unwrap();

        store.delete(record.id, false).await.unwrap();
        assert!(store.get_all("docs", 1, TrashMode::With).await.unwrap().is_empty());
        assert!(!store.blob.exists(&record.path).await);

        use crate::services::blob_store::BlobDelete;
        assert_eq!(
            store.blob.delete(&record.path).await.unwrap(),
            BlobDelete::Missing
        );
    }

    #[tokio::test]
    async fn delete_of_unknown_id_is_not_found() {
        let (_dir, store) = test_store().await;
        let err = store.delete(404, false).await.unwrap_err();
        assert!(matches!(err, FileStoreError::NotFound(404)));
    }

    #[tokio::test]
    async fn preserve_updates_assign_sequential_versions() {
        let (_dir, store) = test_store().await;
        let first = store
            .update("docs", 1, payload("a.txt", "a"), true)
            .await
            .unwrap();
        assert_eq!(first.version, "V0");

        let second = store
            .update("docs", 1, payload("b.txt", "b"), true)
            .await
            .unwrap();
        assert_eq!(second.version, "V1");

        let latest = store
            .get_latest("docs", 1, TrashMode::None)
            .await
            .unwrap()
            .expect("scope is not empty");
        assert_eq!(latest.id, second.id);
        assert_eq!(latest.name, "b.txt");
    }

    #[tokio::test]
    async fn replace_update_leaves_single_v0_and_purges_blobs() {
        let (_dir, store) = test_store().await;
        let mut old_paths = Vec::new();
        for name in ["a.txt", "b.txt", "c.txt"] {
            let record = store.upload("docs", 1, payload(name, name)).await.unwrap();
            old_paths.push(record.path);
        }

        let fresh = store
            .update("docs", 1, payload("fresh.txt", "fresh"), false)
            .await
            .unwrap();
        assert_eq!(fresh.version, "V0");

        let all = store.get_all("docs", 1, TrashMode::With).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, fresh.id);

        for path in &old_paths {
            assert!(!store.blob.exists(path).await);
        }
        assert!(store.blob.exists(&fresh.path).await);
    }

    #[tokio::test]
    async fn modify_swaps_blob_and_keeps_version() {
        let (_dir, store) = test_store().await;
        let record = store
            .update("docs", 1, payload("v1.txt", "one"), true)
            .await
            .unwrap();

        let modified = store
            .modify(
                record.id,
                Some(FilePayload {
                    name: "v1-fixed.txt".into(),
                    content_type: Some("text/markdown".into()),
                    bytes: Bytes::from_static(b"two"),
                }),
            )
            .await
            .unwrap();

        assert_eq!(modified.id, record.id);
        assert_eq!(modified.version, record.version);
        assert_eq!(modified.name, "v1-fixed.txt");
        assert_eq!(modified.content_type, "text/markdown");
        assert!(modified.path.ends_with("_v1-fixed.txt"));
        assert!(store.blob.exists(&modified.path).await);
    }

    #[tokio::test]
    async fn modify_without_payload_is_rejected() {
        let (_dir, store) = test_store().await;
        let record = store.upload("docs", 1, payload("a.txt", "a")).await.unwrap();
        let err = store.modify(record.id, None).await.unwrap_err();
        assert!(matches!(err, FileStoreError::NullFile));
    }

    #[tokio::test]
    async fn delete_all_clears_scope_but_not_others() {
        let (_dir, store) = test_store().await;
        store.upload("docs", 1, payload("a.txt", "a")).await.unwrap();
        store.upload("docs", 1, payload("b.txt", "b")).await.unwrap();
        let other = store.upload("photos", 1, payload("c.png", "c")).await.unwrap();

        store.delete_all("docs", 1, false).await.unwrap();
        assert!(store.get_all("docs", 1, TrashMode::With).await.unwrap().is_empty());
        assert_eq!(
            store.get_all("photos", 1, TrashMode::None).await.unwrap()[0].id,
            other.id
        );
    }

    #[tokio::test]
    async fn get_latest_uses_natural_version_order() {
        let (_dir, store) = test_store().await;
        for version in ["V2", "V10", "V1"] {
            store
                .upload_version("docs", 1, payload(&format!("{version}.txt"), version), version)
                .await
                .unwrap();
        }

        let latest = store
            .get_latest("docs", 1, TrashMode::None)
            .await
            .unwrap()
            .expect("scope is not empty");
        assert_eq!(latest.version, "V10");
    }

    #[tokio::test]
    async fn get_latest_of_empty_scope_is_none() {
        let (_dir, store) = test_store().await;
        assert!(store.get_latest("docs", 1, TrashMode::None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn equal_versions_break_ties_on_higher_id() {
        let (_dir, store) = test_store().await;
        store
            .upload_version("docs", 1, payload("first.txt", "1"), "V3")
            .await
            .unwrap();
        let newer = store
            .upload_version("docs", 1, payload("second.txt", "2"), "V3")
            .await
            .unwrap();

        let latest = store
            .get_latest("docs", 1, TrashMode::None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, newer.id);
    }

    #[tokio::test]
    async fn open_blob_reports_catalog_content_type() {
        let (_dir, store) = test_store().await;
        let record = store.upload("docs", 1, payload("a.txt", "hello")).await.unwrap();
        let filename = record.path.rsplit('/').next().unwrap();

        let (content_type, _file) = store.open_blob("docs", filename).await.unwrap();
        assert_eq!(content_type, "text/plain");

        let err = store.open_blob("docs", "missing.txt").await.unwrap_err();
        assert!(matches!(err, FileStoreError::BlobNotFound(_)));
    }

    #[test]
    fn natural_cmp_treats_digit_runs_as_numbers() {
        assert_eq!(natural_cmp("V9", "V10"), Ordering::Less);
        assert_eq!(natural_cmp("V2", "V10"), Ordering::Less);
        assert_eq!(natural_cmp("V10", "V10"), Ordering::Equal);
        assert_eq!(natural_cmp("V11", "V2"), Ordering::Greater);
        assert_eq!(natural_cmp("V02", "V2"), Ordering::Equal);
        assert_eq!(natural_cmp("V1", "V1a"), Ordering::Less);
        assert_eq!(natural_cmp("A1", "V1"), Ordering::Less);
    }
}
