//! Metadata catalog — CRUD and soft-delete-aware querying over file records
//! in SQLite.

use crate::models::file_record::{FileRecord, TrashMode};
use crate::services::file_store::{FileStoreError, FileStoreResult};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;

const RECORD_COLUMNS: &str =
    "id, owner_id, folder, name, path, content_type, version, created_at, updated_at, deleted_at";

/// Fields supplied when creating a new catalog row. Id and timestamps are
/// assigned by the catalog.
#[derive(Clone, Debug)]
pub struct NewFileRecord {
    pub owner_id: i64,
    pub folder: String,
    pub name: String,
    pub path: String,
    pub content_type: String,
    pub version: String,
}

/// Durable record store for file metadata.
#[derive(Clone)]
pub struct Catalog {
    db: Arc<SqlitePool>,
}

impl Catalog {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Persist a new record, assigning its id and timestamps.
    pub async fn create(&self, new: NewFileRecord) -> FileStoreResult<FileRecord> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO files (owner_id, folder, name, path, content_type, version, created_at, updated_at, deleted_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL)
             RETURNING {RECORD_COLUMNS}"
        );
        sqlx::query_as::<_, FileRecord>(&sql)
            .bind(new.owner_id)
            .bind(&new.folder)
            .bind(&new.name)
            .bind(&new.path)
            .bind(&new.content_type)
            .bind(&new.version)
            .bind(now)
            .bind(now)
            .fetch_one(&*self.db)
            .await
            .map_err(FileStoreError::Sqlx)
    }

    /// Fetch a live record by id. Soft-deleted rows are not visible here;
    /// callers needing them go through [`Catalog::query_scope`].
    pub async fn find_by_id(&self, id: i64) -> FileStoreResult<FileRecord> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM files WHERE id = ? AND deleted_at IS NULL");
        sqlx::query_as::<_, FileRecord>(&sql)
            .bind(id)
            .fetch_one(&*self.db)
            .await
            .map_err(|err| match err {
                sqlx::Error::RowNotFound => FileStoreError::NotFound(id),
                other => FileStoreError::Sqlx(other),
            })
    }

    /// Fetch the record referencing a public blob path, if any.
    pub async fn find_by_path(&self, path: &str) -> FileStoreResult<Option<FileRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM files WHERE path = ? ORDER BY id DESC");
        sqlx::query_as::<_, FileRecord>(&sql)
            .bind(path)
            .fetch_optional(&*self.db)
            .await
            .map_err(FileStoreError::Sqlx)
    }

    /// All records in an `(owner_id, folder)` scope, newest id first,
    /// filtered by trash mode.
    pub async fn query_scope(
        &self,
        owner_id: i64,
        folder: &str,
        trash: TrashMode,
    ) -> FileStoreResult<Vec<FileRecord>> {
        let filter = match trash {
            TrashMode::None => " AND deleted_at IS NULL",
            TrashMode::With => "",
            TrashMode::Only => " AND deleted_at IS NOT NULL",
        };
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM files WHERE owner_id = ? AND folder = ?{filter} ORDER BY id DESC"
        );
        sqlx::query_as::<_, FileRecord>(&sql)
            .bind(owner_id)
            .bind(folder)
            .fetch_all(&*self.db)
            .await
            .map_err(FileStoreError::Sqlx)
    }

    /// Mark a live record as deleted. The row stays queryable under the
    /// `with`/`only` trash modes.
    pub async fn soft_delete(&self, id: i64) -> FileStoreResult<()> {
        let now = Utc::now();
        let result =
            sqlx::query("UPDATE files SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
                .bind(now)
                .bind(now)
                .bind(id)
                .execute(&*self.db)
                .await?;
        if result.rows_affected() == 0 {
            return Err(FileStoreError::NotFound(id));
        }
        Ok(())
    }

    /// Purge a row permanently. Irreversible.
    pub async fn hard_delete(&self, id: i64) -> FileStoreResult<()> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(FileStoreError::NotFound(id));
        }
        Ok(())
    }

    /// Clear the soft-delete marker. Fails with `RestoreFailed` when the
    /// row does not exist or is not soft-deleted.
    pub async fn restore(&self, id: i64) -> FileStoreResult<()> {
        let result =
            sqlx::query("UPDATE files SET deleted_at = NULL, updated_at = ? WHERE id = ? AND deleted_at IS NOT NULL")
                .bind(Utc::now())
                .bind(id)
                .execute(&*self.db)
                .await?;
        if result.rows_affected() == 0 {
            return Err(FileStoreError::RestoreFailed(id));
        }
        Ok(())
    }

    /// Point a live record at a replacement blob, updating the display name
    /// and content type alongside. The version tag is untouched.
    pub async fn update_payload(
        &self,
        id: i64,
        path: &str,
        name: &str,
        content_type: &str,
    ) -> FileStoreResult<FileRecord> {
        let sql = format!(
            "UPDATE files SET path = ?, name = ?, content_type = ?, updated_at = ?
             WHERE id = ? AND deleted_at IS NULL
             RETURNING {RECORD_COLUMNS}"
        );
        sqlx::query_as::<_, FileRecord>(&sql)
            .bind(path)
            .bind(name)
            .bind(content_type)
            .bind(Utc::now())
            .bind(id)
            .fetch_one(&*self.db)
            .await
            .map_err(|err| match err {
                sqlx::Error::RowNotFound => FileStoreError::NotFound(id),
                other => FileStoreError::Sqlx(other),
            })
    }

    /// Delete every live row in a scope inside one transaction, returning
    /// the purged rows so the caller can remove their blobs. Blob removal
    /// happens outside the transaction and cannot be rolled back by it.
    pub async fn purge_scope(&self, owner_id: i64, folder: &str) -> FileStoreResult<Vec<FileRecord>> {
        let mut tx = self.db.begin().await?;

        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM files
             WHERE owner_id = ? AND folder = ? AND deleted_at IS NULL ORDER BY id DESC"
        );
        let records = sqlx::query_as::<_, FileRecord>(&sql)
            .bind(owner_id)
            .bind(folder)
            .fetch_all(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM files WHERE owner_id = ? AND folder = ? AND deleted_at IS NULL")
            .bind(owner_id)
            .bind(folder)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(records)
    }
}
