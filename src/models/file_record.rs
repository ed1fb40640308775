//! Represents a catalog row describing one stored file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A metadata record for a file held in the blob store.
///
/// The record stores where the bytes live and who they belong to, not the
/// bytes themselves. Many records may share the same `(owner_id, folder)`
/// scope; that pairing is the unit of versioning and bulk operations.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct FileRecord {
    /// Monotonically assigned row id.
    pub id: i64,

    /// ID of the principal that owns this file. Immutable after creation.
    pub owner_id: i64,

    /// Logical grouping namespace within the blob store. Immutable after
    /// creation.
    pub folder: String,

    /// Original display name supplied by the uploader.
    pub name: String,

    /// Fully-qualified public path where the bytes live. Replaced on modify.
    pub path: String,

    /// MIME type string; `"undefined"` when the client sent none.
    pub content_type: String,

    /// Free-form version tag (`"V0"`, `"V1"`, ...). Used for display and
    /// latest-version selection, not for optimistic concurrency.
    pub version: String,

    /// When this record was created.
    pub created_at: DateTime<Utc>,

    /// When this record was last mutated.
    pub updated_at: DateTime<Utc>,

    /// Soft-delete marker. A set timestamp hides the record from default
    /// queries until it is restored or hard-deleted.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// Lifecycle state of this record. A purged record has no row at all,
    /// so only the two live states are representable here.
    pub fn status(&self) -> FileStatus {
        match self.deleted_at {
            Some(_) => FileStatus::SoftDeleted,
            None => FileStatus::Active,
        }
    }
}

/// Lifecycle state of a catalog row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Active,
    SoftDeleted,
}

/// Filter over soft-deleted records when querying a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrashMode {
    /// Only live records (default).
    #[default]
    None,
    /// Live and soft-deleted records together.
    With,
    /// Exclusively soft-deleted records.
    Only,
}

impl TrashMode {
    /// Parse a client-supplied trash filter. Unrecognized values fall back
    /// to `None` silently.
    pub fn parse(value: &str) -> Self {
        match value {
            "with" => TrashMode::With,
            "only" => TrashMode::Only,
            _ => TrashMode::None,
        }
    }
}
