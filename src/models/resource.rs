//! Wire representation of a file record.

use crate::models::file_record::FileRecord;
use serde::Serialize;

/// Dates are truncated to day granularity on output. Lossy but part of the
/// wire contract.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// The JSON shape returned for a file record:
/// `{id, name, owner, folder, path, type, version, created_at, updated_at}`.
#[derive(Serialize, Clone, Debug)]
pub struct FileResource {
    pub id: i64,
    pub name: String,
    pub owner: i64,
    pub folder: String,
    pub path: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub version: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<FileRecord> for FileResource {
    fn from(record: FileRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            owner: record.owner_id,
            folder: record.folder,
            path: record.path,
            content_type: record.content_type,
            version: record.version,
            created_at: record.created_at.format(DATE_FORMAT).to_string(),
            updated_at: record.updated_at.format(DATE_FORMAT).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn resource_shape_and_day_truncation() {
        let record = FileRecord {
            id: 7,
            owner_id: 3,
            folder: "documents".into(),
            name: "report.pdf".into(),
            path: "/storage/documents/1722000000_report.pdf".into(),
            content_type: "application/pdf".into(),
            version: "V0".into(),
            created_at: Utc.with_ymd_and_hms(2024, 7, 26, 13, 45, 59).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 7, 27, 0, 0, 1).unwrap(),
            deleted_at: None,
        };

        let value = serde_json::to_value(FileResource::from(record)).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["owner"], 3);
        assert_eq!(value["type"], "application/pdf");
        assert_eq!(value["created_at"], "2024-07-26");
        assert_eq!(value["updated_at"], "2024-07-27");
        assert!(value.get("content_type").is_none());
        assert!(value.get("deleted_at").is_none());
    }
}
