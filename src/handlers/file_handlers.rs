//! HTTP handlers for file attachment operations.
//!
//! Reads multipart payloads into memory and delegates all storage policy to
//! `FileStore`. Downloads stream from disk without buffering.

use crate::{
    errors::AppError,
    models::{file_record::TrashMode, resource::FileResource},
    services::file_store::{FilePayload, FileStore},
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tokio_util::io::ReaderStream;

/// `?trash=none|with|only` — unknown values fall back to `none`.
#[derive(Debug, Deserialize)]
pub struct TrashQuery {
    pub trash: Option<String>,
}

impl TrashQuery {
    fn mode(&self) -> TrashMode {
        self.trash
            .as_deref()
            .map(TrashMode::parse)
            .unwrap_or_default()
    }
}

/// `?preserve=true|false`, defaulting to `false`.
#[derive(Debug, Deserialize)]
pub struct PreserveQuery {
    #[serde(default)]
    pub preserve: bool,
}

/// Drain every file-bearing field from a multipart body.
async fn collect_payloads(multipart: &mut Multipart) -> Result<Vec<FilePayload>, AppError> {
    let mut payloads = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(err.to_string()))?
    {
        let Some(name) = field.file_name().map(str::to_string) else {
            // non-file form fields are ignored
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::bad_request(err.to_string()))?;
        payloads.push(FilePayload {
            name,
            content_type,
            bytes,
        });
    }
    Ok(payloads)
}

/// POST `/files/{owner_id}/{folder}` — upload one or more files.
pub async fn upload_files(
    State(store): State<FileStore>,
    Path((owner_id, folder)): Path<(i64, String)>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let payloads = collect_payloads(&mut multipart).await?;
    if payloads.is_empty() {
        return Err(AppError::bad_request("No files were uploaded"));
    }

    let mut documents = Vec::with_capacity(payloads.len());
    for payload in payloads {
        let record = store.upload(&folder, owner_id, Some(payload)).await?;
        documents.push(FileResource::from(record));
    }

    Ok((StatusCode::CREATED, Json(documents)))
}

/// GET `/files/{owner_id}/{folder}` — all records in the scope, newest first.
pub async fn get_all_files(
    State(store): State<FileStore>,
    Path((owner_id, folder)): Path<(i64, String)>,
    Query(q): Query<TrashQuery>,
) -> Result<Json<Vec<FileResource>>, AppError> {
    let records = store.get_all(&folder, owner_id, q.mode()).await?;
    Ok(Json(records.into_iter().map(FileResource::from).collect()))
}

/// GET `/files/{owner_id}/{folder}/latest` — latest record by version, or
/// JSON `null` when the scope is empty.
pub async fn get_latest_file(
    State(store): State<FileStore>,
    Path((owner_id, folder)): Path<(i64, String)>,
    Query(q): Query<TrashQuery>,
) -> Result<Json<Option<FileResource>>, AppError> {
    let latest = store.get_latest(&folder, owner_id, q.mode()).await?;
    Ok(Json(latest.map(FileResource::from)))
}

/// PUT `/files/{owner_id}/{folder}` — versioned update of the whole scope.
pub async fn update_file(
    State(store): State<FileStore>,
    Path((owner_id, folder)): Path<(i64, String)>,
    Query(q): Query<PreserveQuery>,
    mut multipart: Multipart,
) -> Result<Json<FileResource>, AppError> {
    let payload = collect_payloads(&mut multipart).await?.into_iter().next();
    let record = store.update(&folder, owner_id, payload, q.preserve).await?;
    Ok(Json(FileResource::from(record)))
}

/// PATCH `/file/{id}` — replace the bytes behind an existing record.
pub async fn modify_file(
    State(store): State<FileStore>,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let payload = collect_payloads(&mut multipart).await?.into_iter().next();
    store.modify(id, payload).await?;
    Ok(Json(json!({"message": "File modified successfully"})))
}

/// DELETE `/file/{id}` — soft-delete with `?preserve=true`, otherwise
/// remove the blob and the record for good.
pub async fn delete_file(
    State(store): State<FileStore>,
    Path(id): Path<i64>,
    Query(q): Query<PreserveQuery>,
) -> Result<impl IntoResponse, AppError> {
    store.delete(id, q.preserve).await?;
    Ok(Json(json!({"message": "File deleted successfully"})))
}

/// DELETE `/files/{owner_id}/{folder}` — delete every live record in scope.
pub async fn delete_all_files(
    State(store): State<FileStore>,
    Path((owner_id, folder)): Path<(i64, String)>,
    Query(q): Query<PreserveQuery>,
) -> Result<impl IntoResponse, AppError> {
    store.delete_all(&folder, owner_id, q.preserve).await?;
    Ok(Json(json!({"message": "Files deleted successfully"})))
}

/// POST `/files/{owner_id}/{folder}/restore` — bring every soft-deleted
/// record in the scope back.
pub async fn restore_files(
    State(store): State<FileStore>,
    Path((owner_id, folder)): Path<(i64, String)>,
) -> Result<impl IntoResponse, AppError> {
    store.restore(&folder, owner_id).await?;
    Ok(Json(json!({"message": "Files restored successfully"})))
}

/// GET `/storage/{folder}/{file}` — stream stored bytes back to the client.
pub async fn download_file(
    State(store): State<FileStore>,
    Path((folder, file)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let (content_type, blob) = store.open_blob(&folder, &file).await?;
    let stream = ReaderStream::new(blob);

    let mut response = Response::new(Body::from_stream(stream));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    Ok(response)
}
