//! Defines routes for all file attachment operations.
//!
//! ## Structure
//! - **Scope-level endpoints** (`{owner_id}/{folder}` pairs group records)
//!   - `POST   /files/{owner_id}/{folder}` — upload one or more files
//!   - `GET    /files/{owner_id}/{folder}` — list records (supports ?trash=)
//!   - `PUT    /files/{owner_id}/{folder}` — versioned update (?preserve=)
//!   - `DELETE /files/{owner_id}/{folder}` — delete all records (?preserve=)
//!   - `GET    /files/{owner_id}/{folder}/latest` — latest record by version
//!   - `POST   /files/{owner_id}/{folder}/restore` — restore trashed records
//!
//! - **Record-level endpoints**
//!   - `PATCH  /file/{id}` — replace the stored bytes
//!   - `DELETE /file/{id}` — delete one record (?preserve=)
//!
//! - **Blob serving**
//!   - `GET    /storage/{folder}/{file}` — stream stored bytes

use crate::{
    handlers::{
        file_handlers::{
            delete_all_files, delete_file, download_file, get_all_files, get_latest_file,
            modify_file, restore_files, update_file, upload_files,
        },
        health_handlers::{healthz, readyz},
    },
    services::file_store::FileStore,
};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Build and return the router for all file store routes.
///
/// The router carries shared state (`FileStore`) to all handlers.
pub fn routes() -> Router<FileStore> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Record-level routes
        .route("/file/{id}", patch(modify_file).delete(delete_file))
        // Scope-level routes
        .route(
            "/files/{owner_id}/{folder}",
            post(upload_files)
                .get(get_all_files)
                .put(update_file)
                .delete(delete_all_files),
        )
        .route("/files/{owner_id}/{folder}/latest", get(get_latest_file))
        .route("/files/{owner_id}/{folder}/restore", post(restore_files))
        // Blob serving
        .route("/storage/{folder}/{file}", get(download_file))
}
