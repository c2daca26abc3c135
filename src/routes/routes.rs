//! Defines routes for the File API and its content subresource.
//!
//! ## Structure
//! Under `/apis/cdn.k8s.toms.place/v1alpha1/namespaces/{namespace}`:
//!
//! - **Collection**
//!   - `GET    /files` — list files (JSON or `as=Table`)
//!   - `POST   /files` — create file
//!
//! - **Item**
//!   - `GET    /files/{name}` — get file
//!   - `PUT    /files/{name}` — update file
//!   - `DELETE /files/{name}` — delete file
//!
//! - **Content subresource**
//!   - `GET | HEAD | PUT /files/{name}/content` — download / upload bytes;
//!     other verbs answer 405
//!
//! Plus `/healthz` and `/readyz` at the root.

use crate::{
    handlers::{
        content_handlers::file_content,
        file_handlers::{create_file, delete_file, get_file, list_files, update_file},
        health_handlers::{healthz, readyz},
    },
    models::{GROUP_NAME, VERSION},
    services::AppState,
};
use axum::{
    Router,
    routing::{any, get},
};

/// Build and return the router for the File API.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    let files = format!(
        "/apis/{}/{}/namespaces/{{namespace}}/files",
        GROUP_NAME, VERSION
    );

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(&files, get(list_files).post(create_file))
        .route(
            &format!("{}/{{name}}", files),
            get(get_file).put(update_file).delete(delete_file),
        )
        .route(&format!("{}/{{name}}/content", files), any(file_content))
}
