//! HTTP handlers for File resource CRUD.
//! Storage concerns are delegated to the `FileRegistry`.

use crate::{
    config::ContentRetention,
    errors::AppError,
    models::{
        file::File,
        table::{Table, TableSource},
    },
    services::{AppState, content_store::ContentKey},
};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::info;

/// GET `/namespaces/{namespace}/files` — list files, optionally as a Table.
pub async fn list_files(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let list = state.registry.list(&namespace).await?;
    if wants_table(&headers) {
        return Ok(Json(Table::render(TableSource::List(&list), Utc::now())).into_response());
    }
    Ok(Json(list).into_response())
}

/// GET `/namespaces/{namespace}/files/{name}`
pub async fn get_file(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let file = state.registry.get(&namespace, &name).await?;
    if wants_table(&headers) {
        return Ok(Json(Table::render(TableSource::Single(&file), Utc::now())).into_response());
    }
    Ok(Json(file).into_response())
}

/// POST `/namespaces/{namespace}/files` — create a file.
pub async fn create_file(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Json(mut file): Json<File>,
) -> Result<impl IntoResponse, AppError> {
    adopt_namespace(&mut file, &namespace)?;
    let created = state.registry.create(file).await?;
    info!("created file {}/{}", created.namespace(), created.name());
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT `/namespaces/{namespace}/files/{name}` — replace spec and status.
pub async fn update_file(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Json(mut file): Json<File>,
) -> Result<impl IntoResponse, AppError> {
    adopt_namespace(&mut file, &namespace)?;
    if file.metadata.name.is_empty() {
        file.metadata.name = name;
    } else if file.metadata.name != name {
        return Err(AppError::bad_request(
            "the name of the object does not match the name on the URL",
        ));
    }
    let updated = state.registry.update(file).await?;
    Ok(Json(updated))
}

/// DELETE `/namespaces/{namespace}/files/{name}` — delete a file.
///
/// Uploaded content is dropped too when retention is `evict-on-delete`.
pub async fn delete_file(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = state.registry.delete(&namespace, &name).await?;
    if state.retention == ContentRetention::EvictOnDelete
        && state.content.remove(&ContentKey::new(&namespace, &name)).is_some()
    {
        info!("evicted content of deleted file {}/{}", namespace, name);
    }
    Ok(Json(deleted))
}

/// Fill in the request namespace, rejecting a body that names another one.
fn adopt_namespace(file: &mut File, namespace: &str) -> Result<(), AppError> {
    if file.metadata.namespace.is_empty() {
        file.metadata.namespace = namespace.to_string();
        Ok(())
    } else if file.metadata.namespace == namespace {
        Ok(())
    } else {
        Err(AppError::bad_request(
            "the namespace of the provided object does not match the namespace sent on the request",
        ))
    }
}

/// True when the client asked for tabular output (`Accept: ...;as=Table;...`).
fn wants_table(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .any(|param| param.trim().eq_ignore_ascii_case("as=Table"))
}
