//! Handler for the File content subresource
//! (`/apis/{group}/{version}/namespaces/{namespace}/files/{name}/content`).
//!
//! Method dispatch happens in the connector, so the route accepts any verb.

use crate::{
    errors::AppError,
    services::{
        AppState,
        content_connector::{ContentReply, RequestScope},
    },
};
use axum::{
    Json,
    body::Body,
    extract::{Path, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};

const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// `GET | HEAD | PUT .../files/{name}/content`
pub async fn file_content(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    request: Request,
) -> Result<Response, AppError> {
    let (parts, body) = request.into_parts();
    let scope = request_scope(&state, namespace, &parts);

    let reply = state
        .connector
        .connect(scope, name)
        .serve(&parts.method, &parts.headers, body)
        .await?;

    Ok(reply.into_response())
}

/// Collect namespace, host and TLS state for URL construction.
fn request_scope(state: &AppState, namespace: String, parts: &Parts) -> RequestScope {
    let host = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| parts.uri.authority().map(|a| a.to_string()));

    let tls = parts.uri.scheme_str() == Some("https")
        || (state.trust_forwarded_proto
            && parts
                .headers
                .get(X_FORWARDED_PROTO)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https")));

    RequestScope {
        namespace,
        host,
        tls,
    }
}

impl IntoResponse for ContentReply {
    fn into_response(self) -> Response {
        match self {
            ContentReply::Payload {
                content_type,
                filename,
                data,
                head_only,
            } => {
                let length = data.len();
                let body = if head_only {
                    Body::empty()
                } else {
                    Body::from(data)
                };
                let mut response = Response::new(body);
                *response.status_mut() = StatusCode::OK;
                set_content_headers(response.headers_mut(), &content_type, length, &filename);
                response
            }
            ContentReply::Uploaded(content) => (StatusCode::CREATED, Json(content)).into_response(),
        }
    }
}

fn set_content_headers(headers: &mut HeaderMap, content_type: &str, length: usize, filename: &str) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));

    let disposition = format!(
        "attachment; filename=\"{}\"",
        filename.replace('\\', "\\\\").replace('"', "\\\"")
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
}
