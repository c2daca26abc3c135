use crate::{
    models::{file::FILE_KIND, status::Status},
    services::{
        content_connector::{ContentConnector, ContentError},
        file_registry::RegistryError,
    },
};
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::fmt;

/// An error surfaced to HTTP clients as a `Status` object.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    /// Machine-readable reason, e.g. `NotFound` or `ContentNotFound`.
    pub reason: &'static str,
    pub message: String,
    /// Name of the File the error is about, if any.
    pub name: Option<String>,
    /// Value for an `Allow` header on 405 responses.
    pub allow: Option<String>,
}

impl AppError {
    /// Create a new AppError with a specific status, reason and message.
    pub fn new(status: StatusCode, reason: &'static str, msg: impl Into<String>) -> Self {
        Self {
            status,
            reason,
            message: msg.into(),
            name: None,
            allow: None,
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "InternalError", msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BadRequest", msg)
    }

    fn about(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The Status body sent to the client.
    pub fn to_status(&self) -> Status {
        let status = Status::failure(self.reason, &self.message, self.status.as_u16());
        match &self.name {
            Some(name) => status.with_details(FILE_KIND, name),
            None => status,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.to_status())).into_response();
        if let Some(allow) = self.allow.as_deref().and_then(|a| HeaderValue::from_str(a).ok()) {
            response.headers_mut().insert(header::ALLOW, allow);
        }
        response
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        let message = err.to_string();
        match err {
            RegistryError::NotFound { name, .. } => {
                AppError::new(StatusCode::NOT_FOUND, "NotFound", message).about(name)
            }
            RegistryError::AlreadyExists { name, .. } => {
                AppError::new(StatusCode::CONFLICT, "AlreadyExists", message).about(name)
            }
            RegistryError::Conflict { name } => {
                AppError::new(StatusCode::CONFLICT, "Conflict", message).about(name)
            }
            RegistryError::Invalid { name, .. } => {
                AppError::new(StatusCode::UNPROCESSABLE_ENTITY, "Invalid", message).about(name)
            }
            RegistryError::Sqlx(_) => AppError::internal(message),
        }
    }
}

impl From<ContentError> for AppError {
    fn from(err: ContentError) -> Self {
        let message = err.to_string();
        match err {
            ContentError::Lookup(inner) => inner.into(),
            ContentError::ContentNotFound { name } => {
                AppError::new(StatusCode::NOT_FOUND, "ContentNotFound", message).about(name)
            }
            ContentError::MediaType(_) => AppError::bad_request(message),
            ContentError::BodyRead(_) | ContentError::Create(_) | ContentError::Update(_) => {
                AppError::internal(message)
            }
            ContentError::MethodNotAllowed(_) => {
                let mut err =
                    AppError::new(StatusCode::METHOD_NOT_ALLOWED, "MethodNotAllowed", message);
                err.allow = Some(
                    ContentConnector::methods()
                        .iter()
                        .map(|m| m.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                );
                err
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::media_type::MediaTypeError;

    #[test]
    fn test_not_found_kinds_are_distinct() {
        let missing_resource: AppError = ContentError::Lookup(RegistryError::NotFound {
            namespace: "default".into(),
            name: "a".into(),
        })
        .into();
        let missing_content: AppError =
            ContentError::ContentNotFound { name: "a".into() }.into();

        assert_eq!(missing_resource.status, StatusCode::NOT_FOUND);
        assert_eq!(missing_content.status, StatusCode::NOT_FOUND);
        assert_eq!(missing_resource.reason, "NotFound");
        assert_eq!(missing_content.reason, "ContentNotFound");
        assert_ne!(missing_resource.message, missing_content.message);
    }

    #[test]
    fn test_status_codes() {
        let bad: AppError = ContentError::MediaType(MediaTypeError::Unsupported("x/y".into())).into();
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);

        let failed: AppError =
            ContentError::Update(RegistryError::Conflict { name: "a".into() }).into();
        assert_eq!(failed.status, StatusCode::INTERNAL_SERVER_ERROR);

        let conflict: AppError = RegistryError::Conflict { name: "a".into() }.into();
        assert_eq!(conflict.status, StatusCode::CONFLICT);

        let method: AppError = ContentError::MethodNotAllowed(axum::http::Method::POST).into();
        assert_eq!(method.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(method.allow.as_deref(), Some("GET, HEAD, PUT"));
    }

    #[test]
    fn test_status_body() {
        let err: AppError = RegistryError::NotFound {
            namespace: "default".into(),
            name: "a".into(),
        }
        .into();
        let status = err.to_status();
        assert!(!status.is_success());
        assert_eq!(status.code, 404);
        assert_eq!(status.reason, "NotFound");
        assert_eq!(status.details.unwrap().name, "a");
    }
}
