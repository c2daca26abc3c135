//! HTTP handlers. Each handler extracts what it needs, delegates to the
//! service layer, and maps service errors into `AppError`.

pub mod content_handlers;
pub mod file_handlers;
pub mod health_handlers;
