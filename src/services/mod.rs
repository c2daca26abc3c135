//! Service layer: metadata registry, content store, and the content
//! subresource connector that ties them together.

pub mod content_connector;
pub mod content_store;
pub mod file_registry;
pub mod media_type;

use crate::config::ContentRetention;
use content_connector::ContentConnector;
use content_store::ContentStore;
use file_registry::FileRegistry;
use std::sync::Arc;

/// Shared application state passed to all handlers via `axum::extract::State`.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<dyn FileRegistry>,
    pub content: Arc<ContentStore>,
    pub connector: ContentConnector,
    pub retention: ContentRetention,
    /// Honour `X-Forwarded-Proto` when deciding whether a request used TLS.
    pub trust_forwarded_proto: bool,
}

impl AppState {
    pub fn new(
        registry: Arc<dyn FileRegistry>,
        external_host: Option<String>,
        retention: ContentRetention,
        trust_forwarded_proto: bool,
    ) -> Self {
        let content = Arc::new(ContentStore::new());
        let connector = ContentConnector::new(registry.clone(), content.clone(), external_host);
        Self {
            registry,
            content,
            connector,
            retention,
            trust_forwarded_proto,
        }
    }
}
