//! src/services/content_connector.rs
//!
//! ContentConnector — the `/content` subresource of a File. It keeps the
//! File's metadata (size, content type, upload status) in the registry in
//! step with the bytes held in the [`ContentStore`].
//!
//! An upload reads the whole body, validates its Content-Type, upserts the
//! File, and only then commits the bytes to the store. The two stores are not
//! transactional: if the process dies between the upsert and the commit, the
//! File reports `uploaded: true` for content that cannot be served until the
//! next successful upload.

use crate::{
    models::{
        GROUP_NAME, VERSION,
        file::{FILE_KIND, File, FileContent},
        status::Status,
    },
    services::{
        content_store::{ContentKey, ContentStore},
        file_registry::{FileRegistry, RegistryError},
        media_type::{DEFAULT_CONTENT_TYPE, MediaTypeError, normalize_content_type},
    },
};
use axum::{
    body::Body,
    http::{HeaderMap, Method, StatusCode, header},
};
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ContentError {
    /// The File itself could not be looked up (including "not found").
    #[error(transparent)]
    Lookup(RegistryError),
    /// The File exists but nothing has been uploaded for it.
    #[error("content for files.cdn.k8s.toms.place \"{name}\" not found")]
    ContentNotFound { name: String },
    #[error(transparent)]
    MediaType(#[from] MediaTypeError),
    #[error("failed to read request body: {0}")]
    BodyRead(String),
    #[error("failed to create file resource: {0}")]
    Create(RegistryError),
    #[error("failed to update file resource: {0}")]
    Update(RegistryError),
    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),
}

pub type ContentResult<T> = Result<T, ContentError>;

/// What the endpoint answers with on success.
#[derive(Debug)]
pub enum ContentReply {
    /// Stored bytes for GET, or only their headers for HEAD.
    Payload {
        content_type: String,
        filename: String,
        data: Bytes,
        head_only: bool,
    },
    /// Outcome of a successful upload.
    Uploaded(FileContent),
}

/// The parts of the inbound request that shape a File's content URL.
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    pub namespace: String,
    /// Value of the request's `Host` header.
    pub host: Option<String>,
    /// True when the request reached us over TLS.
    pub tls: bool,
}

/// Serves the content subresource for every File.
///
/// Cheap to clone; all clones share one registry and one content store.
#[derive(Clone)]
pub struct ContentConnector {
    registry: Arc<dyn FileRegistry>,
    store: Arc<ContentStore>,
    external_host: Option<String>,
}

impl ContentConnector {
    pub fn new(
        registry: Arc<dyn FileRegistry>,
        store: Arc<ContentStore>,
        external_host: Option<String>,
    ) -> Self {
        Self {
            registry,
            store,
            external_host: external_host.filter(|h| !h.is_empty()),
        }
    }

    /// Bind a handler to the File `name` in the request's scope.
    pub fn connect(&self, scope: RequestScope, name: impl Into<String>) -> ContentHandler<'_> {
        ContentHandler {
            connector: self,
            scope,
            name: name.into(),
        }
    }

    /// Methods served by [`ContentHandler::serve`].
    pub fn methods() -> [Method; 3] {
        [Method::GET, Method::HEAD, Method::PUT]
    }
}

/// The content endpoint of one File.
pub struct ContentHandler<'a> {
    connector: &'a ContentConnector,
    scope: RequestScope,
    name: String,
}

impl ContentHandler<'_> {
    /// Dispatch on the request method.
    pub async fn serve(
        &self,
        method: &Method,
        headers: &HeaderMap,
        body: Body,
    ) -> ContentResult<ContentReply> {
        match *method {
            Method::GET => self.handle_get(false).await,
            Method::HEAD => self.handle_get(true).await,
            Method::PUT => self.handle_put(headers, body).await,
            _ => Err(ContentError::MethodNotAllowed(method.clone())),
        }
    }

    /// Canonical URL of this File's content endpoint.
    ///
    /// Uses the configured external host when set, else the request's host.
    pub fn content_url(&self) -> String {
        let scheme = if self.scope.tls { "https" } else { "http" };
        let host = self
            .connector
            .external_host
            .as_deref()
            .or(self.scope.host.as_deref())
            .unwrap_or_default();
        format!(
            "{}://{}/apis/{}/{}/namespaces/{}/files/{}/content",
            scheme, host, GROUP_NAME, VERSION, self.scope.namespace, self.name
        )
    }

    fn key(&self) -> ContentKey {
        ContentKey::new(&self.scope.namespace, &self.name)
    }

    async fn handle_get(&self, head_only: bool) -> ContentResult<ContentReply> {
        let file = self
            .connector
            .registry
            .get(&self.scope.namespace, &self.name)
            .await
            .map_err(ContentError::Lookup)?;

        let entry = self
            .connector
            .store
            .get(&self.key())
            .ok_or_else(|| ContentError::ContentNotFound {
                name: self.name.clone(),
            })?;

        let content_type = if file.spec.content_type.is_empty() {
            DEFAULT_CONTENT_TYPE.to_string()
        } else {
            file.spec.content_type
        };

        Ok(ContentReply::Payload {
            content_type,
            filename: self.name.clone(),
            data: entry.data.clone(),
            head_only,
        })
    }

    async fn handle_put(&self, headers: &HeaderMap, body: Body) -> ContentResult<ContentReply> {
        let data = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(|err| ContentError::BodyRead(err.to_string()))?;
        let size = data.len() as i64;

        let declared = match headers.get(header::CONTENT_TYPE) {
            Some(value) => Some(value.to_str().map_err(|_| MediaTypeError::Unparsable {
                header: String::from_utf8_lossy(value.as_bytes()).into_owned(),
                reason: "header is not visible ASCII".into(),
            })?),
            None => None,
        };
        let content_type = normalize_content_type(declared).inspect_err(|err| {
            debug!("rejected upload for {}/{}: {}", self.scope.namespace, self.name, err);
        })?;

        let url = self.content_url();
        self.upsert(url, size, &content_type).await?;

        let status = Status::success(
            format!(
                "content uploaded successfully for file {} ({} bytes, {})",
                self.name, size, content_type
            ),
            StatusCode::CREATED.as_u16(),
        )
        .with_details(FILE_KIND, &self.name);

        self.connector.store.put(self.key(), data, status.clone());
        info!(
            namespace = %self.scope.namespace,
            name = %self.name,
            size,
            content_type = %content_type,
            "stored file content"
        );

        Ok(ContentReply::Uploaded(FileContent::new(status)))
    }

    /// Create the File if absent, else refresh its content projection.
    async fn upsert(&self, url: String, size: i64, content_type: &str) -> ContentResult<File> {
        let registry = &self.connector.registry;
        match registry.get(&self.scope.namespace, &self.name).await {
            Ok(mut file) => {
                file.spec.url = url;
                file.spec.size = size;
                file.spec.content_type = content_type.to_string();
                file.status.uploaded = true;
                file.status.error.clear();
                registry.update(file).await.map_err(|err| {
                    warn!("updating {}/{} failed: {}", self.scope.namespace, self.name, err);
                    ContentError::Update(err)
                })
            }
            Err(err) if err.is_not_found() => {
                let mut file = File::new(&self.scope.namespace, &self.name);
                file.spec.url = url;
                file.spec.size = size;
                file.spec.content_type = content_type.to_string();
                file.status.uploaded = true;
                registry.create(file).await.map_err(|err| {
                    warn!("creating {}/{} failed: {}", self.scope.namespace, self.name, err);
                    ContentError::Create(err)
                })
            }
            Err(err) => Err(ContentError::Lookup(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::file::FileList,
        services::file_registry::{RegistryResult, SqliteFileRegistry},
    };
    use async_trait::async_trait;
    use axum::http::HeaderValue;

    async fn connector() -> (ContentConnector, Arc<SqliteFileRegistry>, Arc<ContentStore>) {
        let registry = Arc::new(SqliteFileRegistry::in_memory().await.unwrap());
        let store = Arc::new(ContentStore::new());
        let connector = ContentConnector::new(registry.clone(), store.clone(), None);
        (connector, registry, store)
    }

    fn scope() -> RequestScope {
        RequestScope {
            namespace: "default".into(),
            host: Some("localhost:8080".into()),
            tls: false,
        }
    }

    fn content_type(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(value));
        headers
    }

    async fn put(
        connector: &ContentConnector,
        name: &str,
        ct: &'static str,
        body: &'static str,
    ) -> ContentResult<ContentReply> {
        connector
            .connect(scope(), name)
            .serve(&Method::PUT, &content_type(ct), Body::from(body))
            .await
    }

    async fn get(connector: &ContentConnector, name: &str) -> ContentResult<ContentReply> {
        connector
            .connect(scope(), name)
            .serve(&Method::GET, &HeaderMap::new(), Body::empty())
            .await
    }

    #[tokio::test]
    async fn test_put_then_get_returns_bytes() {
        let (connector, _, _) = connector().await;
        let reply = put(&connector, "hello.txt", "text/plain; charset=utf-8", "hello world")
            .await
            .unwrap();
        let ContentReply::Uploaded(content) = reply else {
            panic!("expected upload reply");
        };
        assert!(content.status.is_success());
        assert_eq!(content.status.code, 201);
        assert_eq!(
            content.status.message,
            "content uploaded successfully for file hello.txt (11 bytes, text/plain; charset=utf-8)"
        );

        match get(&connector, "hello.txt").await.unwrap() {
            ContentReply::Payload {
                content_type,
                filename,
                data,
                head_only,
            } => {
                assert_eq!(content_type, "text/plain; charset=utf-8");
                assert_eq!(filename, "hello.txt");
                assert_eq!(data, Bytes::from_static(b"hello world"));
                assert!(!head_only);
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_put_creates_resource() {
        let (connector, registry, _) = connector().await;
        put(&connector, "new.bin", "application/x-custom", "12345")
            .await
            .unwrap();

        let file = registry.get("default", "new.bin").await.unwrap();
        assert!(file.status.uploaded);
        assert_eq!(file.spec.size, 5);
        assert_eq!(file.spec.content_type, "application/x-custom");
        assert_eq!(
            file.spec.url,
            "http://localhost:8080/apis/cdn.k8s.toms.place/v1alpha1/namespaces/default/files/new.bin/content"
        );
    }

    #[tokio::test]
    async fn test_put_updates_existing_resource() {
        let (connector, registry, _) = connector().await;
        let mut existing = File::new("default", "doc");
        existing.spec.resource_location = "bucket-a".into();
        existing.status.error = "previous upload failed".into();
        let created = registry.create(existing).await.unwrap();

        put(&connector, "doc", "text/markdown", "# title").await.unwrap();

        let file = registry.get("default", "doc").await.unwrap();
        assert_eq!(file.metadata.uid, created.metadata.uid);
        assert_eq!(file.metadata.resource_version, "2");
        assert_eq!(file.spec.size, 7);
        assert_eq!(file.spec.content_type, "text/markdown");
        assert_eq!(file.spec.resource_location, "bucket-a");
        assert!(file.status.uploaded);
        assert!(file.status.error.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_content_type_mutates_nothing() {
        let (connector, registry, store) = connector().await;

        let err = put(&connector, "a", "bogus-no-slash", "x").await.unwrap_err();
        assert!(matches!(
            err,
            ContentError::MediaType(MediaTypeError::Unparsable { .. })
        ));
        let err = put(&connector, "a", "wibble/plain", "x").await.unwrap_err();
        assert!(matches!(
            err,
            ContentError::MediaType(MediaTypeError::Unsupported(_))
        ));

        assert!(registry.get("default", "a").await.unwrap_err().is_not_found());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_missing_content_type_defaults() {
        let (connector, registry, _) = connector().await;
        connector
            .connect(scope(), "raw")
            .serve(&Method::PUT, &HeaderMap::new(), Body::from("abc"))
            .await
            .unwrap();
        let file = registry.get("default", "raw").await.unwrap();
        assert_eq!(file.spec.content_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn test_get_distinguishes_missing_resource_from_missing_content() {
        let (connector, registry, _) = connector().await;

        let err = get(&connector, "ghost").await.unwrap_err();
        assert!(matches!(err, ContentError::Lookup(ref e) if e.is_not_found()));

        registry.create(File::new("default", "empty")).await.unwrap();
        let err = get(&connector, "empty").await.unwrap_err();
        assert!(matches!(err, ContentError::ContentNotFound { .. }));
        assert_ne!(
            err.to_string(),
            get(&connector, "ghost").await.unwrap_err().to_string()
        );
    }

    #[tokio::test]
    async fn test_head_reply_is_marked_head_only() {
        let (connector, _, _) = connector().await;
        put(&connector, "a", "image/png", "png-bytes").await.unwrap();
        let reply = connector
            .connect(scope(), "a")
            .serve(&Method::HEAD, &HeaderMap::new(), Body::empty())
            .await
            .unwrap();
        assert!(matches!(
            reply,
            ContentReply::Payload { head_only: true, ref data, .. } if data.len() == 9
        ));
    }

    #[tokio::test]
    async fn test_get_defaults_empty_content_type() {
        let (connector, registry, store) = connector().await;
        registry.create(File::new("default", "blank")).await.unwrap();
        store.put(
            ContentKey::new("default", "blank"),
            Bytes::from_static(b"zz"),
            Status::success("seeded", 201),
        );
        match get(&connector, "blank").await.unwrap() {
            ContentReply::Payload { content_type, .. } => {
                assert_eq!(content_type, "application/octet-stream")
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_other_methods_not_allowed() {
        let (connector, _, _) = connector().await;
        let err = connector
            .connect(scope(), "a")
            .serve(&Method::DELETE, &HeaderMap::new(), Body::empty())
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::MethodNotAllowed(Method::DELETE)));
        assert_eq!(err.to_string(), "method DELETE not allowed");
    }

    #[tokio::test]
    async fn test_content_url_scheme_and_host() {
        let (plain, _, _) = connector().await;
        let tls_scope = RequestScope {
            namespace: "web".into(),
            host: Some("request.example".into()),
            tls: true,
        };
        assert_eq!(
            plain.connect(tls_scope.clone(), "a").content_url(),
            "https://request.example/apis/cdn.k8s.toms.place/v1alpha1/namespaces/web/files/a/content"
        );

        let registry = Arc::new(SqliteFileRegistry::in_memory().await.unwrap());
        let external = ContentConnector::new(
            registry,
            Arc::new(ContentStore::new()),
            Some("cdn.example.com:8443".into()),
        );
        let plain_scope = RequestScope {
            tls: false,
            ..tls_scope
        };
        assert_eq!(
            external.connect(plain_scope, "a").content_url(),
            "http://cdn.example.com:8443/apis/cdn.k8s.toms.place/v1alpha1/namespaces/web/files/a/content"
        );
    }

    #[tokio::test]
    async fn test_concurrent_puts_leave_one_whole_payload() {
        let (connector, _, _) = connector().await;
        put(&connector, "race", "text/plain", "seed").await.unwrap();

        let first = "a".repeat(32 * 1024);
        let second = "b".repeat(32 * 1024);
        let tasks: Vec<_> = [first.clone(), second.clone()]
            .into_iter()
            .map(|payload| {
                let connector = connector.clone();
                tokio::spawn(async move {
                    connector
                        .connect(scope(), "race")
                        .serve(&Method::PUT, &content_type("text/plain"), Body::from(payload))
                        .await
                })
            })
            .collect();

        let mut succeeded = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }
        assert!(succeeded >= 1);

        let ContentReply::Payload { data, .. } = get(&connector, "race").await.unwrap() else {
            panic!("expected payload");
        };
        assert!(data == first.as_bytes() || data == second.as_bytes());
    }

    /// Registry whose lookups report "not found" and whose writes fail.
    struct BrokenRegistry;

    #[async_trait]
    impl FileRegistry for BrokenRegistry {
        async fn get(&self, namespace: &str, name: &str) -> RegistryResult<File> {
            Err(RegistryError::NotFound {
                namespace: namespace.into(),
                name: name.into(),
            })
        }
        async fn create(&self, _file: File) -> RegistryResult<File> {
            Err(RegistryError::Sqlx(sqlx::Error::PoolClosed))
        }
        async fn update(&self, _file: File) -> RegistryResult<File> {
            Err(RegistryError::Sqlx(sqlx::Error::PoolClosed))
        }
        async fn delete(&self, namespace: &str, name: &str) -> RegistryResult<File> {
            self.get(namespace, name).await
        }
        async fn list(&self, _namespace: &str) -> RegistryResult<FileList> {
            Ok(FileList::new(Vec::new()))
        }
        async fn ping(&self) -> RegistryResult<()> {
            Err(RegistryError::Sqlx(sqlx::Error::PoolClosed))
        }
    }

    #[tokio::test]
    async fn test_failed_create_commits_no_content() {
        let store = Arc::new(ContentStore::new());
        let connector = ContentConnector::new(Arc::new(BrokenRegistry), store.clone(), None);

        let err = put(&connector, "a", "text/plain", "bytes").await.unwrap_err();
        assert!(matches!(err, ContentError::Create(_)));
        assert!(err.to_string().starts_with("failed to create file resource"));
        assert!(store.is_empty());
    }
}
