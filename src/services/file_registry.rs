//! src/services/file_registry.rs
//!
//! FileRegistry — the metadata object store for File resources. Handlers and
//! the content connector only see the `FileRegistry` trait; the concrete
//! implementation keeps Files in SQLite with optimistic concurrency on
//! `resourceVersion`.

use crate::models::file::{File, FileList, FileSpec, FileStatus, ObjectMeta};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    FromRow, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{path::Path, str::FromStr, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("files.cdn.k8s.toms.place \"{name}\" not found")]
    NotFound { namespace: String, name: String },
    #[error("files.cdn.k8s.toms.place \"{name}\" already exists")]
    AlreadyExists { namespace: String, name: String },
    #[error(
        "Operation cannot be fulfilled on files.cdn.k8s.toms.place \"{name}\": the object has been modified; please apply your changes to the latest version and try again"
    )]
    Conflict { name: String },
    #[error("File \"{name}\" is invalid: {reason}")]
    Invalid { name: String, reason: String },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound { .. })
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// CRUD access to File resources, scoped by namespace.
#[async_trait]
pub trait FileRegistry: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> RegistryResult<File>;

    /// Store a new File under `file.metadata.namespace`. Server-owned
    /// metadata (uid, version, creation time) is assigned here.
    async fn create(&self, file: File) -> RegistryResult<File>;

    /// Replace spec and status of an existing File. The caller's
    /// `resourceVersion` must match the stored one.
    async fn update(&self, file: File) -> RegistryResult<File>;

    /// Remove a File and return its last state.
    async fn delete(&self, namespace: &str, name: &str) -> RegistryResult<File>;

    async fn list(&self, namespace: &str) -> RegistryResult<FileList>;

    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> RegistryResult<()>;
}

const NAME_MAX_LEN: usize = 253;
const NAMESPACE_MAX_LEN: usize = 63;
const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");
const COLUMNS: &str = "namespace, name, uid, resource_version, creation_timestamp, \
                       url, size, content_type, resource_location, uploaded, error";

#[derive(FromRow, Debug)]
struct FileRow {
    namespace: String,
    name: String,
    uid: String,
    resource_version: i64,
    creation_timestamp: DateTime<Utc>,
    url: String,
    size: i64,
    content_type: String,
    resource_location: String,
    uploaded: bool,
    error: String,
}

impl From<FileRow> for File {
    fn from(row: FileRow) -> Self {
        let mut file = File::new(row.namespace, row.name);
        file.metadata = ObjectMeta {
            uid: Uuid::parse_str(&row.uid).ok(),
            resource_version: row.resource_version.to_string(),
            creation_timestamp: Some(row.creation_timestamp),
            ..file.metadata
        };
        file.spec = FileSpec {
            url: row.url,
            size: row.size,
            content_type: row.content_type,
            resource_location: row.resource_location,
        };
        file.status = FileStatus {
            uploaded: row.uploaded,
            error: row.error,
        };
        file
    }
}

/// SQLite-backed registry.
#[derive(Clone)]
pub struct SqliteFileRegistry {
    pub db: Arc<SqlitePool>,
}

impl SqliteFileRegistry {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Open (creating if missing) the database at `url`.
    pub async fn connect(url: &str) -> RegistryResult<Self> {
        let db_path = url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:")
            .trim_start_matches("file:");
        if !db_path.starts_with(":memory:") {
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
                    tracing::info!("Created missing directory {:?}", parent);
                }
            }
        }

        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// A private in-memory database with the schema applied.
    ///
    /// Limited to one connection that never expires: every SQLite
    /// connection to `:memory:` is a separate database.
    pub async fn in_memory() -> RegistryResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await?;
        let registry = Self::new(Arc::new(pool));
        registry.migrate().await?;
        Ok(registry)
    }

    /// Apply the embedded schema. Safe to run repeatedly.
    pub async fn migrate(&self) -> RegistryResult<()> {
        let statements = SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        tracing::info!("Running {} migration statements...", statements.len());
        for stmt in statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    async fn fetch_row(&self, namespace: &str, name: &str) -> RegistryResult<Option<FileRow>> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {COLUMNS} FROM files WHERE namespace = ? AND name = ?"
        ))
        .bind(namespace)
        .bind(name)
        .fetch_optional(&*self.db)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl FileRegistry for SqliteFileRegistry {
    async fn get(&self, namespace: &str, name: &str) -> RegistryResult<File> {
        ensure_namespace_valid(namespace)?;
        self.fetch_row(namespace, name)
            .await?
            .map(File::from)
            .ok_or_else(|| not_found(namespace, name))
    }

    async fn create(&self, file: File) -> RegistryResult<File> {
        ensure_namespace_valid(file.namespace())?;
        ensure_name_valid(file.name())?;

        let row = sqlx::query_as::<_, FileRow>(&format!(
            "INSERT INTO files ({COLUMNS}) VALUES (?, ?, ?, 1, ?, ?, ?, ?, ?, ?, ?) RETURNING {COLUMNS}"
        ))
        .bind(file.namespace())
        .bind(file.name())
        .bind(Uuid::new_v4().to_string())
        .bind(Utc::now())
        .bind(&file.spec.url)
        .bind(file.spec.size)
        .bind(&file.spec.content_type)
        .bind(&file.spec.resource_location)
        .bind(file.status.uploaded)
        .bind(&file.status.error)
        .fetch_one(&*self.db)
        .await;

        match row {
            Ok(row) => {
                debug!("created file {}/{}", row.namespace, row.name);
                Ok(row.into())
            }
            Err(err) if is_unique_violation(&err) => Err(RegistryError::AlreadyExists {
                namespace: file.metadata.namespace,
                name: file.metadata.name,
            }),
            Err(err) => Err(RegistryError::Sqlx(err)),
        }
    }

    async fn update(&self, file: File) -> RegistryResult<File> {
        ensure_namespace_valid(file.namespace())?;
        ensure_name_valid(file.name())?;
        let expected = file
            .metadata
            .resource_version
            .parse::<i64>()
            .map_err(|_| RegistryError::Invalid {
                name: file.name().to_string(),
                reason: "metadata.resourceVersion: must be specified for an update".into(),
            })?;

        let row = sqlx::query_as::<_, FileRow>(&format!(
            "UPDATE files SET url = ?, size = ?, content_type = ?, resource_location = ?,
                    uploaded = ?, error = ?, resource_version = resource_version + 1
             WHERE namespace = ? AND name = ? AND resource_version = ?
             RETURNING {COLUMNS}"
        ))
        .bind(&file.spec.url)
        .bind(file.spec.size)
        .bind(&file.spec.content_type)
        .bind(&file.spec.resource_location)
        .bind(file.status.uploaded)
        .bind(&file.status.error)
        .bind(file.namespace())
        .bind(file.name())
        .bind(expected)
        .fetch_optional(&*self.db)
        .await?;

        match row {
            Some(row) => Ok(row.into()),
            None => match self.fetch_row(file.namespace(), file.name()).await? {
                Some(_) => Err(RegistryError::Conflict {
                    name: file.metadata.name.clone(),
                }),
                None => Err(not_found(file.namespace(), file.name())),
            },
        }
    }

    async fn delete(&self, namespace: &str, name: &str) -> RegistryResult<File> {
        ensure_namespace_valid(namespace)?;
        sqlx::query_as::<_, FileRow>(&format!(
            "DELETE FROM files WHERE namespace = ? AND name = ? RETURNING {COLUMNS}"
        ))
        .bind(namespace)
        .bind(name)
        .fetch_optional(&*self.db)
        .await?
        .map(File::from)
        .ok_or_else(|| not_found(namespace, name))
    }

    async fn list(&self, namespace: &str) -> RegistryResult<FileList> {
        ensure_namespace_valid(namespace)?;
        let rows = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {COLUMNS} FROM files WHERE namespace = ? ORDER BY name ASC"
        ))
        .bind(namespace)
        .fetch_all(&*self.db)
        .await?;
        Ok(FileList::new(rows.into_iter().map(File::from).collect()))
    }

    async fn ping(&self) -> RegistryResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}

fn not_found(namespace: &str, name: &str) -> RegistryError {
    RegistryError::NotFound {
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

/// Validate a resource name as a DNS-1123 subdomain.
///
/// - 1–253 characters
/// - lowercase letters, digits, dots, hyphens only
/// - must start and end with a letter or digit
pub fn ensure_name_valid(name: &str) -> RegistryResult<()> {
    let invalid = |reason: &str| RegistryError::Invalid {
        name: name.to_string(),
        reason: format!("metadata.name: {}", reason),
    };

    if name.is_empty() {
        return Err(invalid("name is required"));
    }
    if name.len() > NAME_MAX_LEN {
        return Err(invalid("must be no more than 253 characters"));
    }
    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
    {
        return Err(invalid(
            "allowed characters are lowercase letters, digits, dots, and hyphens",
        ));
    }
    if !starts_and_ends_alphanumeric(name) {
        return Err(invalid("must start and end with a lowercase letter or digit"));
    }
    Ok(())
}

/// Validate a namespace as a DNS-1123 label.
fn ensure_namespace_valid(namespace: &str) -> RegistryResult<()> {
    let valid = !namespace.is_empty()
        && namespace.len() <= NAMESPACE_MAX_LEN
        && namespace
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '-'))
        && starts_and_ends_alphanumeric(namespace);
    if valid {
        Ok(())
    } else {
        Err(RegistryError::Invalid {
            name: namespace.to_string(),
            reason: "metadata.namespace: must be a lowercase DNS label".into(),
        })
    }
}

fn starts_and_ends_alphanumeric(value: &str) -> bool {
    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    value.chars().next().is_some_and(alnum) && value.chars().last().is_some_and(alnum)
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
