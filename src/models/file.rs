//! Represents a File resource: metadata about a piece of content served by the
//! content subresource.

use super::{group_version, status::Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const FILE_KIND: &str = "File";
pub const FILE_LIST_KIND: &str = "FileList";
pub const FILE_CONTENT_KIND: &str = "FileContent";

/// Standard object metadata carried by every stored resource.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectMeta {
    /// Name, unique within the namespace.
    pub name: String,

    /// Namespace the resource lives in.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    /// Server-assigned identity, stable across updates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uuid>,

    /// Opaque version used for optimistic concurrency on update.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub resource_version: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

/// Desired state of a File.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FileSpec {
    /// Canonical URL of the content subresource.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,

    /// Size of the content in bytes.
    #[serde(skip_serializing_if = "is_zero")]
    pub size: i64,

    /// Normalized MIME type of the content.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub content_type: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub resource_location: String,
}

/// Observed state of a File.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FileStatus {
    /// True once content has been uploaded.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub uploaded: bool,

    /// Error message from the last failed upload, if any.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error: String,
}

/// A File resource.
///
/// `size`, `content_type` and `uploaded` are a projection of the content held
/// in the content store; they are refreshed on every successful upload.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct File {
    #[serde(default = "group_version")]
    pub api_version: String,

    #[serde(default = "file_kind")]
    pub kind: String,

    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: FileSpec,

    #[serde(default)]
    pub status: FileStatus,
}

impl File {
    /// An empty File with the given coordinates.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            api_version: group_version(),
            kind: file_kind(),
            metadata: ObjectMeta {
                name: name.into(),
                namespace: namespace.into(),
                ..ObjectMeta::default()
            },
            spec: FileSpec::default(),
            status: FileStatus::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }
}

/// Metadata of a list response.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ListMeta {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
}

/// A list of File resources.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: ListMeta,
    pub items: Vec<File>,
}

impl FileList {
    pub fn new(items: Vec<File>) -> Self {
        Self {
            api_version: group_version(),
            kind: FILE_LIST_KIND.to_string(),
            metadata: ListMeta::default(),
            items,
        }
    }
}

/// Response body of a successful content upload.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    pub api_version: String,
    pub kind: String,
    pub status: Status,
}

impl FileContent {
    pub fn new(status: Status) -> Self {
        Self {
            api_version: group_version(),
            kind: FILE_CONTENT_KIND.to_string(),
            status,
        }
    }
}

fn file_kind() -> String {
    FILE_KIND.to_string()
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}
