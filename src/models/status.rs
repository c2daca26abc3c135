//! Status is the outcome descriptor returned for operations that do not
//! return an object: failures, and content uploads.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// Identifies the object a status refers to.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusDetails {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(default = "status_api_version")]
    pub api_version: String,
    #[serde(default = "status_kind")]
    pub kind: String,
    pub status: Outcome,
    pub message: String,
    /// Machine-readable reason, e.g. `NotFound` or `ContentNotFound`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<StatusDetails>,
    pub code: u16,
}

impl Status {
    pub fn success(message: impl Into<String>, code: u16) -> Self {
        Self {
            api_version: status_api_version(),
            kind: status_kind(),
            status: Outcome::Success,
            message: message.into(),
            reason: String::new(),
            details: None,
            code,
        }
    }

    pub fn failure(reason: impl Into<String>, message: impl Into<String>, code: u16) -> Self {
        Self {
            api_version: status_api_version(),
            kind: status_kind(),
            status: Outcome::Failure,
            message: message.into(),
            reason: reason.into(),
            details: None,
            code,
        }
    }

    pub fn with_details(mut self, kind: impl Into<String>, name: impl Into<String>) -> Self {
        self.details = Some(StatusDetails {
            name: name.into(),
            kind: kind.into(),
        });
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == Outcome::Success
    }
}

fn status_api_version() -> String {
    "v1".to_string()
}

fn status_kind() -> String {
    "Status".to_string()
}
