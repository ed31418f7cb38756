//! Structured status bodies for upload responses
//!
//! Mirrors the generic API `Status` object: a kind/version envelope, a
//! `Success`/`Failure` outcome, a human message, a machine reason, optional
//! details, and the HTTP code.

use hyper::StatusCode;
use serde::Serialize;

use crate::upload::{SavedUpload, UploadError};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApiStatus {
    pub kind: &'static str,
    pub api_version: &'static str,
    pub metadata: StatusMetadata,
    pub status: Outcome,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<StatusDetails>,
    pub code: u16,
}

/// Always empty; kept so the envelope matches the usual shape
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct StatusMetadata {}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatusDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

impl ApiStatus {
    pub fn success(saved: &SavedUpload) -> Self {
        Self {
            kind: "Status",
            api_version: "v1",
            metadata: StatusMetadata::default(),
            status: Outcome::Success,
            message: saved.path.display().to_string(),
            reason: None,
            details: Some(StatusDetails {
                name: Some(saved.filename.clone()),
                size: Some(saved.size),
                retry_after_seconds: None,
            }),
            code: StatusCode::OK.as_u16(),
        }
    }

    pub fn failure(err: &UploadError) -> Self {
        Self {
            kind: "Status",
            api_version: "v1",
            metadata: StatusMetadata::default(),
            status: Outcome::Failure,
            message: err.to_string(),
            reason: Some(err.reason()),
            details: err.retry_after().map(|secs| StatusDetails {
                retry_after_seconds: Some(secs),
                ..StatusDetails::default()
            }),
            code: err.status_code().as_u16(),
        }
    }

    pub fn from_result(result: &Result<SavedUpload, UploadError>) -> Self {
        match result {
            Ok(saved) => Self::success(saved),
            Err(err) => Self::failure(err),
        }
    }

    /// Positive retry delay, if the status carries one
    pub fn retry_after(&self) -> Option<u64> {
        self.details
            .as_ref()
            .and_then(|d| d.retry_after_seconds)
            .filter(|secs| *secs > 0)
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}
