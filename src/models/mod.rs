//! Wire models the engine needs to decode
//!
//! Only the handful of documents the upload, monitor and batch paths
//! consume are modelled; everything else on an [`Item`] is kept as raw
//! JSON in `extra`.

mod registry;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use registry::{Decoder, DecoderRegistry, RegistryError};

use crate::classifier::ErrorResponse;

/// A stored object as described by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "eTag", skip_serializing_if = "Option::is_none")]
    pub e_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Upload session document returned on session creation and on every
/// accepted fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSessionInfo {
    #[serde(default)]
    pub upload_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_expected_ranges: Vec<String>,
}

/// Server-side state of a long-running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AsyncJobState {
    #[serde(rename = "waiting", alias = "notStarted")]
    Waiting,
    #[serde(rename = "inProgress", alias = "updating", alias = "deletePending")]
    InProgress,
    #[serde(rename = "completed", alias = "complete")]
    Complete,
    #[serde(rename = "failed", alias = "deleteFailed")]
    Failed,
}

impl AsyncJobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AsyncJobState::Complete | AsyncJobState::Failed)
    }
}

/// Status document served at an async job's monitor URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncJobStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default)]
    pub percentage_complete: f64,
    pub status: AsyncJobState,
}

/// Which model a response body should decode into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResultKind {
    #[default]
    Item,
    UploadSession,
    AsyncJobStatus,
    Error,
    /// The body is not decoded.
    None,
}

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum DataModel {
    Item(Item),
    UploadSession(UploadSessionInfo),
    AsyncJobStatus(AsyncJobStatus),
    Error(ErrorResponse),
    None,
}

impl DataModel {
    pub fn kind(&self) -> ResultKind {
        match self {
            DataModel::Item(_) => ResultKind::Item,
            DataModel::UploadSession(_) => ResultKind::UploadSession,
            DataModel::AsyncJobStatus(_) => ResultKind::AsyncJobStatus,
            DataModel::Error(_) => ResultKind::Error,
            DataModel::None => ResultKind::None,
        }
    }

    pub fn into_item(self) -> Option<Item> {
        match self {
            DataModel::Item(item) => Some(item),
            _ => None,
        }
    }

    pub fn into_upload_session(self) -> Option<UploadSessionInfo> {
        match self {
            DataModel::UploadSession(info) => Some(info),
            _ => None,
        }
    }
}

/// Deserializes a JSON body, keeping the raw text on failure.
pub fn decode_json<T: DeserializeOwned>(body: &[u8]) -> crate::Result<T> {
    serde_json::from_slice(body).map_err(|e| crate::Error::serialization(body, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_keeps_unknown_fields() {
        let item: Item = decode_json(
            br#"{"id":"A1","name":"big.bin","size":10485760,"eTag":"e1","file":{"mimeType":"x"}}"#,
        )
        .unwrap();
        assert_eq!(item.id, "A1");
        assert_eq!(item.size, 10 * 1024 * 1024);
        assert_eq!(item.e_tag.as_deref(), Some("e1"));
        assert!(item.extra.contains_key("file"));
    }

    #[test]
    fn test_upload_session_info() {
        let info: UploadSessionInfo = decode_json(
            br#"{"uploadUrl":"https://up.example.com/s1","expirationDateTime":"2026-10-19T08:00:00Z","nextExpectedRanges":["0-"]}"#,
        )
        .unwrap();
        assert_eq!(info.upload_url, "https://up.example.com/s1");
        assert!(info.expiration_date_time.is_some());
        assert_eq!(info.next_expected_ranges, vec!["0-"]);
    }

    #[test]
    fn test_async_job_state_aliases() {
        let status: AsyncJobStatus =
            decode_json(br#"{"operation":"ItemCopy","percentageComplete":12.5,"status":"notStarted"}"#)
                .unwrap();
        assert_eq!(status.status, AsyncJobState::Waiting);
        assert!(!status.status.is_terminal());

        let status: AsyncJobStatus = decode_json(br#"{"status":"completed"}"#).unwrap();
        assert!(status.status.is_terminal());
    }

    #[test]
    fn test_decode_failure_keeps_raw_body() {
        let err = decode_json::<Item>(b"not json").unwrap_err();
        match err {
            crate::Error::Serialization { raw, .. } => assert_eq!(raw, "not json"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
