//! Records decoded from service responses
//!
//! These types mirror the JSON objects returned by the storage API. They are
//! immutable once decoded; the file list and index hand out clones or `Arc`s.

use std::collections::BTreeMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// What a file version represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    /// A regular uploaded file
    Upload,
    /// A large file that has been started but not finished
    Start,
    /// A hide marker
    Hide,
    /// A virtual folder from a delimited listing
    Folder,
    /// Anything newer servers send that we do not model
    #[serde(other)]
    Other,
}

/// Metadata for one file version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Full file name within the bucket
    pub file_name: String,

    /// Server-assigned identifier of this version
    pub file_id: String,

    /// Size in bytes
    #[serde(default, rename = "contentLength")]
    pub size: u64,

    /// MIME type recorded at upload time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Hex SHA-1 of the content ("none" for large files)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_sha1: Option<String>,

    /// Upload time, millisecond precision
    #[serde(
        default,
        with = "timestamp_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub upload_timestamp: Option<Timestamp>,

    /// Version kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<FileAction>,

    /// Custom file info headers stored with the file
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub file_info: BTreeMap<String, String>,

    /// Owning bucket, used to build follow-up requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_id: Option<String>,
}

impl FileRecord {
    /// Create a record with only identity and size set
    pub fn new(file_name: impl Into<String>, file_id: impl Into<String>, size: u64) -> Self {
        Self {
            file_name: file_name.into(),
            file_id: file_id.into(),
            size,
            content_type: None,
            content_sha1: None,
            upload_timestamp: None,
            action: None,
            file_info: BTreeMap::new(),
            bucket_id: None,
        }
    }

    /// Decode a record from one entry of a service response
    pub fn from_json(value: serde_json::Value) -> crate::Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Size formatted for humans
    pub fn size_human(&self) -> String {
        humansize::format_size(self.size, humansize::BINARY)
    }

    /// Whether this version is a hide marker
    pub fn is_hidden(&self) -> bool {
        self.action == Some(FileAction::Hide)
    }
}

/// A bucket the file list operates on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub bucket_id: String,
    pub bucket_name: String,
}

impl Bucket {
    pub fn new(bucket_id: impl Into<String>, bucket_name: impl Into<String>) -> Self {
        Self {
            bucket_id: bucket_id.into(),
            bucket_name: bucket_name.into(),
        }
    }
}

/// Short-lived upload destination handed out by the service.
///
/// Targets are never shared between parts: each may expire independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTarget {
    pub upload_url: String,
    pub authorization_token: String,
}

mod timestamp_millis {
    use jiff::Timestamp;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &Option<Timestamp>, s: S) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => s.serialize_some(&ts.as_millisecond()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Timestamp>, D::Error> {
        Option::<i64>::deserialize(d)?
            .map(|ms| Timestamp::from_millisecond(ms).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_file_record() {
        let json = serde_json::json!({
            "accountId": "acct",
            "action": "upload",
            "bucketId": "bkt",
            "contentLength": 1024,
            "contentSha1": "da39a3ee5e6b4b0d3255bfef95601890afd80709",
            "contentType": "text/plain",
            "fileId": "4_z27c88f1d182b150646ff0b16_f1004ba650fe24e6b_d20180809_m012345",
            "fileInfo": { "src_last_modified_millis": "1533698394000" },
            "fileName": "photos/cat.txt",
            "uploadTimestamp": 1533778735000i64
        });

        let record = FileRecord::from_json(json).unwrap();
        assert_eq!(record.file_name, "photos/cat.txt");
        assert_eq!(record.size, 1024);
        assert_eq!(record.action, Some(FileAction::Upload));
        assert_eq!(record.bucket_id.as_deref(), Some("bkt"));
        assert_eq!(record.content_type.as_deref(), Some("text/plain"));
        assert_eq!(
            record.upload_timestamp.unwrap().as_millisecond(),
            1_533_778_735_000
        );
        assert_eq!(record.file_info.len(), 1);
    }

    #[test]
    fn test_decode_hide_marker() {
        let json = serde_json::json!({
            "action": "hide",
            "fileId": "id-1",
            "fileName": "gone.txt",
            "contentLength": 0,
            "uploadTimestamp": 1
        });
        let record = FileRecord::from_json(json).unwrap();
        assert!(record.is_hidden());
        assert_eq!(record.size, 0);
    }

    #[test]
    fn test_unknown_action() {
        let json = serde_json::json!({
            "action": "copy",
            "fileId": "id-1",
            "fileName": "a"
        });
        let record = FileRecord::from_json(json).unwrap();
        assert_eq!(record.action, Some(FileAction::Other));

        let folder = serde_json::json!({ "action": "folder", "fileId": "", "fileName": "logs/" });
        let record = FileRecord::from_json(folder).unwrap();
        assert_eq!(record.action, Some(FileAction::Folder));
    }

    #[test]
    fn test_missing_file_id_is_an_error() {
        let json = serde_json::json!({ "fileName": "a" });
        assert!(FileRecord::from_json(json).is_err());
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = FileRecord::new("a.txt", "id-1", 10);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["fileName"], "a.txt");
        assert_eq!(value["contentLength"], 10);
        assert!(value.get("uploadTimestamp").is_none());
    }

    #[test]
    fn test_size_human() {
        let record = FileRecord::new("a", "b", 2048);
        assert_eq!(record.size_human(), "2 KiB");
    }
}
