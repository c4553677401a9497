//! Gateway trait definition
//!
//! This trait is the only way the core talks to the storage service. It
//! allows the file list, the lister and the upload coordinator to be
//! decoupled from any particular HTTP client, and mocked in tests.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::{Error, RemoteError, Result};
use crate::models::UploadTarget;
use crate::stream::RangedReader;

/// API calls the core issues through [`Gateway::make_request`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiPath {
    ListFileNames,
    ListFileVersions,
    GetFileInfo,
    GetUploadUrl,
    StartLargeFile,
    GetUploadPartUrl,
    FinishLargeFile,
    CancelLargeFile,
}

impl ApiPath {
    /// Operation name as it appears in the URL
    pub const fn name(self) -> &'static str {
        match self {
            ApiPath::ListFileNames => "b2_list_file_names",
            ApiPath::ListFileVersions => "b2_list_file_versions",
            ApiPath::GetFileInfo => "b2_get_file_info",
            ApiPath::GetUploadUrl => "b2_get_upload_url",
            ApiPath::StartLargeFile => "b2_start_large_file",
            ApiPath::GetUploadPartUrl => "b2_get_upload_part_url",
            ApiPath::FinishLargeFile => "b2_finish_large_file",
            ApiPath::CancelLargeFile => "b2_cancel_large_file",
        }
    }
}

impl std::fmt::Display for ApiPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// HTTP method for a gateway call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A decoded service response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status_code: u16,
    pub body: serde_json::Value,
}

impl ApiResponse {
    pub fn new(status_code: u16, body: serde_json::Value) -> Self {
        Self { status_code, body }
    }

    /// Shorthand for a 200 response
    pub fn ok(body: serde_json::Value) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }

    /// Return the JSON body, or the decoded server error for any non-200 status
    pub fn into_json(self) -> Result<serde_json::Value> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(Error::RemoteRequest(RemoteError::decode(
                self.status_code,
                &self.body,
            )))
        }
    }

    /// Like [`ApiResponse::into_json`], then deserialize into `T`
    pub fn parse<T: DeserializeOwned>(self) -> Result<T> {
        let body = self.into_json()?;
        Ok(serde_json::from_value(body)?)
    }
}

/// Headers describing a single-shot upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    pub content_length: u64,
}

/// Transport gateway to the storage service
///
/// Implementations own authentication, retries and encoding. A non-200
/// answer is returned as an [`ApiResponse`], not an error; `Err` is reserved
/// for transport failures.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Issue an authenticated API call with JSON parameters
    async fn make_request(
        &self,
        path: ApiPath,
        method: Method,
        params: serde_json::Value,
    ) -> Result<ApiResponse>;

    /// Upload a whole file to a target from `b2_get_upload_url`
    async fn upload_file(
        &self,
        target: &UploadTarget,
        file: FileUpload,
        body: RangedReader,
    ) -> Result<ApiResponse>;

    /// Upload one part of a large file to a target from `b2_get_upload_part_url`
    async fn upload_part(
        &self,
        target: &UploadTarget,
        part_number: u32,
        body: RangedReader,
    ) -> Result<ApiResponse>;

    /// Part size the service recommends for this account
    fn recommended_part_size(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_path_names() {
        assert_eq!(ApiPath::ListFileNames.name(), "b2_list_file_names");
        assert_eq!(ApiPath::FinishLargeFile.to_string(), "b2_finish_large_file");
    }

    #[test]
    fn test_into_json_success() {
        let response = ApiResponse::ok(serde_json::json!({"fileId": "abc"}));
        assert_eq!(response.into_json().unwrap()["fileId"], "abc");
    }

    #[test]
    fn test_into_json_non_200_is_remote_error() {
        let response = ApiResponse::new(
            401,
            serde_json::json!({"status": 401, "code": "expired_auth_token", "message": "expired"}),
        );
        match response.into_json() {
            Err(Error::RemoteRequest(remote)) => {
                assert_eq!(remote.status, 401);
                assert_eq!(remote.code, "expired_auth_token");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_upload_target() {
        let response = ApiResponse::ok(serde_json::json!({
            "bucketId": "b",
            "uploadUrl": "https://pod-000.backblaze.com/b2api/v2/b2_upload_file/b",
            "authorizationToken": "tok"
        }));
        let target: UploadTarget = response.parse().unwrap();
        assert_eq!(target.authorization_token, "tok");
    }

    #[test]
    fn test_non_200_2xx_still_fails() {
        let response = ApiResponse::new(204, serde_json::Value::Null);
        assert!(response.into_json().is_err());
    }
}
