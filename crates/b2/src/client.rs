//! B2 native API client
//!
//! Implements the [`Gateway`] trait from bz-core over reqwest. JSON calls are
//! retried on transport failures and on 429/503 answers; uploads stream their
//! body and are sent once.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};

use bz_core::partition::DEFAULT_PART_SIZE;
use bz_core::{
    Alias, ApiPath, ApiResponse, Bucket, Error, FileUpload, Gateway, Method, RangedReader,
    RemoteError, Result, RetryConfig, UploadTarget,
};

use crate::body::{self, DIGEST_AT_END};

/// API version segment of every URL
pub const API_VERSION: &str = "v2";

const USER_AGENT: &str = concat!("bz/", env!("CARGO_PKG_VERSION"));

/// Account session returned by `b2_authorize_account`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    pub account_id: String,
    pub authorization_token: String,
    pub api_url: String,
    #[serde(default)]
    pub recommended_part_size: Option<u64>,
    #[serde(default)]
    pub absolute_minimum_part_size: Option<u64>,
}

/// Client for one authorized account
pub struct B2Client {
    http: Client,
    auth: Authorization,
    retry: RetryConfig,
}

impl B2Client {
    /// Authorize the alias' key against its endpoint
    pub async fn connect(alias: &Alias) -> Result<Self> {
        let timeout = alias.timeout_config();
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_millis(timeout.connect_ms))
            .read_timeout(Duration::from_millis(timeout.read_ms))
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {e}")))?;

        let url = format!(
            "{}/b2api/{API_VERSION}/b2_authorize_account",
            alias.endpoint.trim_end_matches('/')
        );
        let retry = alias.retry_config();
        let response = send_with_retry(&retry, "b2_authorize_account", || {
            http.get(&url)
                .basic_auth(&alias.key_id, Some(&alias.application_key))
        })
        .await?;

        let auth: Authorization = match response.status_code {
            200 => serde_json::from_value(response.body)?,
            401 | 403 => {
                let remote = RemoteError::decode(response.status_code, &response.body);
                return Err(Error::Auth(remote.to_string()));
            }
            _ => response.parse()?,
        };
        tracing::debug!(
            alias = %alias.name,
            account_id = %auth.account_id,
            api_url = %auth.api_url,
            "account authorized"
        );

        Ok(Self { http, auth, retry })
    }

    pub fn authorization(&self) -> &Authorization {
        &self.auth
    }

    /// Look a bucket up by name
    pub async fn bucket(&self, bucket_name: &str) -> Result<Bucket> {
        #[derive(Deserialize)]
        struct Buckets {
            buckets: Vec<Bucket>,
        }

        let response: Buckets = self
            .call(
                "b2_list_buckets",
                Method::Post,
                json!({ "accountId": self.auth.account_id, "bucketName": bucket_name }),
            )
            .await?
            .parse()?;

        response
            .buckets
            .into_iter()
            .find(|b| b.bucket_name == bucket_name)
            .ok_or_else(|| Error::NotFound(format!("bucket {bucket_name}")))
    }

    fn api_url(&self, name: &str) -> String {
        format!(
            "{}/b2api/{API_VERSION}/{name}",
            self.auth.api_url.trim_end_matches('/')
        )
    }

    async fn call(&self, name: &str, method: Method, params: Value) -> Result<ApiResponse> {
        let url = self.api_url(name);
        send_with_retry(&self.retry, name, || {
            let request = match method {
                Method::Get => self.http.get(&url).query(&query_pairs(&params)),
                Method::Post => self.http.post(&url).json(&params),
            };
            request.header(AUTHORIZATION, &self.auth.authorization_token)
        })
        .await
    }
}

#[async_trait]
impl Gateway for B2Client {
    async fn make_request(
        &self,
        path: ApiPath,
        method: Method,
        params: Value,
    ) -> Result<ApiResponse> {
        self.call(path.name(), method, params).await
    }

    async fn upload_file(
        &self,
        target: &UploadTarget,
        file: FileUpload,
        body: RangedReader,
    ) -> Result<ApiResponse> {
        tracing::debug!(
            file_name = %file.file_name,
            content_length = file.content_length,
            "uploading file"
        );
        let request = self
            .http
            .post(&target.upload_url)
            .header(AUTHORIZATION, &target.authorization_token)
            .header("X-Bz-File-Name", encode_file_name(&file.file_name))
            .header(CONTENT_TYPE, &file.content_type)
            .header(CONTENT_LENGTH, body::content_length(&body))
            .header("X-Bz-Content-Sha1", DIGEST_AT_END)
            .body(body::hashed_body(body));
        send_once(request).await
    }

    async fn upload_part(
        &self,
        target: &UploadTarget,
        part_number: u32,
        body: RangedReader,
    ) -> Result<ApiResponse> {
        tracing::debug!(part_number, length = body.len(), "uploading part");
        let request = self
            .http
            .post(&target.upload_url)
            .header(AUTHORIZATION, &target.authorization_token)
            .header("X-Bz-Part-Number", part_number)
            .header(CONTENT_LENGTH, body::content_length(&body))
            .header("X-Bz-Content-Sha1", DIGEST_AT_END)
            .body(body::hashed_body(body));
        send_once(request).await
    }

    fn recommended_part_size(&self) -> u64 {
        self.auth.recommended_part_size.unwrap_or(DEFAULT_PART_SIZE)
    }
}

/// Percent-encode a file name for `X-Bz-File-Name`, keeping `/` separators
pub fn encode_file_name(file_name: &str) -> String {
    file_name
        .split('/')
        .map(|segment| url::form_urlencoded::byte_serialize(segment.as_bytes()).collect::<String>())
        .collect::<Vec<_>>()
        .join("/")
}

fn query_pairs(params: &Value) -> Vec<(String, String)> {
    params
        .as_object()
        .map(|object| {
            object
                .iter()
                .map(|(key, value)| {
                    let value = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (key.clone(), value)
                })
                .collect()
        })
        .unwrap_or_default()
}

fn is_retryable(status: u16) -> bool {
    matches!(status, 429 | 503)
}

/// Send a request built by `build`, retrying per `retry`
async fn send_with_retry<F>(retry: &RetryConfig, name: &str, build: F) -> Result<ApiResponse>
where
    F: Fn() -> RequestBuilder,
{
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let last = attempt >= max_attempts;
        match build().send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                if !is_retryable(status) || last {
                    return read_response(response).await;
                }
                let delay = retry_after(&response).unwrap_or_else(|| retry.backoff(attempt));
                tracing::debug!(%name, status, attempt, ?delay, "retrying after server backoff");
                tokio::time::sleep(delay).await;
            }
            Err(e) if !last => {
                let delay = retry.backoff(attempt);
                tracing::debug!(
                    %name,
                    error = %e,
                    attempt,
                    ?delay,
                    "retrying after transport error"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(Error::Network(format!("Request failed: {e}"))),
        }
        attempt += 1;
    }
}

async fn send_once(request: RequestBuilder) -> Result<ApiResponse> {
    let response = request
        .send()
        .await
        .map_err(|e| Error::Network(format!("Request failed: {e}")))?;
    read_response(response).await
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
        .map(Duration::from_secs)
}

async fn read_response(response: Response) -> Result<ApiResponse> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| Error::Network(format!("Failed to read response: {e}")))?;

    let body = if text.trim().is_empty() {
        Value::Null
    } else {
        match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(_) if status != StatusCode::OK => Value::String(text),
            Err(e) => return Err(Error::Json(e)),
        }
    };
    Ok(ApiResponse::new(status.as_u16(), body))
}
