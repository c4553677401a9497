//! In-memory gateway used by unit tests

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::models::UploadTarget;
use crate::partition::DEFAULT_PART_SIZE;
use crate::stream::RangedReader;
use crate::traits::{ApiPath, ApiResponse, FileUpload, Gateway, Method};

/// Records every call and answers like a well-behaved service
pub struct FakeGateway {
    calls: Mutex<Vec<(ApiPath, Value)>>,
    queued: Mutex<HashMap<ApiPath, VecDeque<ApiResponse>>>,
    completed: Mutex<Vec<u32>>,
    part_lengths: Mutex<Vec<(u32, u64)>>,
    part_targets: Mutex<Vec<String>>,
    file_uploads: Mutex<Vec<FileUpload>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    target_counter: AtomicUsize,
    reverse_parts: Option<u32>,
    fail_part: Option<u32>,
    fail_part_url: bool,
    part_size: u64,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            queued: Mutex::new(HashMap::new()),
            completed: Mutex::new(Vec::new()),
            part_lengths: Mutex::new(Vec::new()),
            part_targets: Mutex::new(Vec::new()),
            file_uploads: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            target_counter: AtomicUsize::new(0),
            reverse_parts: None,
            fail_part: None,
            fail_part_url: false,
            part_size: DEFAULT_PART_SIZE,
        }
    }

    /// Part `n` finishes first, part 1 last
    pub fn reverse_completion(mut self, parts: u32) -> Self {
        self.reverse_parts = Some(parts);
        self
    }

    /// Uploading `part` answers 500
    pub fn fail_part(mut self, part: u32) -> Self {
        self.fail_part = Some(part);
        self
    }

    /// Every `b2_get_upload_part_url` answers 503
    pub fn fail_part_url(mut self) -> Self {
        self.fail_part_url = true;
        self
    }

    pub fn recommended_part_size(mut self, size: u64) -> Self {
        self.part_size = size;
        self
    }

    /// Answer the next call to `path` with `response`
    pub fn queue(&self, path: ApiPath, response: ApiResponse) {
        self.queued.lock().entry(path).or_default().push_back(response);
    }

    pub fn calls(&self) -> Vec<(ApiPath, Value)> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, path: ApiPath) -> Vec<Value> {
        self.calls
            .lock()
            .iter()
            .filter(|(p, _)| *p == path)
            .map(|(_, params)| params.clone())
            .collect()
    }

    /// Part numbers in completion order
    pub fn completed_parts(&self) -> Vec<u32> {
        self.completed.lock().clone()
    }

    /// (part number, bytes) sorted by part number
    pub fn part_lengths(&self) -> Vec<(u32, u64)> {
        let mut lengths = self.part_lengths.lock().clone();
        lengths.sort_unstable();
        lengths
    }

    pub fn distinct_part_targets(&self) -> usize {
        self.part_targets.lock().iter().collect::<HashSet<_>>().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn file_uploads(&self) -> Vec<FileUpload> {
        self.file_uploads.lock().clone()
    }
}

fn error(status: u16, code: &str) -> ApiResponse {
    ApiResponse::new(
        status,
        json!({ "status": status, "code": code, "message": format!("{code} from fake") }),
    )
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn make_request(
        &self,
        path: ApiPath,
        _method: Method,
        params: Value,
    ) -> Result<ApiResponse> {
        self.calls.lock().push((path, params.clone()));
        if let Some(response) = self
            .queued
            .lock()
            .get_mut(&path)
            .and_then(VecDeque::pop_front)
        {
            return Ok(response);
        }

        let response = match path {
            ApiPath::StartLargeFile => ApiResponse::ok(json!({
                "fileId": "large-1",
                "fileName": params["fileName"],
                "action": "start"
            })),
            ApiPath::GetUploadPartUrl if self.fail_part_url => error(503, "service_unavailable"),
            ApiPath::GetUploadPartUrl => {
                let n = self.target_counter.fetch_add(1, Ordering::SeqCst);
                ApiResponse::ok(json!({
                    "fileId": params["fileId"],
                    "uploadUrl": format!("https://pod-000.example.com/part/{n}"),
                    "authorizationToken": format!("part-token-{n}")
                }))
            }
            ApiPath::GetUploadUrl => ApiResponse::ok(json!({
                "bucketId": params["bucketId"],
                "uploadUrl": "https://pod-000.example.com/file",
                "authorizationToken": "file-token"
            })),
            ApiPath::FinishLargeFile => ApiResponse::ok(json!({
                "fileId": params["fileId"],
                "fileName": "big.bin",
                "action": "upload",
                "contentLength": 0,
                "contentSha1": "none"
            })),
            ApiPath::CancelLargeFile => ApiResponse::ok(json!({ "fileId": params["fileId"] })),
            ApiPath::ListFileNames | ApiPath::ListFileVersions => {
                ApiResponse::ok(json!({ "files": [], "nextFileName": null }))
            }
            ApiPath::GetFileInfo => error(404, "not_found"),
        };
        Ok(response)
    }

    async fn upload_file(
        &self,
        _target: &UploadTarget,
        file: FileUpload,
        body: RangedReader,
    ) -> Result<ApiResponse> {
        let digest = body.digest_to_end().await.map_err(Error::Io)?;
        let response = ApiResponse::ok(json!({
            "fileId": "small-1",
            "fileName": file.file_name,
            "contentLength": file.content_length,
            "contentType": file.content_type,
            "contentSha1": digest,
            "action": "upload"
        }));
        self.file_uploads.lock().push(file);
        Ok(response)
    }

    async fn upload_part(
        &self,
        target: &UploadTarget,
        part_number: u32,
        body: RangedReader,
    ) -> Result<ApiResponse> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.part_targets.lock().push(target.upload_url.clone());

        if let Some(parts) = self.reverse_parts {
            let delay = 15 * u64::from(parts.saturating_sub(part_number) + 1);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        } else {
            tokio::task::yield_now().await;
        }

        let length = body.len();
        let response = if self.fail_part == Some(part_number) {
            error(500, "internal_error")
        } else {
            let digest = body.digest_to_end().await.map_err(Error::Io)?;
            self.completed.lock().push(part_number);
            self.part_lengths.lock().push((part_number, length));
            ApiResponse::ok(json!({
                "partNumber": part_number,
                "contentLength": length,
                "contentSha1": digest
            }))
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(response)
    }

    fn recommended_part_size(&self) -> u64 {
        self.part_size
    }
}
