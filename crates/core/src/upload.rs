//! Single-shot and large-file uploads
//!
//! Large files are split by [`part_ranges`], each part is uploaded by its own
//! task, and the per-part SHA-1s are put back into part-number order before
//! `b2_finish_large_file` is called. Tasks run on the tokio runtime; a
//! semaphore caps how many are in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{Error, Result};
use crate::models::{FileRecord, UploadTarget};
use crate::partition::{MultipartConfig, PartRange, part_ranges};
use crate::stream::{ContentSource, ProgressListener, RangedReader};
use crate::traits::{ApiPath, FileUpload, Gateway, Method};

/// Content type that lets the service pick one from the file name
pub const AUTO_CONTENT_TYPE: &str = "b2/x-auto";

/// Options shared by single-shot and large uploads
#[derive(Clone, Default)]
pub struct UploadOptions {
    /// MIME type; [`AUTO_CONTENT_TYPE`] when unset
    pub mime_type: Option<String>,

    /// Bytes to upload; the whole source when unset
    pub content_length: Option<u64>,

    /// Called with every chunk of bytes sent
    pub progress: Option<ProgressListener>,
}

impl UploadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn content_length(mut self, length: u64) -> Self {
        self.content_length = Some(length);
        self
    }

    pub fn progress(mut self, listener: ProgressListener) -> Self {
        self.progress = Some(listener);
        self
    }

    fn content_type(&self) -> String {
        self.mime_type
            .clone()
            .unwrap_or_else(|| AUTO_CONTENT_TYPE.to_string())
    }

    fn resolve_length(&self, source: &dyn ContentSource) -> Result<u64> {
        let available = source.len();
        match self.content_length {
            Some(length) if length > available => Err(Error::InvalidArgument(format!(
                "content length {length} exceeds the {available} bytes available"
            ))),
            Some(length) => Ok(length),
            None => Ok(available),
        }
    }
}

impl std::fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadOptions")
            .field("mime_type", &self.mime_type)
            .field("content_length", &self.content_length)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Options for a large upload
#[derive(Debug, Clone, Default)]
pub struct LargeUploadOptions {
    pub upload: UploadOptions,
    pub multipart: MultipartConfig,
}

/// Digest of one uploaded part
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartResult {
    pub part_number: u32,
    pub content_sha1: String,
}

/// Lifecycle of one part task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartState {
    Pending,
    AcquiringUploadTarget,
    Uploading,
    Completed,
    Failed,
}

/// Strip the leading slash the service does not allow
pub(crate) fn normalize_file_name(file_name: &str) -> Result<&str> {
    let name = file_name.strip_prefix('/').unwrap_or(file_name);
    if name.is_empty() {
        return Err(Error::InvalidArgument("file name cannot be empty".into()));
    }
    Ok(name)
}

/// Upload a file in one request
pub(crate) async fn upload_file(
    gateway: &dyn Gateway,
    bucket_id: &str,
    source: &dyn ContentSource,
    file_name: &str,
    options: &UploadOptions,
) -> Result<FileRecord> {
    let file_name = normalize_file_name(file_name)?;
    let content_length = options.resolve_length(source)?;

    let target: UploadTarget = gateway
        .make_request(
            ApiPath::GetUploadUrl,
            Method::Post,
            json!({ "bucketId": bucket_id }),
        )
        .await?
        .parse()?;

    let reader = RangedReader::open(source, 0, content_length)
        .await?
        .with_progress(options.progress.clone());
    let file = FileUpload {
        file_name: file_name.to_string(),
        content_type: options.content_type(),
        content_length,
    };

    let response = gateway.upload_file(&target, file, reader).await?;
    let record = FileRecord::from_json(response.into_json()?)?;
    tracing::info!(file_name = %record.file_name, file_id = %record.file_id, "file uploaded");
    Ok(record)
}

/// Upload a file as a large file: start, upload parts concurrently, finish
pub(crate) async fn upload_large_file(
    gateway: Arc<dyn Gateway>,
    bucket_id: &str,
    source: Arc<dyn ContentSource>,
    file_name: &str,
    options: &LargeUploadOptions,
) -> Result<FileRecord> {
    let file_name = normalize_file_name(file_name)?;
    let content_length = options.upload.resolve_length(source.as_ref())?;
    if content_length == 0 {
        return Err(Error::InvalidArgument(
            "large file upload needs content; use a single-shot upload for empty files".into(),
        ));
    }
    let part_size = options
        .multipart
        .calculate_part_size(content_length, gateway.recommended_part_size())?;
    let ranges = part_ranges(content_length, part_size)?;

    let started = gateway
        .make_request(
            ApiPath::StartLargeFile,
            Method::Post,
            json!({
                "bucketId": bucket_id,
                "fileName": file_name,
                "contentType": options.upload.content_type(),
            }),
        )
        .await?
        .into_json()?;
    let file_id = started
        .get("fileId")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidResponse("b2_start_large_file returned no fileId".into()))?
        .to_string();
    tracing::debug!(%file_name, %file_id, parts = ranges.len(), part_size, "large file started");

    let coordinator = UploadCoordinator {
        gateway: Arc::clone(&gateway),
        source,
        file_id: file_id.clone(),
        num_threads: options.multipart.concurrency,
        progress: options.upload.progress.clone(),
    };

    let parts = match coordinator.upload_parts(&ranges).await {
        Ok(parts) => parts,
        Err(e) => {
            cancel_large_file(gateway.as_ref(), &file_id).await;
            return Err(e);
        }
    };

    finish_large_file(gateway.as_ref(), &file_id, &parts).await
}

async fn finish_large_file(
    gateway: &dyn Gateway,
    file_id: &str,
    parts: &[PartResult],
) -> Result<FileRecord> {
    let sha1s: Vec<&str> = parts.iter().map(|p| p.content_sha1.as_str()).collect();
    let response = gateway
        .make_request(
            ApiPath::FinishLargeFile,
            Method::Post,
            json!({ "fileId": file_id, "partSha1Array": sha1s }),
        )
        .await?;
    let record = FileRecord::from_json(response.into_json()?)?;
    tracing::info!(
        file_name = %record.file_name,
        %file_id,
        parts = parts.len(),
        "large file finished"
    );
    Ok(record)
}

async fn cancel_large_file(gateway: &dyn Gateway, file_id: &str) {
    let result = gateway
        .make_request(
            ApiPath::CancelLargeFile,
            Method::Post,
            json!({ "fileId": file_id }),
        )
        .await
        .and_then(|response| response.into_json());
    if let Err(e) = result {
        tracing::warn!(%file_id, error = %e, "failed to cancel large file");
    }
}

/// Uploads the parts of one started large file
pub struct UploadCoordinator {
    pub gateway: Arc<dyn Gateway>,
    pub source: Arc<dyn ContentSource>,
    pub file_id: String,
    pub num_threads: usize,
    pub progress: Option<ProgressListener>,
}

impl UploadCoordinator {
    /// Upload every range and return the digests in the order of `ranges`.
    ///
    /// Parts start in partition order, each once a permit is free, so at most
    /// `num_threads` part tasks exist at a time. Returns the first failure
    /// observed. Parts that have not started when a failure is seen are
    /// skipped; parts already in flight finish in the background and their
    /// results are discarded.
    pub async fn upload_parts(&self, ranges: &[PartRange]) -> Result<Vec<PartResult>> {
        let semaphore = Arc::new(Semaphore::new(self.num_threads.max(1)));
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut tasks = FuturesUnordered::new();

        for (slot, range) in ranges.iter().copied().enumerate() {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| Error::TaskFailed(e.to_string()))?;
            if cancelled.load(Ordering::Acquire) {
                tracing::debug!(
                    part = range.part_number,
                    "not starting remaining parts after failure"
                );
                break;
            }
            let task = PartTask {
                gateway: Arc::clone(&self.gateway),
                source: Arc::clone(&self.source),
                file_id: self.file_id.clone(),
                range,
                progress: self.progress.clone(),
            };
            tasks.push(tokio::spawn(run_slot(
                task,
                slot,
                permit,
                Arc::clone(&cancelled),
            )));
        }

        let mut slots: Vec<Option<PartResult>> = vec![None; ranges.len()];
        while let Some(joined) = tasks.next().await {
            let outcome = joined
                .map_err(|e| Error::TaskFailed(e.to_string()))
                .and_then(|outcome| outcome);
            match outcome {
                Ok((slot, result)) => slots[slot] = Some(result),
                Err(e) => {
                    cancelled.store(true, Ordering::Release);
                    return Err(e);
                }
            }
        }

        slots
            .into_iter()
            .zip(ranges)
            .map(|(result, range)| {
                result.ok_or_else(|| {
                    Error::TaskFailed(format!("part {} produced no result", range.part_number))
                })
            })
            .collect()
    }
}

/// Run one part while holding its permit; a failure is flagged before the
/// permit is released so the spawning loop sees it
async fn run_slot(
    task: PartTask,
    slot: usize,
    _permit: OwnedSemaphorePermit,
    cancelled: Arc<AtomicBool>,
) -> Result<(usize, PartResult)> {
    match task.run().await {
        Ok(result) => Ok((slot, result)),
        Err(e) => {
            cancelled.store(true, Ordering::Release);
            Err(e)
        }
    }
}

struct PartTask {
    gateway: Arc<dyn Gateway>,
    source: Arc<dyn ContentSource>,
    file_id: String,
    range: PartRange,
    progress: Option<ProgressListener>,
}

impl PartTask {
    async fn run(self) -> Result<PartResult> {
        let part = self.range.part_number;
        let mut state = PartState::Pending;
        let result = self.attempt(&mut state).await;
        match &result {
            Ok(_) => transition(part, &mut state, PartState::Completed),
            Err(e) => {
                tracing::warn!(part, during = ?state, error = %e, "part upload failed");
                transition(part, &mut state, PartState::Failed);
            }
        }
        result
    }

    async fn attempt(&self, state: &mut PartState) -> Result<PartResult> {
        let part = self.range.part_number;

        transition(part, state, PartState::AcquiringUploadTarget);
        let target: UploadTarget = self
            .gateway
            .make_request(
                ApiPath::GetUploadPartUrl,
                Method::Post,
                json!({ "fileId": self.file_id }),
            )
            .await?
            .parse()?;

        let reader = RangedReader::open(self.source.as_ref(), self.range.offset, self.range.length)
            .await?
            .with_progress(self.progress.clone());

        transition(part, state, PartState::Uploading);
        let response = self
            .gateway
            .upload_part(&target, part, reader)
            .await?
            .into_json()?;

        let content_sha1 = response
            .get("contentSha1")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::InvalidResponse(format!("part {part} response has no contentSha1"))
            })?
            .to_string();

        Ok(PartResult {
            part_number: part,
            content_sha1,
        })
    }
}

fn transition(part: u32, state: &mut PartState, next: PartState) {
    tracing::debug!(part, from = ?*state, to = ?next, "part state");
    *state = next;
}
