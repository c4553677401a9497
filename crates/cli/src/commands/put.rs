//! put command - Upload a local file
//!
//! Files at or above the large-file threshold (or with `--large`) are split
//! into parts uploaded concurrently; smaller files go up in one request.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use serde::Serialize;

use bz_core::config::Defaults;
use bz_core::{
    ContentSource, Error, FileRecord, FileSource, LargeUploadOptions, MultipartConfig,
    RemotePath, UploadOptions, parse_path,
};

use super::{open_bucket, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, ProgressBar};

/// Upload a local file
#[derive(Args, Debug)]
pub struct PutArgs {
    /// Local file to upload
    pub source: PathBuf,

    /// Destination (alias/bucket[/name]); a trailing slash keeps the local file name
    pub target: String,

    /// Always upload as a large file
    #[arg(long)]
    pub large: bool,

    /// Part size in bytes for large uploads
    #[arg(long)]
    pub part_size: Option<u64>,

    /// Parts uploaded at once
    #[arg(long)]
    pub threads: Option<usize>,

    /// Content type; guessed from the file name when omitted
    #[arg(long)]
    pub content_type: Option<String>,

    /// Size in bytes from which a large upload is used
    #[arg(long)]
    pub large_threshold: Option<u64>,
}

#[derive(Debug, Serialize)]
struct PutOutput {
    status: &'static str,
    source: String,
    target: String,
    large: bool,
    file: FileRecord,
}

/// Execute the put command
pub async fn execute(args: PutArgs, output_config: OutputConfig, defaults: &Defaults) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let target = match parse_path(&args.target).and_then(|path| target_path(path, &args.source)) {
        Ok(target) => target,
        Err(e) => return report(&formatter, &e),
    };
    let source = match FileSource::open(&args.source).await {
        Ok(source) => source,
        Err(e) => return report(&formatter, &e),
    };
    let files = match open_bucket(&target).await {
        Ok(files) => files,
        Err(e) => return report(&formatter, &e),
    };

    let size = source.len();
    let large = args.large || size >= args.large_threshold.unwrap_or(defaults.large_threshold);
    let progress = ProgressBar::new(formatter.config(), size);
    progress.set_message(&target.file_name);

    let mut upload = UploadOptions::new();
    upload.mime_type = args.content_type.clone().or_else(|| guess_content_type(&args.source));
    upload.progress = progress.listener();

    let transfer = async {
        if large {
            let options = LargeUploadOptions {
                upload,
                multipart: multipart_config(&args, defaults),
            };
            let source: Arc<dyn ContentSource> = Arc::new(source);
            files.upload_large(source, &target.file_name, &options).await
        } else {
            files.upload(&source, &target.file_name, &upload).await
        }
    };

    let result = tokio::select! {
        result = transfer => result,
        _ = tokio::signal::ctrl_c() => {
            progress.finish_and_clear();
            formatter.warning("Upload interrupted");
            return ExitCode::Interrupted;
        }
    };
    progress.finish_and_clear();

    match result {
        Ok(record) => {
            if formatter.is_json() {
                formatter.json(&PutOutput {
                    status: "success",
                    source: args.source.display().to_string(),
                    target: target.to_string(),
                    large,
                    file: record,
                });
            } else {
                formatter.success(&format!(
                    "{} -> {} ({}, {})",
                    args.source.display(),
                    target,
                    record.size_human(),
                    record.file_id
                ));
            }
            ExitCode::Success
        }
        Err(e) => report(&formatter, &e),
    }
}

/// Resolve the remote file name, appending the local name for directory targets
fn target_path(path: RemotePath, source: &Path) -> bz_core::Result<RemotePath> {
    if !path.is_dir() {
        return Ok(path);
    }
    let name = source
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            Error::InvalidPath(format!("cannot derive a file name from {}", source.display()))
        })?;
    Ok(path.join(name))
}

fn guess_content_type(source: &Path) -> Option<String> {
    mime_guess::from_path(source)
        .first()
        .map(|mime| mime.essence_str().to_string())
}

fn multipart_config(args: &PutArgs, defaults: &Defaults) -> MultipartConfig {
    let mut config = MultipartConfig::new().concurrency(args.threads.unwrap_or(defaults.threads));
    if let Some(size) = args.part_size.or(defaults.part_size) {
        config = config.part_size(size);
    }
    config
}
