//! stat command - Show file metadata
//!
//! Looks a file up by name (latest version) or by file id. The lookup always
//! goes to the service.

use std::collections::BTreeMap;

use clap::Args;
use serde::Serialize;

use bz_core::{Error, FileRecord, parse_path};

use super::{open_bucket, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Show file metadata
#[derive(Args, Debug)]
pub struct StatArgs {
    /// File path (alias/bucket/name), or alias/bucket with --id
    pub path: String,

    /// Look up this file id instead of a name
    #[arg(long)]
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatOutput {
    name: String,
    file_id: String,
    size_bytes: u64,
    size_human: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    uploaded: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_sha1: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    file_info: BTreeMap<String, String>,
}

impl From<FileRecord> for StatOutput {
    fn from(record: FileRecord) -> Self {
        Self {
            size_human: record.size_human(),
            name: record.file_name,
            file_id: record.file_id,
            size_bytes: record.size,
            uploaded: record.upload_timestamp.map(|ts| ts.to_string()),
            content_type: record.content_type,
            content_sha1: record.content_sha1,
            file_info: record.file_info,
        }
    }
}

/// Execute the stat command
pub async fn execute(args: StatArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let path = match parse_path(&args.path) {
        Ok(path) => path,
        Err(e) => return report(&formatter, &e),
    };
    let file_name = (!path.file_name.is_empty()).then_some(path.file_name.as_str());
    if file_name.is_some() == args.id.is_some() {
        let e = Error::InvalidArgument(
            "give either alias/bucket/name or alias/bucket with --id".into(),
        );
        return report(&formatter, &e);
    }

    let files = match open_bucket(&path).await {
        Ok(files) => files,
        Err(e) => return report(&formatter, &e),
    };

    match files.get_by(file_name, args.id.as_deref()).await {
        Ok(record) => {
            print_record(StatOutput::from(record), &formatter);
            ExitCode::Success
        }
        Err(e) => report(&formatter, &e),
    }
}

fn print_record(output: StatOutput, formatter: &Formatter) {
    if formatter.is_json() {
        formatter.json(&output);
        return;
    }

    formatter.println(&format!("Name      : {}", output.name));
    formatter.println(&format!("File ID   : {}", output.file_id));
    formatter.println(&format!(
        "Size      : {} ({} bytes)",
        output.size_human, output.size_bytes
    ));
    if let Some(uploaded) = &output.uploaded {
        formatter.println(&format!("Uploaded  : {uploaded}"));
    }
    if let Some(content_type) = &output.content_type {
        formatter.println(&format!("Type      : {content_type}"));
    }
    if let Some(sha1) = &output.content_sha1 {
        formatter.println(&format!("SHA-1     : {sha1}"));
    }
    for (key, value) in &output.file_info {
        formatter.println(&format!("{:<10}: {value}", formatter.dim(key)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_output_from_record() {
        let mut record = FileRecord::new("a/b.txt", "id-1", 2048);
        record.content_type = Some("text/plain".into());
        record.upload_timestamp = jiff::Timestamp::from_millisecond(0).ok();

        let output = StatOutput::from(record);
        assert_eq!(output.name, "a/b.txt");
        assert_eq!(output.size_human, "2 KiB");
        assert_eq!(output.uploaded.as_deref(), Some("1970-01-01T00:00:00Z"));

        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["file_id"], "id-1");
        assert!(json.get("content_sha1").is_none());
    }
}
