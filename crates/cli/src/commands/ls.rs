//! ls command - List files in a bucket
//!
//! Lists current file names under an optional prefix, or every version with
//! `--versions`.

use clap::Args;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use serde::Serialize;

use bz_core::{FileAction, FileRecord, FileVersions, ListOptions, parse_path};

use super::{format_timestamp, open_bucket, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// List files
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Remote path (alias/bucket[/prefix])
    pub path: String,

    /// Show every version, hide markers and unfinished large files included
    #[arg(long)]
    pub versions: bool,

    /// Summarize output (show totals)
    #[arg(long)]
    pub summarize: bool,
}

#[derive(Debug, Serialize)]
struct LsOutput {
    files: Vec<FileRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<Summary>,
}

#[derive(Debug, Serialize)]
struct VersionsOutput {
    #[serde(flatten)]
    versions: FileVersions,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<Summary>,
}

#[derive(Debug, Serialize)]
struct Summary {
    total_files: usize,
    total_size_bytes: u64,
    total_size_human: String,
}

impl Summary {
    fn of<'a>(records: impl Iterator<Item = &'a FileRecord>) -> Self {
        let (total_files, total_size_bytes) = records
            .fold((0, 0u64), |(count, size), record| (count + 1, size + record.size));
        Self {
            total_files,
            total_size_bytes,
            total_size_human: humansize::format_size(total_size_bytes, humansize::BINARY),
        }
    }
}

/// Execute the ls command
pub async fn execute(args: LsArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let path = match parse_path(&args.path) {
        Ok(path) => path,
        Err(e) => return report(&formatter, &e),
    };
    let files = match open_bucket(&path).await {
        Ok(files) => files,
        Err(e) => return report(&formatter, &e),
    };
    let prefix = (!path.file_name.is_empty()).then(|| path.file_name.clone());

    let options = ListOptions {
        prefix,
        ..Default::default()
    };
    if args.versions {
        match files.list_versions_with(&options).await {
            Ok(versions) => print_versions(versions, &args, &formatter),
            Err(e) => return report(&formatter, &e),
        }
    } else {
        match files.list_all_with(&options).await {
            Ok(records) => print_files(records, &args, &formatter),
            Err(e) => return report(&formatter, &e),
        }
    }

    ExitCode::Success
}

fn print_files(records: Vec<FileRecord>, args: &LsArgs, formatter: &Formatter) {
    let summary = args.summarize.then(|| Summary::of(records.iter()));

    if formatter.is_json() {
        formatter.json(&LsOutput {
            files: records,
            summary,
        });
        return;
    }

    for record in &records {
        formatter.println(&format!(
            "[{}] {:>10} {}",
            format_timestamp(record.upload_timestamp),
            record.size_human(),
            record.file_name
        ));
    }
    if let Some(summary) = summary {
        formatter.println(&format!(
            "\nTotal: {} files, {}",
            summary.total_files, summary.total_size_human
        ));
    }
}

fn print_versions(versions: FileVersions, args: &LsArgs, formatter: &Formatter) {
    let summary = args.summarize.then(|| Summary::of(versions.records()));

    if formatter.is_json() {
        formatter.json(&VersionsOutput { versions, summary });
        return;
    }

    formatter.println(&versions_table(&versions, formatter.colors_enabled()).to_string());
    if let Some(summary) = summary {
        formatter.println(&format!(
            "\nTotal: {} versions, {}",
            summary.total_files, summary.total_size_human
        ));
    }
}

fn versions_table(versions: &FileVersions, colors: bool) -> Table {
    let mut records: Vec<&FileRecord> = versions.records().collect();
    records.sort_by(|a, b| {
        a.file_name
            .cmp(&b.file_name)
            .then(b.upload_timestamp.cmp(&a.upload_timestamp))
    });

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Uploaded", "Size", "Action", "Name", "File ID"]);
    if !colors {
        table.force_no_tty();
    }

    for record in records {
        table.add_row(vec![
            Cell::new(format_timestamp(record.upload_timestamp)),
            Cell::new(record.size_human()).set_alignment(CellAlignment::Right),
            Cell::new(action_label(record.action)),
            Cell::new(&record.file_name),
            Cell::new(&record.file_id),
        ]);
    }
    table
}

fn action_label(action: Option<FileAction>) -> &'static str {
    match action {
        Some(FileAction::Upload) | None => "upload",
        Some(FileAction::Start) => "started",
        Some(FileAction::Hide) => "hide",
        Some(FileAction::Folder) => "folder",
        Some(FileAction::Other) => "other",
    }
}
