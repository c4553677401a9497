//! Remote path parsing
//!
//! Remote paths have the form `alias/bucket[/file name]`. Everything after the
//! bucket is the file name (or listing prefix) verbatim, slashes included.

use crate::error::{Error, Result};

/// A parsed `alias/bucket[/name]` path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath {
    pub alias: String,
    pub bucket: String,
    /// File name or prefix; empty for the bucket root
    pub file_name: String,
}

impl RemotePath {
    pub fn new(
        alias: impl Into<String>,
        bucket: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            alias: alias.into(),
            bucket: bucket.into(),
            file_name: file_name.into(),
        }
    }

    /// Whether the path names a "directory" (bucket root or trailing slash)
    pub fn is_dir(&self) -> bool {
        self.file_name.is_empty() || self.file_name.ends_with('/')
    }

    /// Append `child` below this path
    pub fn join(&self, child: &str) -> Self {
        let file_name = if self.file_name.is_empty() || self.file_name.ends_with('/') {
            format!("{}{child}", self.file_name)
        } else {
            format!("{}/{child}", self.file_name)
        };
        Self {
            alias: self.alias.clone(),
            bucket: self.bucket.clone(),
            file_name,
        }
    }
}

impl std::fmt::Display for RemotePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.file_name.is_empty() {
            write!(f, "{}/{}", self.alias, self.bucket)
        } else {
            write!(f, "{}/{}/{}", self.alias, self.bucket, self.file_name)
        }
    }
}

/// Parse `alias/bucket[/name]`
pub fn parse_path(path: &str) -> Result<RemotePath> {
    if path.is_empty() {
        return Err(Error::InvalidPath("Path cannot be empty".into()));
    }

    let mut parts = path.splitn(3, '/');
    let alias = parts.next().unwrap_or_default();
    let bucket = parts.next().unwrap_or_default();
    let file_name = parts.next().unwrap_or_default();

    if !is_valid_alias_name(alias) {
        return Err(Error::InvalidPath(format!(
            "Invalid alias '{alias}' in '{path}'. Use format: alias/bucket[/name]"
        )));
    }
    if bucket.is_empty() {
        return Err(Error::InvalidPath(format!(
            "Path '{path}' is incomplete. Use format: alias/bucket[/name]"
        )));
    }
    if !is_valid_bucket_name(bucket) {
        return Err(Error::InvalidPath(format!("Invalid bucket name '{bucket}'")));
    }

    Ok(RemotePath::new(alias, bucket, file_name))
}

fn is_valid_alias_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Bucket names are 6-50 letters, digits and hyphens
fn is_valid_bucket_name(name: &str) -> bool {
    (6..=50).contains(&name.len())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
