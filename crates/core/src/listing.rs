//! Paginated listing
//!
//! Drives `b2_list_file_names` and `b2_list_file_versions` page by page,
//! feeding each page's `nextFileName` (and `nextFileId`) back verbatim as the
//! start marker of the next request until the server returns null.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::models::FileRecord;
use crate::traits::{ApiPath, Gateway, Method};

/// Largest page the service hands out
pub const MAX_PAGE_SIZE: u32 = 10_000;

/// Continuation marker returned by the server
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListingCursor {
    pub file_name: String,
    pub file_id: Option<String>,
}

impl ListingCursor {
    fn apply(&self, params: &mut Map<String, Value>) {
        params.insert("startFileName".into(), Value::from(self.file_name.as_str()));
        if let Some(file_id) = &self.file_id {
            params.insert("startFileId".into(), Value::from(file_id.as_str()));
        }
    }
}

/// One page of a listing response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListingPage {
    files: Vec<FileRecord>,
    #[serde(default)]
    next_file_name: Option<String>,
    #[serde(default)]
    next_file_id: Option<String>,
}

impl ListingPage {
    fn cursor(&self) -> Option<ListingCursor> {
        self.next_file_name.as_ref().map(|file_name| ListingCursor {
            file_name: file_name.clone(),
            file_id: self.next_file_id.clone(),
        })
    }
}

/// Options for listing file names
#[derive(Debug, Clone)]
pub struct ListOptions {
    /// Only return names starting with this prefix
    pub prefix: Option<String>,

    /// Entries requested per page
    pub page_size: u32,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            prefix: None,
            page_size: MAX_PAGE_SIZE,
        }
    }
}

/// Result of a version listing
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileVersions {
    /// Name of every version seen, in listing order (names repeat)
    pub file_names: Vec<String>,

    /// Versions keyed by file id
    pub file_versions: BTreeMap<String, Vec<FileRecord>>,
}

impl FileVersions {
    fn push(&mut self, record: FileRecord) {
        self.file_names.push(record.file_name.clone());
        self.file_versions
            .entry(record.file_id.clone())
            .or_default()
            .push(record);
    }

    /// Total number of versions
    pub fn len(&self) -> usize {
        self.file_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file_names.is_empty()
    }

    /// All versions, ordered by file id
    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.file_versions.values().flatten()
    }
}

/// Lists one bucket through a gateway
pub struct Lister<'a> {
    gateway: &'a dyn Gateway,
    bucket_id: &'a str,
}

impl<'a> Lister<'a> {
    pub fn new(gateway: &'a dyn Gateway, bucket_id: &'a str) -> Self {
        Self { gateway, bucket_id }
    }

    /// Every current file name, following the cursor to the end
    pub async fn file_names(&self, options: &ListOptions) -> Result<Vec<FileRecord>> {
        let params = self.listing_params(options);
        let mut files = Vec::new();
        self.paginate(ApiPath::ListFileNames, params, |page| files.extend(page))
            .await?;
        Ok(files)
    }

    /// Every version of every file under the prefix, following the cursor to
    /// the end
    pub async fn file_versions(&self, options: &ListOptions) -> Result<FileVersions> {
        let params = self.listing_params(options);
        let mut versions = FileVersions::default();
        self.paginate(ApiPath::ListFileVersions, params, |page| {
            page.into_iter().for_each(|record| versions.push(record));
        })
        .await?;
        Ok(versions)
    }

    /// The single version starting at `file_id`/`file_name`.
    ///
    /// Issues exactly one request; a continuation marker in the response is
    /// ignored.
    pub async fn file_version(&self, file_id: &str, file_name: &str) -> Result<FileVersions> {
        let mut params = self.base_params(1);
        ListingCursor {
            file_name: file_name.to_string(),
            file_id: Some(file_id.to_string()),
        }
        .apply(&mut params);

        let page = self.fetch_page(ApiPath::ListFileVersions, params).await?;
        let mut versions = FileVersions::default();
        page.files
            .into_iter()
            .for_each(|record| versions.push(record));
        Ok(versions)
    }

    /// First file named exactly `file_name`, from a single prefix-filtered page
    pub async fn first_named(&self, file_name: &str) -> Result<FileRecord> {
        let mut params = self.base_params(1);
        params.insert("prefix".into(), Value::from(file_name));
        params.insert("startFileName".into(), Value::from(file_name));

        let page = self.fetch_page(ApiPath::ListFileNames, params).await?;
        page.files
            .into_iter()
            .find(|record| record.file_name == file_name)
            .ok_or_else(|| Error::NotFound(format!("fileName - {file_name}")))
    }

    fn listing_params(&self, options: &ListOptions) -> Map<String, Value> {
        let mut params = self.base_params(options.page_size);
        if let Some(prefix) = &options.prefix {
            params.insert("prefix".into(), Value::from(prefix.as_str()));
        }
        params
    }

    fn base_params(&self, page_size: u32) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("bucketId".into(), Value::from(self.bucket_id));
        params.insert(
            "maxFileCount".into(),
            Value::from(page_size.clamp(1, MAX_PAGE_SIZE)),
        );
        params
    }

    async fn paginate<F>(
        &self,
        path: ApiPath,
        base: Map<String, Value>,
        mut on_page: F,
    ) -> Result<()>
    where
        F: FnMut(Vec<FileRecord>),
    {
        let mut cursor: Option<ListingCursor> = None;
        let mut seen = HashSet::new();
        let mut pages = 0usize;

        loop {
            let mut params = base.clone();
            if let Some(cursor) = &cursor {
                cursor.apply(&mut params);
            }

            let page = self.fetch_page(path, params).await?;
            pages += 1;
            let next = page.cursor();
            tracing::debug!(
                %path,
                page = pages,
                entries = page.files.len(),
                next = ?next.as_ref().map(|c| c.file_name.as_str()),
                "listing page received"
            );
            on_page(page.files);

            match next {
                None => return Ok(()),
                Some(next) => {
                    if !seen.insert(next.clone()) {
                        return Err(Error::InvalidResponse(format!(
                            "{path} returned continuation '{}' twice",
                            next.file_name
                        )));
                    }
                    cursor = Some(next);
                }
            }
        }
    }

    async fn fetch_page(&self, path: ApiPath, params: Map<String, Value>) -> Result<ListingPage> {
        self.gateway
            .make_request(path, Method::Post, Value::Object(params))
            .await?
            .parse()
    }
}
