//! Bucket-scoped file operations
//!
//! [`FileList`] is the entry point callers use: it lists, looks up and
//! uploads files in one bucket through a [`Gateway`], and keeps the
//! [`FileIndex`] of the most recent full listing.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::json;

use crate::error::{Error, Result};
use crate::index::FileIndex;
use crate::listing::{FileVersions, ListOptions, Lister};
use crate::models::{Bucket, FileRecord};
use crate::stream::ContentSource;
use crate::traits::{ApiPath, Gateway, Method};
use crate::upload::{self, LargeUploadOptions, UploadOptions};

/// How [`FileList::get`] identifies a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    /// Latest version with exactly this name
    Name(&'a str),
    /// One specific version
    Id(&'a str),
}

/// Files of one bucket
pub struct FileList {
    gateway: Arc<dyn Gateway>,
    bucket: Bucket,
    index: RwLock<Arc<FileIndex>>,
}

impl FileList {
    pub fn new(gateway: Arc<dyn Gateway>, bucket: Bucket) -> Self {
        Self {
            gateway,
            bucket,
            index: RwLock::new(Arc::new(FileIndex::empty())),
        }
    }

    pub fn bucket(&self) -> &Bucket {
        &self.bucket
    }

    /// Snapshot published by the last full listing
    pub fn index(&self) -> Arc<FileIndex> {
        Arc::clone(&self.index.read())
    }

    fn lister(&self) -> Lister<'_> {
        Lister::new(self.gateway.as_ref(), &self.bucket.bucket_id)
    }

    /// List every file name in the bucket and replace the index
    pub async fn list_all(&self) -> Result<Vec<FileRecord>> {
        self.list_all_with(&ListOptions::default()).await
    }

    /// List file names with options.
    ///
    /// Only an unfiltered listing replaces the index; a failed listing
    /// leaves the previous snapshot in place.
    pub async fn list_all_with(&self, options: &ListOptions) -> Result<Vec<FileRecord>> {
        let files = self.lister().file_names(options).await?;

        if options.prefix.as_deref().is_none_or(str::is_empty) {
            let mut builder = FileIndex::builder();
            for record in &files {
                builder.insert(record.clone());
            }
            let index = builder.build();
            tracing::debug!(
                bucket = %self.bucket.bucket_name,
                files = index.len(),
                "file index published"
            );
            *self.index.write() = Arc::new(index);
        }

        Ok(files)
    }

    /// List file versions.
    ///
    /// With both `file_id` and `file_name`, returns the single version
    /// starting there. With neither, returns every version in the bucket.
    pub async fn list_versions(
        &self,
        file_id: Option<&str>,
        file_name: Option<&str>,
    ) -> Result<FileVersions> {
        match (file_id, file_name) {
            (Some(file_id), Some(file_name)) => {
                self.lister().file_version(file_id, file_name).await
            }
            (None, None) => self.list_versions_with(&ListOptions::default()).await,
            _ => Err(Error::InvalidArgument(
                "file_id and file_name must be given together".into(),
            )),
        }
    }

    /// Every version under `options.prefix`, following the cursor to the end
    pub async fn list_versions_with(&self, options: &ListOptions) -> Result<FileVersions> {
        self.lister().file_versions(options).await
    }

    /// Look a file up on the service. Never consults the index.
    pub async fn get(&self, lookup: Lookup<'_>) -> Result<FileRecord> {
        match lookup {
            Lookup::Name(file_name) => self.lister().first_named(file_name).await,
            Lookup::Id(file_id) => {
                let response = self
                    .gateway
                    .make_request(
                        ApiPath::GetFileInfo,
                        Method::Post,
                        json!({ "fileId": file_id }),
                    )
                    .await?;
                if response.status_code == 404 {
                    return Err(Error::NotFound(format!("fileId - {file_id}")));
                }
                FileRecord::from_json(response.into_json()?)
            }
        }
    }

    /// Like [`FileList::get`], taking exactly one of name or id
    pub async fn get_by(
        &self,
        file_name: Option<&str>,
        file_id: Option<&str>,
    ) -> Result<FileRecord> {
        let lookup = match (file_name, file_id) {
            (Some(name), None) => Lookup::Name(name),
            (None, Some(id)) => Lookup::Id(id),
            (None, None) => {
                return Err(Error::InvalidArgument(
                    "either file_name or file_id is required".into(),
                ));
            }
            (Some(_), Some(_)) => {
                return Err(Error::InvalidArgument(
                    "file_name and file_id are mutually exclusive".into(),
                ));
            }
        };
        self.get(lookup).await
    }

    /// Upload in one request
    pub async fn upload(
        &self,
        source: &dyn ContentSource,
        file_name: &str,
        options: &UploadOptions,
    ) -> Result<FileRecord> {
        let record = upload::upload_file(
            self.gateway.as_ref(),
            &self.bucket.bucket_id,
            source,
            file_name,
            options,
        )
        .await?;
        self.refresh_after_upload().await;
        Ok(record)
    }

    /// Upload as a large file with concurrent parts
    pub async fn upload_large(
        &self,
        source: Arc<dyn ContentSource>,
        file_name: &str,
        options: &LargeUploadOptions,
    ) -> Result<FileRecord> {
        let record = upload::upload_large_file(
            Arc::clone(&self.gateway),
            &self.bucket.bucket_id,
            source,
            file_name,
            options,
        )
        .await?;
        self.refresh_after_upload().await;
        Ok(record)
    }

    async fn refresh_after_upload(&self) {
        if !self.index().is_populated() {
            return;
        }
        if let Err(e) = self.list_all().await {
            tracing::warn!(
                bucket = %self.bucket.bucket_name,
                error = %e,
                "failed to refresh file index after upload"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::BytesSource;
    use crate::testing::FakeGateway;
    use crate::traits::ApiResponse;
    use serde_json::Value;

    fn file(name: &str, id: &str) -> Value {
        json!({ "fileName": name, "fileId": id, "contentLength": 3, "action": "upload" })
    }

    fn page(files: Vec<Value>, next: Option<&str>) -> ApiResponse {
        ApiResponse::ok(json!({ "files": files, "nextFileName": next }))
    }

    fn file_list(gateway: &Arc<FakeGateway>) -> FileList {
        FileList::new(gateway.clone(), Bucket::new("bucket-id", "photos"))
    }

    #[tokio::test]
    async fn test_get_by_requires_exactly_one_key() {
        let gateway = Arc::new(FakeGateway::new());
        let files = file_list(&gateway);

        let err = files.get_by(None, None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        let err = files.get_by(Some("a"), Some("id")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_get_by_name_not_found_on_empty_page() {
        let gateway = Arc::new(FakeGateway::new());
        let files = file_list(&gateway);

        let err = files.get(Lookup::Name("missing.txt")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let calls = gateway.calls_to(ApiPath::ListFileNames);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0]["prefix"], "missing.txt");
        assert_eq!(calls[0]["maxFileCount"], 1);
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let gateway = Arc::new(FakeGateway::new());
        gateway.queue(ApiPath::GetFileInfo, ApiResponse::ok(file("a.txt", "id-1")));
        let files = file_list(&gateway);

        let record = files.get_by(None, Some("id-1")).await.unwrap();
        assert_eq!(record.file_name, "a.txt");
        assert_eq!(gateway.calls_to(ApiPath::GetFileInfo)[0]["fileId"], "id-1");

        let err = files.get(Lookup::Id("id-2")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_get_does_not_touch_index() {
        let gateway = Arc::new(FakeGateway::new());
        gateway.queue(ApiPath::ListFileNames, page(vec![file("a.txt", "id-1")], None));
        let files = file_list(&gateway);

        files.get(Lookup::Name("a.txt")).await.unwrap();
        assert!(!files.index().is_populated());
    }

    #[tokio::test]
    async fn test_list_all_follows_three_pages() {
        let gateway = Arc::new(FakeGateway::new());
        let first = page(vec![file("a", "1"), file("b", "2")], Some("A"));
        gateway.queue(ApiPath::ListFileNames, first);
        gateway.queue(ApiPath::ListFileNames, page(vec![file("c", "3")], Some("B")));
        gateway.queue(ApiPath::ListFileNames, page(vec![file("d", "4")], None));
        let files = file_list(&gateway);

        let listed = files.list_all().await.unwrap();
        assert_eq!(listed.len(), 4);

        let calls = gateway.calls_to(ApiPath::ListFileNames);
        assert_eq!(calls.len(), 3);
        assert!(calls[0].get("startFileName").is_none());
        assert_eq!(calls[1]["startFileName"], "A");
        assert_eq!(calls[2]["startFileName"], "B");

        let index = files.index();
        assert!(index.is_populated());
        assert_eq!(index.names(), vec!["a", "b", "c", "d"]);
        assert_eq!(index.by_id("3").unwrap().file_name, "c");
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let gateway = Arc::new(FakeGateway::new());
        gateway.queue(ApiPath::ListFileNames, page(vec![file("old", "1")], None));
        let files = file_list(&gateway);
        files.list_all().await.unwrap();
        let before = files.index();

        gateway.queue(ApiPath::ListFileNames, page(vec![file("new", "2")], Some("n")));
        gateway.queue(
            ApiPath::ListFileNames,
            ApiResponse::new(503, json!({ "status": 503, "code": "service_unavailable" })),
        );
        assert!(files.list_all().await.is_err());

        let after = files.index();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.names(), vec!["old"]);
    }

    #[tokio::test]
    async fn test_refresh_swaps_whole_snapshot() {
        let gateway = Arc::new(FakeGateway::new());
        gateway.queue(ApiPath::ListFileNames, page(vec![file("old", "1")], None));
        let files = file_list(&gateway);
        files.list_all().await.unwrap();
        let held = files.index();

        gateway.queue(ApiPath::ListFileNames, page(vec![file("x", "2")], Some("x")));
        gateway.queue(ApiPath::ListFileNames, page(vec![file("y", "3")], None));
        files.list_all().await.unwrap();

        assert_eq!(held.names(), vec!["old"]);
        assert_eq!(files.index().names(), vec!["x", "y"]);
        assert!(files.index().by_name("old").is_none());
    }

    #[tokio::test]
    async fn test_prefixed_listing_keeps_index() {
        let gateway = Arc::new(FakeGateway::new());
        gateway.queue(ApiPath::ListFileNames, page(vec![file("a/1", "1")], None));
        let files = file_list(&gateway);

        let options = ListOptions {
            prefix: Some("a/".into()),
            ..Default::default()
        };
        assert_eq!(files.list_all_with(&options).await.unwrap().len(), 1);
        assert!(!files.index().is_populated());
    }

    #[tokio::test]
    async fn test_list_versions_needs_both_or_neither() {
        let gateway = Arc::new(FakeGateway::new());
        let files = file_list(&gateway);

        let err = files.list_versions(Some("id-1"), None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        let err = files.list_versions(None, Some("a.txt")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(gateway.calls().is_empty());

        files.list_versions(None, None).await.unwrap();
        files.list_versions(Some("id-1"), Some("a.txt")).await.unwrap();
        let calls = gateway.calls_to(ApiPath::ListFileVersions);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1]["startFileId"], "id-1");
        assert_eq!(calls[1]["maxFileCount"], 1);
    }

    #[tokio::test]
    async fn test_upload_refreshes_populated_index() {
        let gateway = Arc::new(FakeGateway::new());
        let files = file_list(&gateway);
        files.list_all().await.unwrap();

        gateway.queue(ApiPath::ListFileNames, page(vec![file("hello.txt", "small-1")], None));
        let source = BytesSource::new(&b"hey"[..]);
        let record = files
            .upload(&source, "hello.txt", &UploadOptions::new())
            .await
            .unwrap();

        assert_eq!(record.file_id, "small-1");
        assert_eq!(gateway.calls_to(ApiPath::ListFileNames).len(), 2);
        assert!(files.index().by_name("hello.txt").is_some());
    }

    #[tokio::test]
    async fn test_upload_skips_refresh_without_index() {
        let gateway = Arc::new(FakeGateway::new());
        let files = file_list(&gateway);

        let source = BytesSource::new(&b"hey"[..]);
        files
            .upload(&source, "hello.txt", &UploadOptions::new())
            .await
            .unwrap();

        assert!(gateway.calls_to(ApiPath::ListFileNames).is_empty());
        assert_eq!(gateway.calls_to(ApiPath::GetUploadUrl)[0]["bucketId"], "bucket-id");
    }

    #[tokio::test]
    async fn test_upload_large_through_file_list() {
        let gateway = Arc::new(FakeGateway::new().recommended_part_size(4));
        let files = file_list(&gateway);

        let source: Arc<dyn ContentSource> = Arc::new(BytesSource::new(&b"0123456789"[..]));
        let record = files
            .upload_large(source, "big.bin", &LargeUploadOptions::default())
            .await
            .unwrap();

        assert_eq!(record.file_id, "large-1");
        assert_eq!(gateway.part_lengths(), vec![(1, 4), (2, 4), (3, 2)]);
        assert_eq!(gateway.calls_to(ApiPath::StartLargeFile)[0]["bucketId"], "bucket-id");
    }
}
