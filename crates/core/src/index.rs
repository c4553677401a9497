//! In-memory snapshot of a bucket's file names
//!
//! A [`FileIndex`] is built privately by a full listing and never mutated
//! after that; the file list publishes it by swapping one `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::models::FileRecord;

/// Files of the most recent full listing, by name and by id
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    by_name: HashMap<String, Arc<FileRecord>>,
    by_id: HashMap<String, Arc<FileRecord>>,
    populated: bool,
}

impl FileIndex {
    /// An index that has never seen a listing
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn builder() -> FileIndexBuilder {
        FileIndexBuilder {
            index: FileIndex {
                populated: true,
                ..Self::default()
            },
        }
    }

    pub fn by_name(&self, file_name: &str) -> Option<&FileRecord> {
        self.by_name.get(file_name).map(Arc::as_ref)
    }

    pub fn by_id(&self, file_id: &str) -> Option<&FileRecord> {
        self.by_id.get(file_id).map(Arc::as_ref)
    }

    /// Number of distinct file names
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Whether a full listing has been published
    pub fn is_populated(&self) -> bool {
        self.populated
    }

    /// File names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Accumulates pages of a listing before the index is published
#[derive(Debug)]
pub(crate) struct FileIndexBuilder {
    index: FileIndex,
}

impl FileIndexBuilder {
    pub(crate) fn insert(&mut self, record: FileRecord) {
        let record = Arc::new(record);
        self.index
            .by_id
            .insert(record.file_id.clone(), Arc::clone(&record));
        self.index.by_name.insert(record.file_name.clone(), record);
    }

    pub(crate) fn build(self) -> FileIndex {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_index() {
        let index = FileIndex::empty();
        assert!(index.is_empty());
        assert!(!index.is_populated());
        assert!(index.by_name("a").is_none());
    }

    #[test]
    fn test_builder_populates_both_maps() {
        let mut builder = FileIndex::builder();
        builder.insert(FileRecord::new("b.txt", "id-b", 2));
        builder.insert(FileRecord::new("a.txt", "id-a", 1));
        let index = builder.build();

        assert!(index.is_populated());
        assert_eq!(index.len(), 2);
        assert_eq!(index.by_name("a.txt").unwrap().file_id, "id-a");
        assert_eq!(index.by_id("id-b").unwrap().file_name, "b.txt");
        assert_eq!(index.names(), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_empty_listing_is_still_populated() {
        let index = FileIndex::builder().build();
        assert!(index.is_empty());
        assert!(index.is_populated());
    }
}
