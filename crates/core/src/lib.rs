//! bz-core: core library for the bz storage client
//!
//! This crate holds everything that does not depend on an HTTP client:
//! - Configuration and alias management
//! - Remote path parsing
//! - The [`Gateway`] trait the storage adapter implements
//! - Part partitioning, ranged readers with SHA-1 and the concurrent
//!   large-file upload coordinator
//! - Paginated listing and the [`FileIndex`] snapshot behind [`FileList`]

pub mod alias;
pub mod config;
pub mod error;
pub mod file_list;
pub mod index;
pub mod listing;
pub mod models;
pub mod partition;
pub mod path;
pub mod stream;
pub mod traits;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

pub use alias::{Alias, AliasManager, RetryConfig, TimeoutConfig};
pub use config::{Config, ConfigManager};
pub use error::{Error, RemoteError, Result};
pub use file_list::{FileList, Lookup};
pub use index::FileIndex;
pub use listing::{FileVersions, ListOptions, ListingCursor};
pub use models::{Bucket, FileAction, FileRecord, UploadTarget};
pub use partition::{MultipartConfig, PartRange, part_ranges};
pub use path::{RemotePath, parse_path};
pub use stream::{BytesSource, ContentSource, FileSource, ProgressListener, RangedReader};
pub use traits::{ApiPath, ApiResponse, FileUpload, Gateway, Method};
pub use upload::{LargeUploadOptions, PartResult, PartState, UploadCoordinator, UploadOptions};
