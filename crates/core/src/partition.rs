//! Part partitioning for large-file uploads
//!
//! Splits a content length into the contiguous, 1-indexed byte ranges that a
//! large upload sends as independent parts.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Smallest part the service accepts (except for the last part): 5 MB
pub const MIN_PART_SIZE: u64 = 5_000_000;

/// Largest part the service accepts: 5 GB
pub const MAX_PART_SIZE: u64 = 5_000_000_000;

/// Part size used when the service gives no recommendation: 100 MB
pub const DEFAULT_PART_SIZE: u64 = 100_000_000;

/// Maximum number of parts in one large file
pub const MAX_PARTS: u64 = 10_000;

/// Default number of parts uploaded at once
pub const DEFAULT_CONCURRENCY: usize = 4;

/// One part of a large upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartRange {
    /// 1-based part number
    pub part_number: u32,
    /// Byte offset within the content
    pub offset: u64,
    /// Length in bytes, always > 0
    pub length: u64,
}

impl PartRange {
    /// Offset one past the last byte of this part
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Compute the ordered part ranges covering `[0, total_length)`.
///
/// The last part holds `total_length % part_size` bytes when that is
/// nonzero, otherwise a full `part_size`. An empty input yields no parts.
pub fn part_ranges(total_length: u64, part_size: u64) -> Result<Vec<PartRange>> {
    if part_size == 0 {
        return Err(Error::InvalidSize("part size must be greater than 0".into()));
    }

    let count = part_count(total_length, part_size);
    let count = u32::try_from(count).map_err(|_| {
        Error::InvalidSize(format!(
            "{total_length} bytes in parts of {part_size} needs {count} parts"
        ))
    })?;

    Ok((0..count)
        .map(|index| {
            let offset = u64::from(index) * part_size;
            PartRange {
                part_number: index + 1,
                offset,
                length: part_size.min(total_length - offset),
            }
        })
        .collect())
}

/// Number of parts needed for a file
pub fn part_count(total_length: u64, part_size: u64) -> u64 {
    total_length.div_ceil(part_size)
}

/// Large upload tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartConfig {
    /// Part size in bytes; `None` means the service recommendation
    pub part_size: Option<u64>,

    /// Number of parts in flight at once
    pub concurrency: usize,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            part_size: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl MultipartConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn part_size(mut self, size: u64) -> Self {
        self.part_size = Some(size.clamp(MIN_PART_SIZE, MAX_PART_SIZE));
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Pick a part size for `file_size`, growing it past `recommended` if the
    /// file would otherwise need more than [`MAX_PARTS`] parts.
    ///
    /// A resolved part size of 0 is an [`Error::InvalidSize`].
    pub fn calculate_part_size(&self, file_size: u64, recommended: u64) -> Result<u64> {
        let preferred = self.part_size.unwrap_or(recommended);
        if preferred == 0 {
            return Err(Error::InvalidSize("part size must be greater than 0".into()));
        }
        if part_count(file_size, preferred) <= MAX_PARTS {
            return Ok(preferred);
        }
        Ok(file_size
            .div_ceil(MAX_PARTS)
            .clamp(MIN_PART_SIZE, MAX_PART_SIZE))
    }
}
