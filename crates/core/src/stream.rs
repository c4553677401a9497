//! Ranged, hashing readers over upload sources
//!
//! A [`ContentSource`] hands out independent readers positioned at an offset.
//! [`RangedReader`] bounds one of those readers to a byte window and hashes
//! the bytes as they pass through, so a part's SHA-1 is known once the part
//! has been streamed without ever holding the whole part in memory.

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use async_trait::async_trait;
use bytes::Bytes;
use sha1::{Digest, Sha1};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, ReadBuf};

use crate::error::{Error, Result};

/// Callback invoked with the number of bytes consumed by each read
pub type ProgressListener = Arc<dyn Fn(u64) + Send + Sync>;

/// A reader that can be moved into a spawned task
pub type BoxedRead = Pin<Box<dyn AsyncRead + Send>>;

/// Largest chunk pulled from the inner reader in one poll
const READ_CHUNK: usize = 64 * 1024;

/// Random-access content that can be read from several places at once
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Total length in bytes
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open a fresh reader starting at `offset`.
    ///
    /// Every call returns an independent cursor; readers never share position.
    async fn open_at(&self, offset: u64) -> Result<BoxedRead>;
}

/// A local file, reopened for every reader
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    len: u64,
}

impl FileSource {
    /// Stat the file and remember its length
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let len = tokio::fs::metadata(&path).await?.len();
        Ok(Self { path, len })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ContentSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    async fn open_at(&self, offset: u64) -> Result<BoxedRead> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        Ok(Box::pin(file))
    }
}

/// In-memory content; slices share the buffer but not the cursor
#[derive(Debug, Clone)]
pub struct BytesSource {
    data: Bytes,
}

impl BytesSource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait]
impl ContentSource for BytesSource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    async fn open_at(&self, offset: u64) -> Result<BoxedRead> {
        let start = usize::try_from(offset)
            .ok()
            .filter(|start| *start <= self.data.len())
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "offset {offset} is past the end of {} bytes",
                    self.data.len()
                ))
            })?;
        Ok(Box::pin(io::Cursor::new(self.data.slice(start..))))
    }
}

/// Sequential reader over `[offset, offset + length)` of a source.
///
/// Reads past the window report end-of-stream. The SHA-1 of the window is
/// available from [`RangedReader::content_sha1`] once the window is exhausted.
pub struct RangedReader {
    inner: BoxedRead,
    offset: u64,
    length: u64,
    remaining: u64,
    hasher: Sha1,
    digest: Option<String>,
    scratch: Vec<u8>,
    progress: Option<ProgressListener>,
}

impl RangedReader {
    /// Open a window over `source`
    pub async fn open(source: &dyn ContentSource, offset: u64, length: u64) -> Result<Self> {
        let end = offset.checked_add(length);
        if end.is_none_or(|end| end > source.len()) {
            return Err(Error::InvalidArgument(format!(
                "range {offset}+{length} exceeds content length {}",
                source.len()
            )));
        }
        let inner = source.open_at(offset).await?;
        Ok(Self::new(inner, offset, length))
    }

    /// Wrap a reader that is already positioned at `offset`
    pub fn new(inner: BoxedRead, offset: u64, length: u64) -> Self {
        let mut reader = Self {
            inner,
            offset,
            length,
            remaining: length,
            hasher: Sha1::new(),
            digest: None,
            scratch: Vec::new(),
            progress: None,
        };
        if length == 0 {
            reader.finish_digest();
        }
        reader
    }

    /// Report consumed bytes to `listener`
    pub fn with_progress(mut self, listener: Option<ProgressListener>) -> Self {
        self.progress = listener;
        self
    }

    /// Window length in bytes
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Offset of the window within the source
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Lowercase hex SHA-1 of the window, once fully read
    pub fn content_sha1(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// Read whatever is left and return the digest
    pub async fn digest_to_end(mut self) -> io::Result<String> {
        let mut sink = tokio::io::sink();
        tokio::io::copy(&mut self, &mut sink).await?;
        Ok(self.digest.unwrap_or_default())
    }

    /// Read the remaining window into memory and return it with its digest
    pub async fn read_all(mut self) -> io::Result<(Vec<u8>, String)> {
        let mut data = Vec::with_capacity(self.remaining as usize);
        self.read_to_end(&mut data).await?;
        Ok((data, self.digest.unwrap_or_default()))
    }

    fn finish_digest(&mut self) {
        if self.digest.is_none() {
            self.digest = Some(hex::encode(self.hasher.finalize_reset()));
        }
    }
}

impl std::fmt::Debug for RangedReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangedReader")
            .field("offset", &self.offset)
            .field("length", &self.length)
            .field("remaining", &self.remaining)
            .finish_non_exhaustive()
    }
}

impl AsyncRead for RangedReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.remaining == 0 {
            this.finish_digest();
            return Poll::Ready(Ok(()));
        }
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        let want = buf
            .remaining()
            .min(READ_CHUNK)
            .min(usize::try_from(this.remaining).unwrap_or(usize::MAX));
        this.scratch.resize(want, 0);
        let mut chunk = ReadBuf::new(&mut this.scratch[..want]);
        ready!(this.inner.as_mut().poll_read(cx, &mut chunk))?;

        let filled = chunk.filled();
        if filled.is_empty() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "source ended {} bytes before the end of range {}+{}",
                    this.remaining, this.offset, this.length
                ),
            )));
        }

        let n = filled.len();
        this.hasher.update(filled);
        buf.put_slice(filled);
        this.remaining -= n as u64;
        if let Some(progress) = &this.progress {
            progress(n as u64);
        }
        if this.remaining == 0 {
            this.finish_digest();
        }
        Poll::Ready(Ok(()))
    }
}

/// Hex SHA-1 of a byte slice
pub fn sha1_hex(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}
