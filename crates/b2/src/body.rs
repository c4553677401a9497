//! Streaming upload bodies
//!
//! Upload bodies are sent with `X-Bz-Content-Sha1: hex_digits_at_end`: the
//! reader's bytes followed by the 40 hex characters of their SHA-1, so the
//! digest is computed while streaming and nothing is buffered whole.

use std::io;

use bytes::Bytes;
use futures::Stream;
use tokio::io::AsyncReadExt;

use bz_core::RangedReader;

/// Length of a hex SHA-1
pub const DIGEST_LEN: u64 = 40;

/// `X-Bz-Content-Sha1` value announcing a trailing digest
pub const DIGEST_AT_END: &str = "hex_digits_at_end";

const CHUNK_SIZE: usize = 64 * 1024;

/// Bytes on the wire for a reader, digest included
pub fn content_length(reader: &RangedReader) -> u64 {
    reader.len() + DIGEST_LEN
}

/// The reader's bytes, then its hex digest
pub fn hashed_stream(
    reader: RangedReader,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    futures::stream::unfold(Some(reader), |state| async move {
        let mut reader = state?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        match reader.read(&mut buf).await {
            Ok(0) => {
                let digest = reader
                    .content_sha1()
                    .map(|digest| Bytes::from(digest.to_owned()))
                    .ok_or_else(|| io::Error::other("reader finished without a digest"));
                Some((digest, None))
            }
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(Bytes::from(buf)), Some(reader)))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
}

pub(crate) fn hashed_body(reader: RangedReader) -> reqwest::Body {
    reqwest::Body::wrap_stream(hashed_stream(reader))
}
