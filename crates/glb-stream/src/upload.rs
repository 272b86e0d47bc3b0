//! Upload validation and single-pass persistence

use crate::error::{FormatViolation, GlbError, Result};
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use scene_protocol::{GLB_HEADER_LEN, GLB_MAGIC, GLB_VERSION};
use sha2::{Digest, Sha256};
use std::io;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// An incoming binary, not yet inspected
pub struct GlbUpload<'a> {
    stream: BoxStream<'a, io::Result<Bytes>>,
    declared_size: Option<u64>,
}

impl<'a> GlbUpload<'a> {
    /// Wrap a chunk stream. Chunks are consumed as they arrive, never collected.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'a,
    {
        Self {
            stream: stream.boxed(),
            declared_size: None,
        }
    }

    /// Attach a size reported ahead of the data (e.g. a Content-Length)
    pub fn with_declared_size(mut self, size: u64) -> Self {
        self.declared_size = Some(size);
        self
    }

    pub fn declared_size(&self) -> Option<u64> {
        self.declared_size
    }

    /// Check the size limit and the GLB header.
    ///
    /// Reads no further than the chunk(s) containing the first 8 bytes.
    pub async fn validate(mut self, max_size: u64) -> Result<ValidatedGlb<'a>> {
        if let Some(declared) = self.declared_size {
            check_limit(declared, max_size)?;
        }

        let mut head = BytesMut::new();
        let mut observed = 0u64;
        while head.len() < GLB_HEADER_LEN {
            let chunk = match self.stream.next().await {
                Some(chunk) => chunk.map_err(GlbError::Source)?,
                None => return Err(FormatViolation::Truncated { len: head.len() }.into()),
            };
            observed += chunk.len() as u64;
            check_limit(observed, max_size)?;
            head.extend_from_slice(&chunk);
        }

        check_header(&head)?;
        debug!(observed, "GLB header accepted");

        Ok(ValidatedGlb {
            prefix: head.freeze(),
            stream: self.stream,
            observed,
            max_size,
        })
    }
}

impl GlbUpload<'static> {
    /// An upload backed by a single in-memory buffer
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let len = data.len() as u64;
        Self::new(stream::once(async move { Ok(data) })).with_declared_size(len)
    }

    /// An upload delivered as the given sequence of chunks
    pub fn from_chunks(chunks: Vec<Bytes>) -> Self {
        Self::new(stream::iter(chunks.into_iter().map(Ok)))
    }
}

/// An upload whose header passed validation and whose body is still unread
pub struct ValidatedGlb<'a> {
    prefix: Bytes,
    stream: BoxStream<'a, io::Result<Bytes>>,
    observed: u64,
    max_size: u64,
}

/// Outcome of a successful [`ValidatedGlb::write_to`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedGlb {
    /// Hex SHA-256 of the bytes written
    pub hash: String,
    pub size: u64,
}

impl ValidatedGlb<'_> {
    /// Drain the upload into `dest`, hashing every chunk as it is written.
    ///
    /// The hash is produced only after the file has been flushed, synced and
    /// closed. On error `dest` may hold a partial file.
    pub async fn write_to(mut self, dest: &Path) -> Result<PersistedGlb> {
        let mut file = File::create(dest).await.map_err(GlbError::Io)?;
        let mut hasher = Sha256::new();

        file.write_all(&self.prefix).await.map_err(GlbError::Io)?;
        hasher.update(&self.prefix);
        let mut written = self.prefix.len() as u64;

        while let Some(chunk) = self.stream.next().await {
            let chunk = chunk.map_err(GlbError::Source)?;
            self.observed += chunk.len() as u64;
            check_limit(self.observed, self.max_size)?;

            file.write_all(&chunk).await.map_err(GlbError::Io)?;
            hasher.update(&chunk);
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(GlbError::Io)?;
        file.sync_all().await.map_err(GlbError::Io)?;
        drop(file);

        let hash = hex::encode(hasher.finalize());
        debug!(dest = ?dest, size = written, hash = %hash, "GLB persisted");

        Ok(PersistedGlb {
            hash,
            size: written,
        })
    }
}

fn check_limit(size: u64, limit: u64) -> Result<()> {
    if size > limit {
        return Err(GlbError::TooLarge {
            limit,
            observed: size,
        });
    }
    Ok(())
}

fn check_header(head: &[u8]) -> std::result::Result<(), FormatViolation> {
    let magic = u32::from_le_bytes([head[0], head[1], head[2], head[3]]);
    if magic != GLB_MAGIC {
        return Err(FormatViolation::BadMagic { found: magic });
    }

    let version = u32::from_le_bytes([head[4], head[5], head[6], head[7]]);
    if version != GLB_VERSION {
        return Err(FormatViolation::UnsupportedVersion { found: version });
    }

    Ok(())
}
