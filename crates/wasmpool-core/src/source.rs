//! Module byte sources for the loader.
//!
//! The loader is agnostic to where the module's bytes come from; it
//! consumes a [`ModuleSource`] and reports progress per chunk.
//! Implementations:
//! - [`FileSource`]: local file, total size known from metadata
//! - [`HttpSource`]: streaming download, total size from `Content-Length`
//! - [`BytesSource`]: in-memory bytes, mainly for tests and embedding

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Client;
use tokio::io::AsyncReadExt;
use tracing::debug;
use url::Url;

use wasmpool_common::LoadError;

/// A source of module bytes with optional length information.
///
/// `open` is called exactly once, before the first chunk; the total it
/// reports is sampled once by the loader and stays constant for the whole
/// run. `next_chunk` is called until it returns `None`.
#[async_trait]
pub trait ModuleSource: Send {
    /// Begin the transfer and report the total size in bytes, when known.
    async fn open(&mut self) -> Result<Option<u64>, LoadError>;

    /// Read the next chunk, or `None` when the transfer is finished.
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, LoadError>;
}

/// In-memory module bytes.
///
/// Chunking is configurable so tests can drive an exact progress
/// sequence; `unknown_length` exercises the `total = None` path of
/// unknown-length transfers.
pub struct BytesSource {
    bytes: Vec<u8>,
    pos: usize,
    chunk_size: usize,
    report_total: bool,
}

impl BytesSource {
    /// Create a source over the given bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            pos: 0,
            chunk_size: 64 * 1024,
            report_total: true,
        }
    }

    /// Set the chunk size used by `next_chunk`.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Report no total size, like an unknown-length transfer.
    pub fn unknown_length(mut self) -> Self {
        self.report_total = false;
        self
    }
}

#[async_trait]
impl ModuleSource for BytesSource {
    async fn open(&mut self) -> Result<Option<u64>, LoadError> {
        if self.report_total {
            Ok(Some(self.bytes.len() as u64))
        } else {
            Ok(None)
        }
    }

    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, LoadError> {
        if self.pos >= self.bytes.len() {
            return Ok(None);
        }

        let end = (self.pos + self.chunk_size).min(self.bytes.len());
        let chunk = self.bytes[self.pos..end].to_vec();
        self.pos = end;
        Ok(Some(chunk))
    }
}

/// A module file on the local filesystem.
pub struct FileSource {
    path: PathBuf,
    chunk_size: usize,
    file: Option<tokio::fs::File>,
}

impl FileSource {
    /// Create a source reading from `path` in `chunk_size` byte chunks.
    pub fn new(path: impl AsRef<Path>, chunk_size: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            chunk_size: chunk_size.max(1),
            file: None,
        }
    }
}

#[async_trait]
impl ModuleSource for FileSource {
    async fn open(&mut self) -> Result<Option<u64>, LoadError> {
        let file = tokio::fs::File::open(&self.path).await.map_err(|e| {
            LoadError::fetch(format!("Failed to open '{}': {e}", self.path.display()))
        })?;

        let total = file.metadata().await.ok().map(|m| m.len());
        debug!(path = %self.path.display(), total = ?total, "Module file opened");

        self.file = Some(file);
        Ok(total)
    }

    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, LoadError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| LoadError::fetch("File source read before open"))?;

        let mut buf = vec![0u8; self.chunk_size];
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| LoadError::fetch(format!("Read failed: {e}")))?;

        if n == 0 {
            return Ok(None);
        }

        buf.truncate(n);
        Ok(Some(buf))
    }
}

/// A module fetched over HTTP(S).
///
/// The response is streamed; the total comes from `Content-Length` when
/// the server sends one, otherwise progress runs with an unknown total.
pub struct HttpSource {
    client: Client,
    url: Url,
    response: Option<reqwest::Response>,
}

impl HttpSource {
    /// Create a source fetching from `url`.
    pub fn new(url: Url) -> Self {
        Self {
            client: Client::new(),
            url,
            response: None,
        }
    }

    /// Create a source from a URL string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid URL.
    pub fn parse(url: &str) -> Result<Self, LoadError> {
        let url = Url::parse(url).map_err(|e| LoadError::fetch(format!("Invalid URL: {e}")))?;
        Ok(Self::new(url))
    }
}

#[async_trait]
impl ModuleSource for HttpSource {
    async fn open(&mut self) -> Result<Option<u64>, LoadError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| LoadError::fetch(format!("Request to '{}' failed: {e}", self.url)))?
            .error_for_status()
            .map_err(|e| LoadError::fetch(format!("Request to '{}' failed: {e}", self.url)))?;

        let total = response.content_length();
        debug!(url = %self.url, total = ?total, "Module download started");

        self.response = Some(response);
        Ok(total)
    }

    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, LoadError> {
        let response = self
            .response
            .as_mut()
            .ok_or_else(|| LoadError::fetch("HTTP source read before open"))?;

        let chunk = response
            .chunk()
            .await
            .map_err(|e| LoadError::fetch(format!("Download interrupted: {e}")))?;

        Ok(chunk.map(|bytes| bytes.to_vec()))
    }
}
