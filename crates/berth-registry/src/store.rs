//! Record store abstraction.
//!
//! The registry persists everything as a tree of named records: directories
//! hold children, files hold small values or artifact blobs. [`FsStore`]
//! maps the tree onto a real directory; [`MemoryStore`] keeps it in a map
//! for tests.

pub mod fs;
pub mod memory;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::StoreResult;

pub use fs::FsStore;
pub use memory::MemoryStore;

/// Streamed artifact bytes.
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Path of a record, one sanitized segment per level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RecordPath(Vec<String>);

impl RecordPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, segment: impl AsRef<str>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.as_ref().to_string());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.0.split_last()?;
        Some(Self(rest.to_vec()))
    }

    pub fn file_name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }
}

impl fmt::Display for RecordPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0.join("/"))
    }
}

/// Durable storage for the registry's record tree.
///
/// Every write must be persisted before the call returns.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Whether a record (file or directory) exists at `path`.
    async fn exists(&self, path: &RecordPath) -> StoreResult<bool>;

    /// Create a directory and all missing parents. Idempotent.
    async fn create_dir(&self, path: &RecordPath) -> StoreResult<()>;

    /// Read a small value. `None` if absent.
    async fn read(&self, path: &RecordPath) -> StoreResult<Option<Vec<u8>>>;

    /// Replace a small value atomically, creating parents as needed.
    async fn write(&self, path: &RecordPath, value: &[u8]) -> StoreResult<()>;

    /// Names of the direct children of a directory, sorted. Empty if absent.
    async fn list(&self, path: &RecordPath) -> StoreResult<Vec<String>>;

    /// Consume `stream` into the blob at `path` and return its size.
    ///
    /// The blob only becomes visible once the stream has ended cleanly; a
    /// failing stream leaves nothing at `path`.
    async fn write_stream(&self, path: &RecordPath, stream: ByteStream) -> StoreResult<u64>;

    /// Open a blob for streaming. Returns its size alongside the stream.
    async fn read_stream(&self, path: &RecordPath) -> StoreResult<Option<(u64, ByteStream)>>;

    /// Size of a blob in bytes. `None` if absent.
    async fn size(&self, path: &RecordPath) -> StoreResult<Option<u64>>;
}
