//! Directory-tree backed store.
//!
//! Small values are written to a hidden temp file and renamed into place.
//! Artifact blobs stream into a hidden `.partial` file that is renamed on
//! success and removed on failure. Hidden names never collide with
//! sanitized record names, which cannot start with a dot.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use super::{ByteStream, RecordPath, Store};
use crate::error::{StoreError, StoreResult};

/// Store rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn hidden_sibling(target: &Path, suffix: &str) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.{suffix}"))
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &RecordPath) -> PathBuf {
        path.segments()
            .iter()
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }

    async fn ensure_parent(&self, target: &Path) -> StoreResult<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(io_err(parent))?;
        }
        Ok(())
    }
}

#[async_trait]
impl Store for FsStore {
    async fn exists(&self, path: &RecordPath) -> StoreResult<bool> {
        let target = self.resolve(path);
        fs::try_exists(&target).await.map_err(io_err(&target))
    }

    async fn create_dir(&self, path: &RecordPath) -> StoreResult<()> {
        let target = self.resolve(path);
        fs::create_dir_all(&target).await.map_err(io_err(&target))
    }

    async fn read(&self, path: &RecordPath) -> StoreResult<Option<Vec<u8>>> {
        let target = self.resolve(path);
        match fs::read(&target).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(&target)(e)),
        }
    }

    async fn write(&self, path: &RecordPath, value: &[u8]) -> StoreResult<()> {
        let target = self.resolve(path);
        self.ensure_parent(&target).await?;
        let tmp = hidden_sibling(&target, "tmp");
        {
            let mut file = fs::File::create(&tmp).await.map_err(io_err(&tmp))?;
            file.write_all(value).await.map_err(io_err(&tmp))?;
            file.sync_all().await.map_err(io_err(&tmp))?;
        }
        fs::rename(&tmp, &target).await.map_err(io_err(&target))?;
        debug!(path = %path, bytes = value.len(), "record written");
        Ok(())
    }

    async fn list(&self, path: &RecordPath) -> StoreResult<Vec<String>> {
        let target = self.resolve(path);
        let mut entries = match fs::read_dir(&target).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) if e.kind() == std::io::ErrorKind::NotADirectory => {
                return Err(StoreError::NotADirectory(path.to_string()));
            }
            Err(e) => return Err(io_err(&target)(e)),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err(&target))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    async fn write_stream(&self, path: &RecordPath, mut stream: ByteStream) -> StoreResult<u64> {
        let target = self.resolve(path);
        self.ensure_parent(&target).await?;
        let partial = hidden_sibling(&target, "partial");
        let mut file = fs::File::create(&partial).await.map_err(io_err(&partial))?;

        let mut written: u64 = 0;
        let outcome: StoreResult<()> = async {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|source| StoreError::Stream { written, source })?;
                file.write_all(&chunk).await.map_err(io_err(&partial))?;
                written += chunk.len() as u64;
            }
            file.sync_all().await.map_err(io_err(&partial))?;
            Ok(())
        }
        .await;
        drop(file);

        if let Err(e) = outcome {
            if let Err(cleanup) = fs::remove_file(&partial).await {
                warn!(path = %partial.display(), error = %cleanup, "failed to remove partial upload");
            }
            return Err(e);
        }

        fs::rename(&partial, &target).await.map_err(io_err(&target))?;
        debug!(path = %path, bytes = written, "blob written");
        Ok(written)
    }

    async fn read_stream(&self, path: &RecordPath) -> StoreResult<Option<(u64, ByteStream)>> {
        let target = self.resolve(path);
        let file = match fs::File::open(&target).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(&target)(e)),
        };
        let size = file.metadata().await.map_err(io_err(&target))?.len();
        Ok(Some((size, ReaderStream::new(file).boxed())))
    }

    async fn size(&self, path: &RecordPath) -> StoreResult<Option<u64>> {
        let target = self.resolve(path);
        match fs::metadata(&target).await {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(&target)(e)),
        }
    }
}
