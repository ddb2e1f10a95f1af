//! In-memory store for tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream;

use super::{ByteStream, RecordPath, Store};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Bytes),
}

/// Ephemeral store keyed by `/`-joined record paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    nodes: Arc<Mutex<BTreeMap<String, Node>>>,
}

fn key(path: &RecordPath) -> String {
    path.segments().join("/")
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_dirs(nodes: &mut BTreeMap<String, Node>, path: &RecordPath) -> StoreResult<()> {
        let mut current = RecordPath::root();
        for segment in path.segments() {
            current = current.child(segment);
            match nodes.get(&key(&current)) {
                Some(Node::File(_)) => return Err(StoreError::NotADirectory(current.to_string())),
                Some(Node::Dir) => {}
                None => {
                    nodes.insert(key(&current), Node::Dir);
                }
            }
        }
        Ok(())
    }

    fn put_file(&self, path: &RecordPath, value: Bytes) -> StoreResult<()> {
        let mut nodes = self.nodes.lock().expect("memory store lock");
        if let Some(parent) = path.parent() {
            Self::insert_dirs(&mut nodes, &parent)?;
        }
        nodes.insert(key(path), Node::File(value));
        Ok(())
    }

    fn get_file(&self, path: &RecordPath) -> Option<Bytes> {
        let nodes = self.nodes.lock().expect("memory store lock");
        match nodes.get(&key(path)) {
            Some(Node::File(bytes)) => Some(bytes.clone()),
            _ => None,
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn exists(&self, path: &RecordPath) -> StoreResult<bool> {
        if path.segments().is_empty() {
            return Ok(true);
        }
        let nodes = self.nodes.lock().expect("memory store lock");
        Ok(nodes.contains_key(&key(path)))
    }

    async fn create_dir(&self, path: &RecordPath) -> StoreResult<()> {
        let mut nodes = self.nodes.lock().expect("memory store lock");
        Self::insert_dirs(&mut nodes, path)
    }

    async fn read(&self, path: &RecordPath) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.get_file(path).map(|b| b.to_vec()))
    }

    async fn write(&self, path: &RecordPath, value: &[u8]) -> StoreResult<()> {
        self.put_file(path, Bytes::copy_from_slice(value))
    }

    async fn list(&self, path: &RecordPath) -> StoreResult<Vec<String>> {
        let prefix = if path.segments().is_empty() {
            String::new()
        } else {
            format!("{}/", key(path))
        };
        let nodes = self.nodes.lock().expect("memory store lock");
        Ok(nodes
            .keys()
            .filter_map(|k| k.strip_prefix(prefix.as_str()))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect())
    }

    async fn write_stream(&self, path: &RecordPath, mut stream: ByteStream) -> StoreResult<u64> {
        let mut buf = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| StoreError::Stream {
                written: buf.len() as u64,
                source,
            })?;
            buf.extend_from_slice(&chunk);
        }
        let size = buf.len() as u64;
        self.put_file(path, Bytes::from(buf))?;
        Ok(size)
    }

    async fn read_stream(&self, path: &RecordPath) -> StoreResult<Option<(u64, ByteStream)>> {
        Ok(self.get_file(path).map(|bytes| {
            let size = bytes.len() as u64;
            let stream: ByteStream = stream::iter(vec![Ok(bytes)]).boxed();
            (size, stream)
        }))
    }

    async fn size(&self, path: &RecordPath) -> StoreResult<Option<u64>> {
        Ok(self.get_file(path).map(|b| b.len() as u64))
    }
}
