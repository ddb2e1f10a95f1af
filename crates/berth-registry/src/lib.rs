//! berth-registry — the cluster's identity and artifact record.
//!
//! Workers, clients, gateways, applications and versions are kept as a tree
//! of named records behind the [`Store`] trait. [`FsStore`] lays the tree
//! out on disk; [`MemoryStore`] backs tests.
//!
//! The [`Registry`] is `Send + Sync` and is shared across request handlers
//! behind an `Arc`.

pub mod error;
pub mod layout;
pub mod locks;
pub mod registry;
pub mod store;

pub use error::{RegistryError, RegistryResult, StoreError, StoreResult};
pub use registry::{Artifact, Registry, VersionInfo};
pub use store::{ByteStream, FsStore, MemoryStore, RecordPath, Store};
