//! The artifact registry.
//!
//! Holds the identity and artifact state of the cluster. All state lives in
//! a [`Store`]; the only in-memory copy is the root credential and display
//! name, both immutable after install.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use berth_core::{Credential, SanitizedName, sanitize_name};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::layout::{self, Collection};
use crate::locks::KeyLocks;
use crate::store::{ByteStream, RecordPath, Store};

/// A version as seen by workers pulling artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub version: String,
    /// Unix milliseconds at reservation.
    pub created_at: u64,
    /// Artifact size, `None` until uploaded.
    pub size: Option<u64>,
}

/// A streamed artifact ready to be served.
pub struct Artifact {
    pub size: u64,
    pub stream: ByteStream,
}

pub struct Registry {
    store: Arc<dyn Store>,
    name: String,
    root_key: Credential,
    locks: KeyLocks,
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn required<'a>(value: &'a str, field: &'static str) -> RegistryResult<&'a str> {
    if value.trim().is_empty() {
        return Err(RegistryError::MissingField(field));
    }
    Ok(value)
}

fn parse_u64(path: &RecordPath, bytes: &[u8]) -> RegistryResult<u64> {
    String::from_utf8_lossy(bytes)
        .trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| RegistryError::Corrupt {
            path: path.to_string(),
            reason: e.to_string(),
        })
}

impl Registry {
    /// Create registry state in an empty store. Returns the root credential.
    pub async fn install(store: Arc<dyn Store>, name: &str) -> RegistryResult<Credential> {
        let name = required(name, "name")?;
        if store.exists(&layout::root_key()).await? {
            return Err(RegistryError::AlreadyInstalled);
        }

        let root_key = Credential::generate();
        for collection in Collection::ALL {
            store.create_dir(&collection.path()).await?;
        }
        store.create_dir(&layout::applications()).await?;
        store.write(&layout::root_name(), name.trim().as_bytes()).await?;
        // Written last: its presence marks the install as complete.
        store.write(&layout::root_key(), root_key.expose().as_bytes()).await?;

        info!(name = name.trim(), "registry installed");
        Ok(root_key)
    }

    /// Load an installed registry.
    pub async fn open(store: Arc<dyn Store>) -> RegistryResult<Self> {
        let root_key = store
            .read(&layout::root_key())
            .await?
            .ok_or(RegistryError::NotInstalled)?;
        let name = store.read(&layout::root_name()).await?.unwrap_or_default();

        let registry = Self {
            store,
            name: String::from_utf8_lossy(&name).trim().to_string(),
            root_key: Credential::from_stored(String::from_utf8_lossy(&root_key)),
            locks: KeyLocks::new(),
        };
        debug!(name = %registry.name, "registry opened");
        Ok(registry)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn check_root(&self, key: &str) -> RegistryResult<()> {
        if self.root_key.matches(key) {
            Ok(())
        } else {
            warn!("root credential mismatch");
            Err(RegistryError::InvalidCredential)
        }
    }

    /// Compare `key` against the credential stored at `path`.
    ///
    /// A missing record is indistinguishable from a wrong key.
    async fn check_stored_key(&self, path: &RecordPath, key: &str) -> RegistryResult<()> {
        match self.store.read(path).await? {
            Some(stored) => {
                let stored = Credential::from_stored(String::from_utf8_lossy(&stored));
                if stored.matches(key) {
                    Ok(())
                } else {
                    Err(RegistryError::InvalidCredential)
                }
            }
            None => Err(RegistryError::InvalidCredential),
        }
    }

    async fn check_identity(&self, collection: Collection, name: &str, key: &str) -> RegistryResult<SanitizedName> {
        let name = sanitize_name(required(name, "name")?)?;
        let result = self
            .check_stored_key(&collection.entry(&name).child(layout::KEY), key)
            .await;
        if result.is_err() {
            warn!(kind = collection.kind(), %name, "credential mismatch");
        }
        result.map(|_| name)
    }

    async fn create_identity(
        &self,
        collection: Collection,
        root_key: &str,
        raw_name: &str,
    ) -> RegistryResult<(SanitizedName, Credential)> {
        let name = sanitize_name(required(raw_name, "name")?)?;
        self.check_root(root_key)?;

        let entry = collection.entry(&name);
        let _guard = self.locks.lock(&entry.to_string()).await;
        // The key record marks the identity as created.
        if self.store.exists(&entry.child(layout::KEY)).await? {
            return Err(RegistryError::DuplicateName {
                kind: collection.kind(),
                name: name.to_string(),
            });
        }

        let key = Credential::generate();
        self.store.create_dir(&entry).await?;
        self.store
            .write(&entry.child(layout::KEY), key.expose().as_bytes())
            .await?;

        info!(kind = collection.kind(), %name, "identity created");
        Ok((name, key))
    }

    /// Register a worker node.
    pub async fn create_worker(&self, root_key: &str, name: &str) -> RegistryResult<(SanitizedName, Credential)> {
        self.create_identity(Collection::Workers, root_key, name).await
    }

    /// Register a deploy client.
    pub async fn create_client(&self, root_key: &str, name: &str) -> RegistryResult<(SanitizedName, Credential)> {
        self.create_identity(Collection::Clients, root_key, name).await
    }

    /// Register a gateway. Its credential is the `cluster-key` for route pushes.
    pub async fn create_gateway(&self, root_key: &str, name: &str) -> RegistryResult<(SanitizedName, Credential)> {
        self.create_identity(Collection::Gateways, root_key, name).await
    }

    async fn is_reserved(&self, version_path: &RecordPath) -> RegistryResult<bool> {
        Ok(self.store.exists(&version_path.child(layout::KEY)).await?)
    }

    /// Reserve a new version of an application and return its upload credential.
    ///
    /// The application is created on first use. Reserving an existing
    /// version fails and leaves the first reservation untouched. The upload
    /// credential is written last; a version without one is not reserved.
    pub async fn reserve_version(
        &self,
        client: &str,
        client_key: &str,
        application: &str,
        version: &str,
    ) -> RegistryResult<Credential> {
        let application = sanitize_name(required(application, "application")?)?;
        let version = sanitize_name(required(version, "version")?)?;
        self.check_identity(Collection::Clients, client, client_key).await?;

        let app_path = layout::application(&application);
        let _guard = self.locks.lock(&app_path.to_string()).await;

        self.store.create_dir(&layout::versions(&application)).await?;
        self.store.create_dir(&layout::environments(&application)).await?;

        let version_path = layout::version(&application, &version);
        if self.is_reserved(&version_path).await? {
            return Err(RegistryError::DuplicateVersion {
                application: application.to_string(),
                version: version.to_string(),
            });
        }

        let upload_key = Credential::generate();
        self.store
            .write(&version_path.child(layout::CREATED), epoch_millis().to_string().as_bytes())
            .await?;
        self.store
            .write(&version_path.child(layout::KEY), upload_key.expose().as_bytes())
            .await?;

        info!(%application, %version, "version reserved");
        Ok(upload_key)
    }

    /// Stream an artifact into a reserved version. Returns the stored size.
    pub async fn upload_artifact(
        &self,
        application: &str,
        version: &str,
        upload_key: &str,
        body: ByteStream,
    ) -> RegistryResult<u64> {
        let application = sanitize_name(required(application, "application")?)?;
        let version = sanitize_name(required(version, "version")?)?;

        let version_path = layout::version(&application, &version);
        if !self.is_reserved(&version_path).await? {
            return Err(RegistryError::UnknownVersion {
                application: application.to_string(),
                version: version.to_string(),
            });
        }
        if let Err(e) = self
            .check_stored_key(&version_path.child(layout::KEY), upload_key)
            .await
        {
            warn!(%application, %version, "upload credential mismatch");
            return Err(e);
        }

        let _guard = self.locks.lock(&version_path.to_string()).await;
        let artifact = version_path.child(layout::ARTIFACT);
        if self.store.exists(&artifact).await? {
            return Err(RegistryError::ArtifactExists {
                application: application.to_string(),
                version: version.to_string(),
            });
        }

        let size = self.store.write_stream(&artifact, body).await?;
        info!(%application, %version, size, "artifact uploaded");
        Ok(size)
    }

    /// Record a worker heartbeat. Returns the recorded unix timestamp (seconds).
    pub async fn heartbeat(&self, worker: &str, key: &str) -> RegistryResult<u64> {
        let worker = self.check_identity(Collection::Workers, worker, key).await?;
        let now = epoch_millis() / 1000;
        self.store
            .write(
                &Collection::Workers.entry(&worker).child(layout::HEARTBEAT),
                now.to_string().as_bytes(),
            )
            .await?;
        debug!(%worker, "heartbeat received");
        Ok(now)
    }

    /// Last heartbeat of a worker, `None` if it never pinged.
    pub async fn last_heartbeat(&self, worker: &SanitizedName) -> RegistryResult<Option<u64>> {
        let path = Collection::Workers.entry(worker).child(layout::HEARTBEAT);
        match self.store.read(&path).await? {
            Some(bytes) => parse_u64(&path, &bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Versions of an application, oldest reservation first.
    pub async fn list_versions(&self, worker: &str, key: &str, application: &str) -> RegistryResult<Vec<VersionInfo>> {
        let application = sanitize_name(required(application, "application")?)?;
        self.check_identity(Collection::Workers, worker, key).await?;

        if !self.store.exists(&layout::application(&application)).await? {
            return Err(RegistryError::UnknownApplication(application.to_string()));
        }

        let mut versions = Vec::new();
        for name in self.store.list(&layout::versions(&application)).await? {
            let path = layout::versions(&application).child(&name);
            if !self.is_reserved(&path).await? {
                continue;
            }
            let created_path = path.child(layout::CREATED);
            let created_at = match self.store.read(&created_path).await? {
                Some(bytes) => parse_u64(&created_path, &bytes)?,
                None => 0,
            };
            let size = self.store.size(&path.child(layout::ARTIFACT)).await?;
            versions.push(VersionInfo {
                version: name,
                created_at,
                size,
            });
        }
        versions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.version.cmp(&b.version)));
        Ok(versions)
    }

    /// Open an uploaded artifact for a worker to pull.
    pub async fn download_artifact(
        &self,
        worker: &str,
        key: &str,
        application: &str,
        version: &str,
    ) -> RegistryResult<Artifact> {
        let application = sanitize_name(required(application, "application")?)?;
        let version = sanitize_name(required(version, "version")?)?;
        let worker = self.check_identity(Collection::Workers, worker, key).await?;

        let version_path = layout::version(&application, &version);
        if !self.is_reserved(&version_path).await? {
            return Err(RegistryError::UnknownVersion {
                application: application.to_string(),
                version: version.to_string(),
            });
        }

        match self.store.read_stream(&version_path.child(layout::ARTIFACT)).await? {
            Some((size, stream)) => {
                debug!(%worker, %application, %version, size, "artifact download");
                Ok(Artifact { size, stream })
            }
            None => Err(RegistryError::ArtifactMissing {
                application: application.to_string(),
                version: version.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FsStore, MemoryStore};
    use bytes::Bytes;
    use futures::{StreamExt, stream};

    async fn installed() -> (Registry, Credential) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let root = Registry::install(store.clone(), "test-cluster").await.unwrap();
        (Registry::open(store).await.unwrap(), root)
    }

    fn body(bytes: &'static [u8]) -> ByteStream {
        stream::iter(vec![Ok(Bytes::from_static(bytes))]).boxed()
    }

    async fn with_client(registry: &Registry, root: &Credential) -> Credential {
        let (_, key) = registry.create_client(root.expose(), "deployer").await.unwrap();
        key
    }

    // ── Install ────────────────────────────────────────────────────

    #[tokio::test]
    async fn install_twice_fails() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        Registry::install(store.clone(), "one").await.unwrap();
        let err = Registry::install(store, "two").await.unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyInstalled));
    }

    #[tokio::test]
    async fn open_requires_install() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        assert!(matches!(Registry::open(store).await, Err(RegistryError::NotInstalled)));
    }

    #[tokio::test]
    async fn install_persists_layout_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn Store> = Arc::new(FsStore::new(dir.path()));
        let root = Registry::install(store.clone(), "prod").await.unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("key")).unwrap(), root.expose());
        assert_eq!(std::fs::read_to_string(dir.path().join("name")).unwrap(), "prod");
        for sub in ["workers", "clients", "gateways", "applications"] {
            assert!(dir.path().join(sub).is_dir(), "{sub} missing");
        }

        let reopened = Registry::open(store).await.unwrap();
        assert_eq!(reopened.name(), "prod");
    }

    // ── Identities ─────────────────────────────────────────────────

    #[tokio::test]
    async fn create_worker_requires_root_key() {
        let (registry, _root) = installed().await;
        let err = registry.create_worker("wrong", "w1").await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidCredential));
        assert!(!registry.store.exists(&Collection::Workers.path().child("w1")).await.unwrap());
    }

    #[tokio::test]
    async fn create_worker_rejects_duplicates_after_sanitization() {
        let (registry, root) = installed().await;
        let (name, _) = registry.create_worker(root.expose(), "edge one").await.unwrap();
        assert_eq!(name.as_str(), "edgeone");

        let err = registry.create_worker(root.expose(), "edge/one").await.unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName { kind: "worker", .. }));
    }

    #[tokio::test]
    async fn invalid_name_is_rejected_before_auth() {
        let (registry, _) = installed().await;
        let err = registry.create_client("wrong", "///").await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidName(_)));
        let err = registry.create_client("wrong", "").await.unwrap_err();
        assert!(matches!(err, RegistryError::MissingField("name")));
    }

    #[tokio::test]
    async fn collections_are_independent() {
        let (registry, root) = installed().await;
        registry.create_worker(root.expose(), "shared").await.unwrap();
        registry.create_client(root.expose(), "shared").await.unwrap();
        registry.create_gateway(root.expose(), "shared").await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_creates_yield_one_winner() {
        let (registry, root) = installed().await;
        let registry = Arc::new(registry);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let root = root.clone();
                tokio::spawn(async move { registry.create_worker(root.expose(), "racer").await })
            })
            .collect();

        let mut ok = 0;
        let mut dup = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(RegistryError::DuplicateName { .. }) => dup += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!((ok, dup), (1, 7));
    }

    // ── Versions ───────────────────────────────────────────────────

    #[tokio::test]
    async fn reserve_creates_application_lazily() {
        let (registry, root) = installed().await;
        let client_key = with_client(&registry, &root).await;

        registry
            .reserve_version("deployer", client_key.expose(), "demo", "1.0.0")
            .await
            .unwrap();

        let app = sanitize_name("demo").unwrap();
        assert!(registry.store.exists(&layout::environments(&app)).await.unwrap());
        assert!(registry.store.exists(&layout::version(&app, &sanitize_name("1.0.0").unwrap())).await.unwrap());
    }

    #[tokio::test]
    async fn reserve_twice_fails_and_keeps_first_key() {
        let (registry, root) = installed().await;
        let client_key = with_client(&registry, &root).await;

        let first = registry
            .reserve_version("deployer", client_key.expose(), "demo", "1.0.0")
            .await
            .unwrap();
        let err = registry
            .reserve_version("deployer", client_key.expose(), "demo", "1.0.0")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateVersion { .. }));

        // The first upload credential still works.
        let size = registry
            .upload_artifact("demo", "1.0.0", first.expose(), body(b"payload"))
            .await
            .unwrap();
        assert_eq!(size, 7);
    }

    #[tokio::test]
    async fn reserve_validates_fields_and_client() {
        let (registry, root) = installed().await;
        let client_key = with_client(&registry, &root).await;

        let err = registry.reserve_version("deployer", client_key.expose(), "", "1.0").await.unwrap_err();
        assert!(matches!(err, RegistryError::MissingField("application")));
        let err = registry.reserve_version("deployer", client_key.expose(), "demo", " ").await.unwrap_err();
        assert!(matches!(err, RegistryError::MissingField("version")));
        let err = registry.reserve_version("deployer", "bad", "demo", "1.0").await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidCredential));
        let err = registry.reserve_version("stranger", client_key.expose(), "demo", "1.0").await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidCredential));
    }

    /// Fails the first write of any upload credential, then delegates.
    struct FlakyKeyStore {
        inner: MemoryStore,
        tripped: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl Store for FlakyKeyStore {
        async fn exists(&self, path: &RecordPath) -> crate::error::StoreResult<bool> {
            self.inner.exists(path).await
        }
        async fn create_dir(&self, path: &RecordPath) -> crate::error::StoreResult<()> {
            self.inner.create_dir(path).await
        }
        async fn read(&self, path: &RecordPath) -> crate::error::StoreResult<Option<Vec<u8>>> {
            self.inner.read(path).await
        }
        async fn write(&self, path: &RecordPath, value: &[u8]) -> crate::error::StoreResult<()> {
            let upload_key = path.segments().iter().any(|s| s == layout::VERSIONS) && path.file_name() == Some(layout::KEY);
            if upload_key && !self.tripped.swap(true, std::sync::atomic::Ordering::SeqCst) {
                return Err(crate::error::StoreError::Io {
                    path: path.to_string(),
                    source: std::io::Error::other("disk full"),
                });
            }
            self.inner.write(path, value).await
        }
        async fn list(&self, path: &RecordPath) -> crate::error::StoreResult<Vec<String>> {
            self.inner.list(path).await
        }
        async fn write_stream(&self, path: &RecordPath, stream: ByteStream) -> crate::error::StoreResult<u64> {
            self.inner.write_stream(path, stream).await
        }
        async fn read_stream(&self, path: &RecordPath) -> crate::error::StoreResult<Option<(u64, ByteStream)>> {
            self.inner.read_stream(path).await
        }
        async fn size(&self, path: &RecordPath) -> crate::error::StoreResult<Option<u64>> {
            self.inner.size(path).await
        }
    }

    #[tokio::test]
    async fn failed_reservation_leaves_version_free() {
        let store: Arc<dyn Store> = Arc::new(FlakyKeyStore {
            inner: MemoryStore::new(),
            tripped: std::sync::atomic::AtomicBool::new(false),
        });
        let root = Registry::install(store.clone(), "test-cluster").await.unwrap();
        let registry = Registry::open(store).await.unwrap();
        let client_key = with_client(&registry, &root).await;
        let (_, worker_key) = registry.create_worker(root.expose(), "w1").await.unwrap();

        let err = registry
            .reserve_version("deployer", client_key.expose(), "demo", "1.0.0")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Store(_)));

        let err = registry
            .upload_artifact("demo", "1.0.0", "anything", body(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownVersion { .. }));
        assert!(registry.list_versions("w1", worker_key.expose(), "demo").await.unwrap().is_empty());

        let upload = registry
            .reserve_version("deployer", client_key.expose(), "demo", "1.0.0")
            .await
            .unwrap();
        let size = registry
            .upload_artifact("demo", "1.0.0", upload.expose(), body(b"payload"))
            .await
            .unwrap();
        assert_eq!(size, 7);
    }

    #[tokio::test]
    async fn concurrent_reservations_yield_one_winner() {
        let (registry, root) = installed().await;
        let client_key = with_client(&registry, &root).await;
        let registry = Arc::new(registry);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let client_key = client_key.clone();
                tokio::spawn(async move {
                    registry
                        .reserve_version("deployer", client_key.expose(), "demo", "1.0.0")
                        .await
                })
            })
            .collect();

        let mut winners = Vec::new();
        let mut dup = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(key) => winners.push(key),
                Err(RegistryError::DuplicateVersion { .. }) => dup += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!((winners.len(), dup), (1, 7));

        let size = registry
            .upload_artifact("demo", "1.0.0", winners[0].expose(), body(b"winner"))
            .await
            .unwrap();
        assert_eq!(size, 6);
    }

    #[tokio::test]
    async fn upload_unknown_version() {
        let (registry, _) = installed().await;
        let err = registry
            .upload_artifact("demo", "9.9.9", "whatever", body(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownVersion { .. }));
    }

    #[tokio::test]
    async fn upload_with_wrong_key_leaves_no_artifact() {
        let (registry, root) = installed().await;
        let client_key = with_client(&registry, &root).await;
        registry
            .reserve_version("deployer", client_key.expose(), "demo", "1.0.0")
            .await
            .unwrap();

        let err = registry
            .upload_artifact("demo", "1.0.0", "not-the-key", body(b"evil"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidCredential));

        let app = sanitize_name("demo").unwrap();
        let ver = sanitize_name("1.0.0").unwrap();
        assert!(!registry.store.exists(&layout::version(&app, &ver).child(layout::ARTIFACT)).await.unwrap());
    }

    #[tokio::test]
    async fn reupload_after_success_is_rejected() {
        let (registry, root) = installed().await;
        let client_key = with_client(&registry, &root).await;
        let upload = registry
            .reserve_version("deployer", client_key.expose(), "demo", "1.0.0")
            .await
            .unwrap();

        registry.upload_artifact("demo", "1.0.0", upload.expose(), body(b"v1")).await.unwrap();
        let err = registry
            .upload_artifact("demo", "1.0.0", upload.expose(), body(b"v2"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::ArtifactExists { .. }));
    }

    #[tokio::test]
    async fn failed_upload_can_be_retried() {
        let (registry, root) = installed().await;
        let client_key = with_client(&registry, &root).await;
        let upload = registry
            .reserve_version("deployer", client_key.expose(), "demo", "1.0.0")
            .await
            .unwrap();

        let broken: ByteStream = stream::iter(vec![
            Ok(Bytes::from_static(b"half")),
            Err(std::io::Error::other("connection reset")),
        ])
        .boxed();
        assert!(registry.upload_artifact("demo", "1.0.0", upload.expose(), broken).await.is_err());

        let size = registry
            .upload_artifact("demo", "1.0.0", upload.expose(), body(b"complete"))
            .await
            .unwrap();
        assert_eq!(size, 8);
    }

    // ── Workers ────────────────────────────────────────────────────

    #[tokio::test]
    async fn heartbeat_checks_worker_key() {
        let (registry, root) = installed().await;
        let (name, key) = registry.create_worker(root.expose(), "w1").await.unwrap();

        assert!(registry.last_heartbeat(&name).await.unwrap().is_none());
        let at = registry.heartbeat("w1", key.expose()).await.unwrap();
        assert_eq!(registry.last_heartbeat(&name).await.unwrap(), Some(at));

        let err = registry.heartbeat("w1", "nope").await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidCredential));
        let err = registry.heartbeat("ghost", key.expose()).await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidCredential));
    }

    #[tokio::test]
    async fn worker_lists_and_downloads_versions() {
        let (registry, root) = installed().await;
        let client_key = with_client(&registry, &root).await;
        let (_, worker_key) = registry.create_worker(root.expose(), "w1").await.unwrap();

        let v1 = registry.reserve_version("deployer", client_key.expose(), "demo", "1.0.0").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        registry.reserve_version("deployer", client_key.expose(), "demo", "0.9.0").await.unwrap();
        registry.upload_artifact("demo", "1.0.0", v1.expose(), body(b"artifact")).await.unwrap();

        let versions = registry.list_versions("w1", worker_key.expose(), "demo").await.unwrap();
        assert_eq!(versions.len(), 2);
        // Reservation order, not lexical order.
        assert_eq!(versions[0].version, "1.0.0");
        assert_eq!(versions[0].size, Some(8));
        assert_eq!(versions[1].size, None);

        let artifact = registry
            .download_artifact("w1", worker_key.expose(), "demo", "1.0.0")
            .await
            .unwrap();
        assert_eq!(artifact.size, 8);

        let err = registry
            .download_artifact("w1", worker_key.expose(), "demo", "0.9.0")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::ArtifactMissing { .. }));

        let err = registry.list_versions("w1", worker_key.expose(), "nope").await.unwrap_err();
        assert!(matches!(err, RegistryError::UnknownApplication(_)));
    }
}
