//! Record tree layout of an installed registry.
//!
//! ```text
//! key                                   root credential
//! name                                  display name
//! workers/<name>/{key, heartbeat}
//! clients/<name>/key
//! gateways/<name>/key
//! applications/<app>/versions/<ver>/{key, created, artifact}
//! applications/<app>/environnements/
//! ```

use berth_core::SanitizedName;

use crate::store::RecordPath;

pub const KEY: &str = "key";
pub const NAME: &str = "name";
pub const HEARTBEAT: &str = "heartbeat";
pub const CREATED: &str = "created";
pub const ARTIFACT: &str = "artifact";
pub const VERSIONS: &str = "versions";
pub const ENVIRONMENTS: &str = "environnements";

/// Identity collections that share the create-with-credential shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Workers,
    Clients,
    Gateways,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Workers, Collection::Clients, Collection::Gateways];

    pub fn dir(self) -> &'static str {
        match self {
            Collection::Workers => "workers",
            Collection::Clients => "clients",
            Collection::Gateways => "gateways",
        }
    }

    /// Singular noun used in error messages.
    pub fn kind(self) -> &'static str {
        match self {
            Collection::Workers => "worker",
            Collection::Clients => "client",
            Collection::Gateways => "gateway",
        }
    }

    pub fn path(self) -> RecordPath {
        RecordPath::root().child(self.dir())
    }

    pub fn entry(self, name: &SanitizedName) -> RecordPath {
        self.path().child(name)
    }
}

pub fn root_key() -> RecordPath {
    RecordPath::root().child(KEY)
}

pub fn root_name() -> RecordPath {
    RecordPath::root().child(NAME)
}

pub fn applications() -> RecordPath {
    RecordPath::root().child("applications")
}

pub fn application(app: &SanitizedName) -> RecordPath {
    applications().child(app)
}

pub fn versions(app: &SanitizedName) -> RecordPath {
    application(app).child(VERSIONS)
}

pub fn version(app: &SanitizedName, version: &SanitizedName) -> RecordPath {
    versions(app).child(version)
}

pub fn environments(app: &SanitizedName) -> RecordPath {
    application(app).child(ENVIRONMENTS)
}
