pub mod local;

use serde::{Deserialize, Serialize};

pub use self::local::LocalStore;
use crate::error::Result;
use crate::manifest::{Manifest, ModuleId};
use crate::version::Version;

/// A direct-dependency edge between two published artifacts. Both endpoints
/// must exist as artifact rows (referential integrity).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: ModuleId,
    pub to: ModuleId,
}

/// Graph-structured store of published artifacts and their
/// direct-dependency edges, implemented by the local file-backed store and
/// the shared server-backed store.
///
/// Rows are append-only: a recorded `(name, version)` is never updated in
/// place, only new rows are added.
pub trait MetadataStore {
    /// Inserts the artifact row for the manifest's main identity plus one
    /// dependency edge per direct dependency. All dependency references
    /// must be resolved. The duplicate policy is implementation-defined
    /// and documented on each implementation.
    fn record(&self, manifest: &Manifest) -> Result<()>;

    /// Exact-match lookup, reconstructing the manifest from the artifact
    /// row and its outgoing edges.
    fn lookup(&self, name: &str, version: &Version) -> Result<Option<Manifest>>;

    /// The row for `name` with the greatest `(major, minor, patch)`.
    /// "Latest" means greatest version number, not most recently published.
    fn lookup_latest(&self, name: &str) -> Result<Option<Manifest>>;
}
