use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DependencyEdge, MetadataStore};
use crate::config::Config;
use crate::error::{JpmError, Result};
use crate::manifest::{Manifest, ModuleId, PackageRef};
use crate::version::Version;

/// Single-writer, file-backed metadata store.
///
/// The whole document is loaded at the start of each operation and, for
/// writes, persisted through a temp-file rename before the call returns, so
/// no file handle outlives an operation and a failed write cannot leave a
/// half-written store behind.
///
/// Duplicate policy: re-recording an existing `(name, version)` is a no-op.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    artifacts: Vec<ModuleId>,
    dependencies: Vec<DependencyEdge>,
}

impl StoreDocument {
    fn manifest_of(&self, id: &ModuleId) -> Option<Manifest> {
        if !self.artifacts.contains(id) {
            return None;
        }
        let dependencies = self
            .dependencies
            .iter()
            .filter(|edge| &edge.from == id)
            .map(|edge| PackageRef::resolved(edge.to.name.clone(), edge.to.version))
            .collect();
        Some(Manifest {
            main: id.clone(),
            dependencies,
        })
    }
}

impl LocalStore {
    pub fn new(config: &Config) -> Self {
        Self::at(config.store_path())
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<StoreDocument> {
        if !self.path.exists() {
            return Ok(StoreDocument::default());
        }
        let raw = fs::read_to_string(&self.path)?;
        serde_json::from_str(&raw).map_err(|e| {
            JpmError::Store(format!(
                "corrupt store file {}: {e}",
                self.path.display()
            ))
        })
    }

    fn persist(&self, doc: &StoreDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(doc)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl MetadataStore for LocalStore {
    fn record(&self, manifest: &Manifest) -> Result<()> {
        let mut edges = Vec::with_capacity(manifest.dependencies.len());
        for dep in &manifest.dependencies {
            let version = dep.version.ok_or_else(|| {
                JpmError::MalformedVersion(format!(
                    "dependency '{}' of '{}' is unresolved",
                    dep.name, manifest.main
                ))
            })?;
            edges.push(DependencyEdge {
                from: manifest.main.clone(),
                to: ModuleId::new(dep.name.clone(), version),
            });
        }

        let mut doc = self.load()?;
        if doc.artifacts.contains(&manifest.main) {
            debug!("Artifact {} already recorded, skipping", manifest.main);
            return Ok(());
        }
        doc.artifacts.push(manifest.main.clone());
        for edge in edges {
            // every edge endpoint must exist as an artifact row
            if !doc.artifacts.contains(&edge.to) {
                doc.artifacts.push(edge.to.clone());
            }
            if !doc.dependencies.contains(&edge) {
                doc.dependencies.push(edge);
            }
        }
        self.persist(&doc)?;
        debug!("Recorded artifact {}", manifest.main);
        Ok(())
    }

    fn lookup(&self, name: &str, version: &Version) -> Result<Option<Manifest>> {
        let doc = self.load()?;
        Ok(doc.manifest_of(&ModuleId::new(name, *version)))
    }

    fn lookup_latest(&self, name: &str) -> Result<Option<Manifest>> {
        let doc = self.load()?;
        let latest = doc
            .artifacts
            .iter()
            .filter(|id| id.name == name)
            .max_by_key(|id| id.version)
            .cloned();
        Ok(latest.and_then(|id| doc.manifest_of(&id)))
    }
}
