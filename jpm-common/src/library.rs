use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Result;
use crate::manifest::{parse_artifact_file_name, ModuleId};
use crate::version::Version;

/// Destination slot for fetched artifacts. Explicitly requested modules and
/// transitively pulled modules are laid out separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibSlot {
    Main,
    Transitive,
}

impl LibSlot {
    pub fn dir_name(&self) -> &'static str {
        match self {
            LibSlot::Main => "main",
            LibSlot::Transitive => "transitive",
        }
    }
}

/// Queries and lays out artifacts under a project's `lib/` directory.
///
/// The layout is `lib/main/<name>-<version>.jar` and
/// `lib/transitive/<name>-<version>.jar`. The resolver consults this to
/// prune roots that are already satisfied locally.
#[derive(Debug, Clone)]
pub struct LibraryRegistry {
    lib_dir: PathBuf,
}

/// The "already satisfied locally" check consumed by the resolver's pruning
/// step. Kept as a trait so resolution stays a pure function over its
/// inputs.
pub trait InstalledLookup {
    fn installed_version(&self, name: &str) -> Result<Option<Version>>;
}

impl LibraryRegistry {
    pub fn new(lib_dir: impl Into<PathBuf>) -> Self {
        Self {
            lib_dir: lib_dir.into(),
        }
    }

    pub fn lib_dir(&self) -> &Path {
        &self.lib_dir
    }

    /// Returns the slot directory, creating it if needed.
    pub fn slot_dir(&self, slot: LibSlot) -> Result<PathBuf> {
        let dir = self.lib_dir.join(slot.dir_name());
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Where an artifact for `id` lands in the given slot.
    pub fn artifact_path(&self, slot: LibSlot, id: &ModuleId) -> Result<PathBuf> {
        Ok(self.slot_dir(slot)?.join(id.artifact_file_name()))
    }

    pub fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.installed_version(name)?.is_some())
    }

    fn scan_slot(&self, slot: LibSlot, name: &str, latest: &mut Option<Version>) -> Result<()> {
        let dir = self.lib_dir.join(slot.dir_name());
        if !dir.is_dir() {
            return Ok(());
        }
        for entry in fs::read_dir(&dir)? {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                    continue;
                }
            };
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let Some(id) = parse_artifact_file_name(file_name) else {
                continue;
            };
            if id.name == name && latest.map_or(true, |cur| id.version > cur) {
                *latest = Some(id.version);
            }
        }
        Ok(())
    }
}

impl InstalledLookup for LibraryRegistry {
    /// Greatest installed version of `name` across both slots, if any.
    fn installed_version(&self, name: &str) -> Result<Option<Version>> {
        let mut latest: Option<Version> = None;
        self.scan_slot(LibSlot::Main, name, &mut latest)?;
        self.scan_slot(LibSlot::Transitive, name, &mut latest)?;
        if let Some(v) = &latest {
            debug!("Found installed artifact {name}-{v}");
        }
        Ok(latest)
    }
}
