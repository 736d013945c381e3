use std::fmt;
use std::fs::{self, File};
use std::hash::{Hash, Hasher};
use std::io::{BufReader, Read, Write};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::{JpmError, Result};
use crate::version::Version;

/// Fixed path of the descriptor embedded inside a published jar.
pub const EMBEDDED_DESCRIPTOR_PATH: &str = "META-INF/jpm/main.jpm";

/// A fully resolved module identity. This is the key the metadata store and
/// the resolver deduplicate on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleId {
    pub name: String,
    pub version: Version,
}

impl ModuleId {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Canonical artifact filename: `<name>-<major>.<minor>.<patch>.jar`.
    pub fn artifact_file_name(&self) -> String {
        format!("{}-{}.jar", self.name, self.version)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}

/// A reference to a module. An unresolved reference (no version) is a
/// request for "latest known version" and must never be persisted or
/// published.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageRef {
    pub name: String,
    pub version: Option<Version>,
}

impl PackageRef {
    pub fn resolved(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version: Some(version),
        }
    }

    pub fn unresolved(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.version.is_some()
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}-{}", self.name, v),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A package descriptor: one module identity plus its direct dependencies.
///
/// Equality and hashing are defined by the main identity only; two manifests
/// with the same `(name, version)` are interchangeable for deduplication
/// regardless of their dependency lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub main: ModuleId,
    pub dependencies: Vec<PackageRef>,
}

impl PartialEq for Manifest {
    fn eq(&self, other: &Self) -> bool {
        self.main == other.main
    }
}

impl Eq for Manifest {}

impl Hash for Manifest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.main.hash(state);
    }
}

impl Manifest {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            main: ModuleId::new(name, version),
            dependencies: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.main.name
    }

    pub fn version(&self) -> &Version {
        &self.main.version
    }

    /// Parses the descriptor text format:
    ///
    /// ```text
    /// {
    ///     module: "<name>-<major>.<minor>.<patch>"
    ///     dependencies: [
    ///         "<dep>-<maj>.<min>.<pat>",
    ///         ...
    ///     ]
    /// }
    /// ```
    ///
    /// Whitespace and newlines inside the dependency brackets are
    /// insignificant; the list may be empty.
    pub fn parse(text: &str) -> Result<Self> {
        let main = parse_quoted_module_ref(text, "module:")?;
        let deps_body = section_between(text, "dependencies:", '[', ']').ok_or_else(|| {
            JpmError::ManifestParse("missing 'dependencies: [...]' section".to_string())
        })?;

        let mut dependencies = Vec::new();
        for raw in deps_body.split(',') {
            let entry = raw.trim();
            if entry.is_empty() {
                continue;
            }
            let unquoted = entry.trim_matches('"');
            let (name, version) = split_name_version(unquoted).ok_or_else(|| {
                JpmError::ManifestParse(format!("invalid dependency reference '{entry}'"))
            })?;
            dependencies.push(PackageRef::resolved(name, version));
        }

        Ok(Self { main, dependencies })
    }

    /// Renders the canonical descriptor text. Fails if any dependency
    /// reference is still unresolved; an unresolved reference must never be
    /// written out.
    pub fn render(&self) -> Result<String> {
        let mut out = String::new();
        out.push_str("{\n");
        out.push_str(&format!("    module: \"{}\"\n", self.main));
        out.push_str("    dependencies: [");
        for (i, dep) in self.dependencies.iter().enumerate() {
            let version = dep.version.as_ref().ok_or_else(|| {
                JpmError::MalformedVersion(format!(
                    "dependency '{}' of '{}' has no version",
                    dep.name, self.main
                ))
            })?;
            if i != 0 {
                out.push(',');
            }
            out.push_str(&format!("\n        \"{}-{}\"", dep.name, version));
        }
        out.push_str("\n    ]\n}\n");
        Ok(out)
    }

    /// Derives a manifest from an artifact on disk: the embedded descriptor
    /// at [`EMBEDDED_DESCRIPTOR_PATH`] if the jar carries one, otherwise the
    /// `<name>-<version>.jar` filename convention (with an empty dependency
    /// list). Fails with `UnidentifiableArtifact` if neither source yields
    /// an identity.
    pub fn from_artifact(path: &Path) -> Result<Self> {
        if let Some(text) = read_embedded_descriptor(path)? {
            debug!("Found embedded descriptor in {}", path.display());
            return Self::parse(&text);
        }

        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        match parse_artifact_file_name(file_name) {
            Some(id) => {
                debug!(
                    "No embedded descriptor in {}; derived identity {} from filename",
                    path.display(),
                    id
                );
                Ok(Self {
                    main: id,
                    dependencies: Vec::new(),
                })
            }
            None => Err(JpmError::UnidentifiableArtifact(path.to_path_buf())),
        }
    }

    /// Whether the jar at `path` already carries an embedded descriptor.
    pub fn is_embedded_in(path: &Path) -> Result<bool> {
        Ok(read_embedded_descriptor(path)?.is_some())
    }

    /// Writes (or replaces) the rendered descriptor inside the jar at
    /// [`EMBEDDED_DESCRIPTOR_PATH`], so a published artifact is
    /// self-describing. The archive is rewritten through a temp file and
    /// renamed into place.
    pub fn embed_into_artifact(&self, path: &Path) -> Result<()> {
        let rendered = self.render()?;

        let src = File::open(path)?;
        let mut archive = ZipArchive::new(BufReader::new(src))
            .map_err(|e| JpmError::Archive(format!("cannot open {}: {e}", path.display())))?;

        // a failed rewrite must not leave the temp file next to the jar
        let tmp_path = path.with_extension("jar.tmp");
        let result = rewrite_with_descriptor(&mut archive, &tmp_path, &rendered)
            .and_then(|()| fs::rename(&tmp_path, path).map_err(JpmError::from));
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        debug!("Embedded descriptor for {} into {}", self.main, path.display());
        Ok(())
    }
}

fn rewrite_with_descriptor(
    archive: &mut ZipArchive<BufReader<File>>,
    tmp_path: &Path,
    rendered: &str,
) -> Result<()> {
    let out = File::create(tmp_path)?;
    let mut writer = ZipWriter::new(out);

    for i in 0..archive.len() {
        let entry = archive
            .by_index_raw(i)
            .map_err(|e| JpmError::Archive(format!("cannot read entry {i}: {e}")))?;
        if entry.name() == EMBEDDED_DESCRIPTOR_PATH {
            continue;
        }
        writer
            .raw_copy_file(entry)
            .map_err(|e| JpmError::Archive(format!("cannot copy entry: {e}")))?;
    }

    writer
        .start_file(EMBEDDED_DESCRIPTOR_PATH, SimpleFileOptions::default())
        .map_err(|e| JpmError::Archive(format!("cannot add descriptor: {e}")))?;
    writer.write_all(rendered.as_bytes())?;
    writer
        .finish()
        .map_err(|e| JpmError::Archive(format!("cannot finish archive: {e}")))?;
    Ok(())
}

/// Parses a `<name>-<major>.<minor>.<patch>.jar` filename into an identity.
/// The name may itself contain dashes; the version is anchored at the last
/// one.
pub fn parse_artifact_file_name(file_name: &str) -> Option<ModuleId> {
    let stem = file_name.strip_suffix(".jar")?;
    let (name, version) = split_name_version(stem)?;
    Some(ModuleId::new(name, version))
}

fn split_name_version(text: &str) -> Option<(&str, Version)> {
    let idx = text.rfind('-')?;
    let (name, rest) = (&text[..idx], &text[idx + 1..]);
    if name.is_empty() {
        return None;
    }
    let version = Version::from_str(rest).ok()?;
    Some((name, version))
}

fn parse_quoted_module_ref(text: &str, key: &str) -> Result<ModuleId> {
    let start = text
        .find(key)
        .ok_or_else(|| JpmError::ManifestParse(format!("missing '{key}' entry")))?;
    let after = &text[start + key.len()..];
    let open = after
        .find('"')
        .ok_or_else(|| JpmError::ManifestParse(format!("missing quoted value after '{key}'")))?;
    let rest = &after[open + 1..];
    let close = rest
        .find('"')
        .ok_or_else(|| JpmError::ManifestParse(format!("unterminated value after '{key}'")))?;
    let value = &rest[..close];
    let (name, version) = split_name_version(value)
        .ok_or_else(|| JpmError::ManifestParse(format!("invalid module reference '{value}'")))?;
    Ok(ModuleId::new(name, version))
}

fn section_between(text: &str, key: &str, open: char, close: char) -> Option<String> {
    let start = text.find(key)?;
    let after = &text[start + key.len()..];
    let open_idx = after.find(open)?;
    let rest = &after[open_idx + 1..];
    let close_idx = rest.find(close)?;
    Some(rest[..close_idx].to_string())
}

fn read_embedded_descriptor(path: &Path) -> Result<Option<String>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => return Err(e.into()),
    };
    let mut archive = match ZipArchive::new(BufReader::new(file)) {
        Ok(a) => a,
        // Not a zip at all; the filename convention is the only source left.
        Err(_) => return Ok(None),
    };
    let mut entry = match archive.by_name(EMBEDDED_DESCRIPTOR_PATH) {
        Ok(e) => e,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => {
            return Err(JpmError::Archive(format!(
                "cannot read descriptor from {}: {e}",
                path.display()
            )))
        }
    };
    let mut text = String::new();
    entry.read_to_string(&mut text)?;
    Ok(Some(text))
}
