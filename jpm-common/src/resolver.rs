use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::{JpmError, Result};
use crate::library::InstalledLookup;
use crate::manifest::{Manifest, ModuleId};
use crate::store::MetadataStore;
use crate::version::{Version, VersionRelation};

/// One root of a resolution run: an exact `(name, version)` pair or a
/// request for the latest known version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootRequest {
    pub name: String,
    pub version: Option<Version>,
}

impl RootRequest {
    pub fn exact(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version: Some(version),
        }
    }

    pub fn latest(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    /// Parses `name` or `name@1.2.3`.
    pub fn parse(text: &str) -> Result<Self> {
        match text.split_once('@') {
            Some((name, version)) => Ok(Self::exact(name, Version::from_str(version)?)),
            None => Ok(Self::latest(text)),
        }
    }
}

/// Everything a resolution run reads. Resolution is a pure function over
/// this context: same store contents, same installed set, same roots, same
/// output.
pub struct ResolutionContext<'a> {
    pub store: &'a dyn MetadataStore,
    pub installed: &'a dyn InstalledLookup,
}

/// The output of a resolution run: two disjoint, name-deduplicated sets of
/// manifests. Each package name appears at most once across the union.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Modules explicitly asked for by the caller.
    pub requested: Vec<Manifest>,
    /// Modules pulled in only because something else depends on them.
    pub transitive: Vec<Manifest>,
}

impl Resolution {
    pub fn iter_all(&self) -> impl Iterator<Item = &Manifest> {
        self.requested.iter().chain(self.transitive.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.requested.is_empty() && self.transitive.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requested.len() + self.transitive.len()
    }
}

/// Resolves the transitive closure of `roots` against the metadata store.
///
/// Roots already satisfied by an installed artifact are pruned before
/// traversal; their own dependency closures are not re-checked. Version
/// conflicts within a compatible major are settled in favor of the greatest
/// version; a major mismatch anywhere in the graph aborts the whole
/// resolution with `IncompatibleVersions` before anything is fetched.
pub fn resolve(ctx: &ResolutionContext<'_>, roots: &[RootRequest]) -> Result<Resolution> {
    debug!("Starting dependency resolution for {} root(s)", roots.len());

    // resolve roots, pruning those already satisfied locally
    let mut requested: Vec<Manifest> = Vec::new();
    for root in roots {
        let manifest = match &root.version {
            Some(version) => ctx.store.lookup(&root.name, version)?,
            None => ctx.store.lookup_latest(&root.name)?,
        }
        .ok_or_else(|| JpmError::UnknownPackage(root.name.clone()))?;

        if let Some(installed) = ctx.installed.installed_version(manifest.name())? {
            if installed == *manifest.version() {
                debug!(
                    "Root {} already installed, pruning it and its subtree",
                    manifest.main
                );
                continue;
            }
        }
        if !requested.contains(&manifest) {
            requested.push(manifest);
        }
    }

    // transitive closure over the dependency graph
    let mut transitive: Vec<Manifest> = Vec::new();
    let mut stack: Vec<ModuleId> = Vec::new();
    for manifest in &requested {
        push_dependencies(manifest, &mut stack)?;
    }
    while let Some(id) = stack.pop() {
        let already_seen = requested
            .iter()
            .chain(transitive.iter())
            .any(|m| m.main == id);
        if already_seen {
            continue;
        }
        let manifest = ctx
            .store
            .lookup(&id.name, &id.version)?
            .ok_or_else(|| JpmError::UnknownPackage(id.to_string()))?;
        push_dependencies(&manifest, &mut stack)?;
        transitive.push(manifest);
    }

    // conflict pass: one chosen version per name, roots win ties
    let mut chosen: HashMap<String, Version> = HashMap::new();
    for manifest in &requested {
        adopt_or_reconcile(&mut chosen, manifest.main.clone())?;
    }
    for manifest in &transitive {
        adopt_or_reconcile(&mut chosen, manifest.main.clone())?;
    }

    // rebuild both sets keeping only the chosen version per name, dropping
    // every superseded duplicate; winners of root names are promoted into
    // the requested set
    let root_names: HashSet<&str> = requested.iter().map(|m| m.name()).collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut final_requested: Vec<Manifest> = Vec::new();
    let mut final_transitive: Vec<Manifest> = Vec::new();
    for manifest in requested.iter().chain(transitive.iter()) {
        let name = manifest.name();
        if !seen.insert(name.to_string()) {
            continue;
        }
        let winning_version = chosen[name];
        let winner = requested
            .iter()
            .chain(transitive.iter())
            .find(|m| m.name() == name && *m.version() == winning_version)
            .cloned()
            .ok_or_else(|| {
                JpmError::Store(format!(
                    "chosen version {name}-{winning_version} vanished during resolution"
                ))
            })?;
        if winning_version != *manifest.version() {
            warn!(
                "Superseding {}-{} with {}",
                name,
                manifest.version(),
                winner.main
            );
        }
        if root_names.contains(name) {
            final_requested.push(winner);
        } else {
            final_transitive.push(winner);
        }
    }

    debug!(
        "Resolution complete: {} requested, {} transitive",
        final_requested.len(),
        final_transitive.len()
    );
    Ok(Resolution {
        requested: final_requested,
        transitive: final_transitive,
    })
}

fn push_dependencies(manifest: &Manifest, stack: &mut Vec<ModuleId>) -> Result<()> {
    for dep in &manifest.dependencies {
        let version = dep.version.ok_or_else(|| {
            JpmError::MalformedVersion(format!(
                "stored dependency '{}' of '{}' is unresolved",
                dep.name, manifest.main
            ))
        })?;
        stack.push(ModuleId::new(dep.name.clone(), version));
    }
    Ok(())
}

fn adopt_or_reconcile(chosen: &mut HashMap<String, Version>, candidate: ModuleId) -> Result<()> {
    match chosen.get(&candidate.name) {
        None => {
            chosen.insert(candidate.name, candidate.version);
            Ok(())
        }
        Some(incumbent) => match candidate.version.relation(incumbent) {
            VersionRelation::MajorIncompatible => Err(JpmError::IncompatibleVersions {
                name: candidate.name.clone(),
                v1: *incumbent,
                v2: candidate.version,
            }),
            VersionRelation::Greater => {
                debug!(
                    "Choosing {}-{} over {}-{}",
                    candidate.name, candidate.version, candidate.name, incumbent
                );
                chosen.insert(candidate.name, candidate.version);
                Ok(())
            }
            VersionRelation::Less | VersionRelation::Equal => Ok(()),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;
    use crate::manifest::PackageRef;

    fn v(major: u64, minor: u64, patch: u64) -> Version {
        Version::new(major, minor, patch)
    }

    /// In-memory store fixture that records every lookup it serves.
    #[derive(Default)]
    struct MemStore {
        manifests: HashMap<(String, Version), Manifest>,
        lookups: RefCell<Vec<String>>,
    }

    impl MemStore {
        fn with(&mut self, name: &str, version: Version, deps: &[(&str, Version)]) -> &mut Self {
            let mut m = Manifest::new(name, version);
            for (dep_name, dep_version) in deps {
                m.dependencies
                    .push(PackageRef::resolved(*dep_name, *dep_version));
            }
            self.manifests.insert((name.to_string(), version), m);
            self
        }

        fn lookups(&self) -> Vec<String> {
            self.lookups.borrow().clone()
        }
    }

    impl MetadataStore for MemStore {
        fn record(&self, _manifest: &Manifest) -> Result<()> {
            unreachable!("resolution never writes to the store")
        }

        fn lookup(&self, name: &str, version: &Version) -> Result<Option<Manifest>> {
            self.lookups.borrow_mut().push(format!("{name}-{version}"));
            Ok(self.manifests.get(&(name.to_string(), *version)).cloned())
        }

        fn lookup_latest(&self, name: &str) -> Result<Option<Manifest>> {
            self.lookups.borrow_mut().push(format!("{name}-latest"));
            Ok(self
                .manifests
                .iter()
                .filter(|((n, _), _)| n == name)
                .max_by_key(|((_, version), _)| *version)
                .map(|(_, m)| m.clone()))
        }
    }

    struct NothingInstalled;

    impl InstalledLookup for NothingInstalled {
        fn installed_version(&self, _name: &str) -> Result<Option<Version>> {
            Ok(None)
        }
    }

    struct Installed(HashMap<String, Version>);

    impl InstalledLookup for Installed {
        fn installed_version(&self, name: &str) -> Result<Option<Version>> {
            Ok(self.0.get(name).copied())
        }
    }

    fn names_and_versions(set: &[Manifest]) -> Vec<(String, Version)> {
        set.iter()
            .map(|m| (m.name().to_string(), *m.version()))
            .collect()
    }

    fn assert_union_is_name_unique(resolution: &Resolution) {
        let mut seen = HashSet::new();
        for m in resolution.iter_all() {
            assert!(
                seen.insert(m.name().to_string()),
                "duplicate name '{}' across output sets",
                m.name()
            );
        }
    }

    #[test]
    fn resolves_simple_closure() {
        let mut store = MemStore::default();
        store
            .with("app", v(1, 0, 0), &[("lib", v(2, 1, 0))])
            .with("lib", v(2, 1, 0), &[("util", v(3, 0, 0))])
            .with("util", v(3, 0, 0), &[]);
        let ctx = ResolutionContext {
            store: &store,
            installed: &NothingInstalled,
        };
        let resolution = resolve(&ctx, &[RootRequest::exact("app", v(1, 0, 0))]).unwrap();

        assert_eq!(
            names_and_versions(&resolution.requested),
            vec![("app".to_string(), v(1, 0, 0))]
        );
        let transitive: HashSet<_> = names_and_versions(&resolution.transitive)
            .into_iter()
            .collect();
        assert_eq!(
            transitive,
            HashSet::from([("lib".to_string(), v(2, 1, 0)), ("util".to_string(), v(3, 0, 0))])
        );
        assert_union_is_name_unique(&resolution);
    }

    #[test]
    fn latest_root_resolves_via_lookup_latest() {
        let mut store = MemStore::default();
        store
            .with("lib", v(1, 9, 0), &[])
            .with("lib", v(1, 10, 0), &[]);
        let ctx = ResolutionContext {
            store: &store,
            installed: &NothingInstalled,
        };
        let resolution = resolve(&ctx, &[RootRequest::latest("lib")]).unwrap();
        assert_eq!(*resolution.requested[0].version(), v(1, 10, 0));
    }

    #[test]
    fn unknown_root_fails() {
        let store = MemStore::default();
        let ctx = ResolutionContext {
            store: &store,
            installed: &NothingInstalled,
        };
        let err = resolve(&ctx, &[RootRequest::latest("ghost")]).unwrap_err();
        assert!(matches!(err, JpmError::UnknownPackage(name) if name == "ghost"));
    }

    #[test]
    fn major_conflict_aborts_resolution() {
        // app@1.0.0 -> lib@1.0.0 -> util@2.0.0, and app -> util@1.0.0
        let mut store = MemStore::default();
        store
            .with(
                "app",
                v(1, 0, 0),
                &[("lib", v(1, 0, 0)), ("util", v(1, 0, 0))],
            )
            .with("lib", v(1, 0, 0), &[("util", v(2, 0, 0))])
            .with("util", v(1, 0, 0), &[])
            .with("util", v(2, 0, 0), &[]);
        let ctx = ResolutionContext {
            store: &store,
            installed: &NothingInstalled,
        };
        let err = resolve(&ctx, &[RootRequest::exact("app", v(1, 0, 0))]).unwrap_err();
        match err {
            JpmError::IncompatibleVersions { name, v1, v2 } => {
                assert_eq!(name, "util");
                assert_eq!(
                    HashSet::from([v1, v2]),
                    HashSet::from([v(1, 0, 0), v(2, 0, 0)])
                );
            }
            other => panic!("expected IncompatibleVersions, got {other:?}"),
        }
    }

    #[test]
    fn compatible_conflict_keeps_greatest_version_only() {
        // roots: app@1.0.0 and util@3.0.1; lib@2.1.0 depends on util@3.0.0
        let mut store = MemStore::default();
        store
            .with("app", v(1, 0, 0), &[("lib", v(2, 1, 0))])
            .with("lib", v(2, 1, 0), &[("util", v(3, 0, 0))])
            .with("util", v(3, 0, 0), &[])
            .with("util", v(3, 0, 1), &[]);
        let ctx = ResolutionContext {
            store: &store,
            installed: &NothingInstalled,
        };
        let resolution = resolve(
            &ctx,
            &[
                RootRequest::exact("app", v(1, 0, 0)),
                RootRequest::exact("util", v(3, 0, 1)),
            ],
        )
        .unwrap();

        let utils: Vec<_> = resolution
            .iter_all()
            .filter(|m| m.name() == "util")
            .collect();
        assert_eq!(utils.len(), 1);
        assert_eq!(*utils[0].version(), v(3, 0, 1));
        // util was a root, so the winner lives in the requested set
        assert!(resolution.requested.iter().any(|m| m.name() == "util"));
        assert_union_is_name_unique(&resolution);
    }

    #[test]
    fn greater_transitive_version_supersedes_a_root() {
        // the root asks for util@3.0.0 but lib pulls util@3.1.0; the greater
        // compatible version wins and is promoted into the requested set
        let mut store = MemStore::default();
        store
            .with("app", v(1, 0, 0), &[("lib", v(2, 0, 0))])
            .with("lib", v(2, 0, 0), &[("util", v(3, 1, 0))])
            .with("util", v(3, 0, 0), &[])
            .with("util", v(3, 1, 0), &[]);
        let ctx = ResolutionContext {
            store: &store,
            installed: &NothingInstalled,
        };
        let resolution = resolve(
            &ctx,
            &[
                RootRequest::exact("app", v(1, 0, 0)),
                RootRequest::exact("util", v(3, 0, 0)),
            ],
        )
        .unwrap();

        let requested = names_and_versions(&resolution.requested);
        assert!(requested.contains(&("util".to_string(), v(3, 1, 0))));
        assert!(!resolution
            .iter_all()
            .any(|m| *m.version() == v(3, 0, 0) && m.name() == "util"));
        assert_union_is_name_unique(&resolution);
    }

    #[test]
    fn every_superseded_duplicate_is_removed() {
        // three distinct compatible versions of the same name reachable
        // through different paths; only the greatest survives
        let mut store = MemStore::default();
        store
            .with(
                "app",
                v(1, 0, 0),
                &[("a", v(1, 0, 0)), ("b", v(1, 0, 0)), ("util", v(3, 0, 0))],
            )
            .with("a", v(1, 0, 0), &[("util", v(3, 1, 0))])
            .with("b", v(1, 0, 0), &[("util", v(3, 2, 0))])
            .with("util", v(3, 0, 0), &[])
            .with("util", v(3, 1, 0), &[])
            .with("util", v(3, 2, 0), &[]);
        let ctx = ResolutionContext {
            store: &store,
            installed: &NothingInstalled,
        };
        let resolution = resolve(&ctx, &[RootRequest::exact("app", v(1, 0, 0))]).unwrap();

        let utils: Vec<_> = resolution
            .iter_all()
            .filter(|m| m.name() == "util")
            .collect();
        assert_eq!(utils.len(), 1, "stale superseded versions must be gone");
        assert_eq!(*utils[0].version(), v(3, 2, 0));
        assert_union_is_name_unique(&resolution);
    }

    #[test]
    fn cycles_terminate() {
        let mut store = MemStore::default();
        store
            .with("a", v(1, 0, 0), &[("b", v(1, 0, 0))])
            .with("b", v(1, 0, 0), &[("a", v(1, 0, 0))]);
        let ctx = ResolutionContext {
            store: &store,
            installed: &NothingInstalled,
        };
        let resolution = resolve(&ctx, &[RootRequest::exact("a", v(1, 0, 0))]).unwrap();
        assert_eq!(resolution.len(), 2);
        assert_union_is_name_unique(&resolution);
    }

    #[test]
    fn installed_root_is_pruned_and_its_subtree_never_queried() {
        let mut store = MemStore::default();
        store
            .with("app", v(1, 0, 0), &[("lib", v(2, 0, 0))])
            .with("lib", v(2, 0, 0), &[]);
        let installed = Installed(HashMap::from([("app".to_string(), v(1, 0, 0))]));
        let ctx = ResolutionContext {
            store: &store,
            installed: &installed,
        };
        let resolution = resolve(&ctx, &[RootRequest::exact("app", v(1, 0, 0))]).unwrap();

        assert!(resolution.is_empty());
        assert!(
            !store.lookups().iter().any(|l| l.starts_with("lib")),
            "pruned root's dependencies must not be queried, got {:?}",
            store.lookups()
        );
    }

    #[test]
    fn older_installed_version_does_not_prune() {
        let mut store = MemStore::default();
        store.with("app", v(1, 1, 0), &[]);
        let installed = Installed(HashMap::from([("app".to_string(), v(1, 0, 0))]));
        let ctx = ResolutionContext {
            store: &store,
            installed: &installed,
        };
        let resolution = resolve(&ctx, &[RootRequest::exact("app", v(1, 1, 0))]).unwrap();
        assert_eq!(resolution.requested.len(), 1);
    }

    #[test]
    fn resolution_is_idempotent() {
        let mut store = MemStore::default();
        store
            .with("app", v(1, 0, 0), &[("lib", v(2, 1, 0)), ("misc", v(1, 2, 3))])
            .with("lib", v(2, 1, 0), &[("util", v(3, 0, 0))])
            .with("misc", v(1, 2, 3), &[("util", v(3, 0, 1))])
            .with("util", v(3, 0, 0), &[])
            .with("util", v(3, 0, 1), &[]);
        let ctx = ResolutionContext {
            store: &store,
            installed: &NothingInstalled,
        };
        let roots = [RootRequest::exact("app", v(1, 0, 0))];
        let first = resolve(&ctx, &roots).unwrap();
        let second = resolve(&ctx, &roots).unwrap();
        assert_eq!(
            names_and_versions(&first.requested),
            names_and_versions(&second.requested)
        );
        assert_eq!(
            names_and_versions(&first.transitive),
            names_and_versions(&second.transitive)
        );
    }

    #[test]
    fn root_request_parsing() {
        assert_eq!(
            RootRequest::parse("lib@1.2.3").unwrap(),
            RootRequest::exact("lib", v(1, 2, 3))
        );
        assert_eq!(RootRequest::parse("lib").unwrap(), RootRequest::latest("lib"));
        assert!(RootRequest::parse("lib@not.a.version").is_err());
    }
}
