// jpm/src/cli/get.rs
use std::str::FromStr;

use jpm_common::config::Config;
use jpm_common::error::{JpmError, Result};
use jpm_common::resolver::{resolve, ResolutionContext, RootRequest};
use jpm_common::store::{LocalStore, MetadataStore};
use jpm_common::version::Version;
use jpm_common::LibraryRegistry;
use jpm_net::{ArtifactTransport, RemoteStore};
use tracing::info;

use super::GetArgs;

pub fn run(args: &GetArgs, config: &Config) -> Result<()> {
    let mut roots = Vec::with_capacity(args.modules.len());
    for module in &args.modules {
        roots.push(RootRequest::parse(module)?);
    }
    if let Some(version) = &args.version {
        match roots.as_mut_slice() {
            [root] if root.version.is_none() => {
                root.version = Some(Version::from_str(version)?);
            }
            _ => {
                return Err(JpmError::Config(
                    "--version applies to exactly one unpinned module".to_string(),
                ))
            }
        }
    }
    if roots.is_empty() {
        return Err(JpmError::Config("no modules requested".to_string()));
    }

    let remote = RemoteStore::new(config);
    let library = LibraryRegistry::new(args.lib_dir.clone());
    let ctx = ResolutionContext {
        store: &remote,
        installed: &library,
    };
    let resolution = resolve(&ctx, &roots)?;
    if resolution.is_empty() {
        println!("Everything requested is already installed.");
        return Ok(());
    }

    let transport = ArtifactTransport::new(config);
    let fetched = transport.fetch_all(&resolution, &library)?;

    // remember what we just pulled so later runs can resolve offline
    let local = LocalStore::new(config);
    for manifest in resolution.iter_all() {
        local.record(manifest)?;
    }

    info!("Fetched {} artifact(s)", fetched.len());
    for manifest in &resolution.requested {
        println!("Fetched {} -> {}/main", manifest.main, args.lib_dir.display());
    }
    for manifest in &resolution.transitive {
        println!(
            "Fetched {} -> {}/transitive (dependency)",
            manifest.main,
            args.lib_dir.display()
        );
    }
    Ok(())
}
