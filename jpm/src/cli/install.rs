// jpm/src/cli/install.rs
use std::fs;

use jpm_common::config::Config;
use jpm_common::error::Result;
use jpm_common::manifest::Manifest;
use jpm_common::store::{LocalStore, MetadataStore};
use tracing::info;

use super::InstallArgs;

pub fn run(args: &InstallArgs, config: &Config) -> Result<()> {
    let manifest = Manifest::from_artifact(&args.jar)?;

    let lib_dir = config.lib_dir();
    fs::create_dir_all(&lib_dir)?;
    let dest = lib_dir.join(manifest.main.artifact_file_name());
    info!("Copying {} to {}", args.jar.display(), dest.display());
    fs::copy(&args.jar, &dest)?;

    let store = LocalStore::new(config);
    store.record(&manifest)?;

    println!("Installed {} into {}", manifest.main, lib_dir.display());
    Ok(())
}
