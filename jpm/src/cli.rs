// jpm/src/cli.rs
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub mod get;
pub mod install;
pub mod publish;

#[derive(Parser, Debug)]
#[command(name = "jpm", version, about = "Package manager for versioned Java binary modules")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve a module's dependency graph and download all artifacts
    Get(GetArgs),
    /// Upload artifacts to the shared repository and register them
    Publish(PublishArgs),
    /// Register an artifact in the local repository
    Install(InstallArgs),
}

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Module to fetch, as `name` (latest) or `name@major.minor.patch`
    pub modules: Vec<String>,

    /// Pin the version of a single requested module
    #[arg(long)]
    pub version: Option<String>,

    /// Project library directory to download into
    #[arg(long, default_value = "lib")]
    pub lib_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Jar artifacts to upload
    #[arg(required = true)]
    pub jars: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Jar artifact to register locally
    pub jar: PathBuf,
}
