// jpm/src/main.rs
use std::process;

use clap::Parser;
use colored::Colorize;
use jpm_common::config::Config;
use jpm_common::error::Result;
use tracing::debug;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{CliArgs, Command};

fn init_logging(verbose: u8) {
    let level_filter = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

fn run(args: &CliArgs, config: &Config) -> Result<()> {
    match &args.command {
        Command::Get(get_args) => cli::get::run(get_args, config),
        Command::Publish(publish_args) => cli::publish::run(publish_args, config),
        Command::Install(install_args) => cli::install::run(install_args, config),
    }
}

fn main() {
    let args = CliArgs::parse();
    init_logging(args.verbose);

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: could not load configuration: {e}", "Error".red().bold());
            process::exit(1);
        }
    };
    debug!("Using repository at {}", config.jpm_home().display());

    if let Err(e) = run(&args, &config) {
        eprintln!("{}: {e}", "Error".red().bold());
        process::exit(1);
    }
}
