// jpm/src/cli/publish.rs
use jpm_common::config::Config;
use jpm_common::error::Result;
use jpm_net::{ArtifactTransport, RemoteStore};

use super::PublishArgs;

pub fn run(args: &PublishArgs, config: &Config) -> Result<()> {
    let remote = RemoteStore::new(config);
    let transport = ArtifactTransport::new(config);
    for jar in &args.jars {
        let manifest = transport.publish(jar, &remote)?;
        println!("Published {}", manifest.main);
    }
    Ok(())
}
