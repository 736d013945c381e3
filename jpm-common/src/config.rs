use std::env;
use std::path::{Path, PathBuf};

use directories::UserDirs;
use tracing::debug;

use crate::error::Result;

const DEFAULT_REGISTRY_URL: &str = "http://localhost:8080";
const REPOSITORY_DIR_NAME: &str = ".jpm";
const STORE_FILE_NAME: &str = "jpm-store.json";

/// Runtime configuration: where the local repository lives and how to reach
/// the shared registry.
#[derive(Debug, Clone)]
pub struct Config {
    pub jpm_home: PathBuf,
    pub registry_url: String,
    pub registry_token: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        debug!("Loading jpm configuration");

        let jpm_home = env::var("JPM_HOME")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                UserDirs::new()
                    .map_or_else(|| PathBuf::from("/"), |ud| ud.home_dir().to_path_buf())
                    .join(REPOSITORY_DIR_NAME)
            });

        let registry_url = env::var("JPM_REGISTRY")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                debug!(
                    "JPM_REGISTRY not set, falling back to default: {}",
                    DEFAULT_REGISTRY_URL
                );
                DEFAULT_REGISTRY_URL.to_string()
            });

        let registry_token = env::var("JPM_TOKEN").ok().filter(|s| !s.is_empty());

        debug!("Effective JPM_HOME set to: {}", jpm_home.display());
        Ok(Self {
            jpm_home,
            registry_url,
            registry_token,
        })
    }

    pub fn jpm_home(&self) -> &Path {
        &self.jpm_home
    }

    /// Shared library directory of the local repository.
    pub fn lib_dir(&self) -> PathBuf {
        self.jpm_home.join("lib")
    }

    /// Backing file of the local metadata store.
    pub fn store_path(&self) -> PathBuf {
        self.jpm_home.join(STORE_FILE_NAME)
    }

    /// Trailing-slash-insensitive join against the registry base URL.
    pub fn registry_endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.registry_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
