use jpm_common::config::Config;
use jpm_common::error::{JpmError, Result};
use jpm_common::manifest::Manifest;
use jpm_common::store::MetadataStore;
use jpm_common::version::Version;
use reqwest::StatusCode;
use tracing::debug;

use crate::http::{build_http_client, with_auth};

/// Client for the shared, server-backed metadata store.
///
/// The registry enforces `(name, version)` uniqueness, which is what makes
/// concurrent publication of the same artifact safe. Duplicate policy:
/// recording an already-present `(name, version)` fails with
/// `DuplicateArtifact` (the server answers 409).
#[derive(Debug, Clone)]
pub struct RemoteStore {
    modules_url: String,
    token: Option<String>,
}

impl RemoteStore {
    pub fn new(config: &Config) -> Self {
        Self {
            modules_url: config.registry_endpoint("api/modules"),
            token: config.registry_token.clone(),
        }
    }

    fn module_url(&self, name: &str) -> String {
        format!("{}/{}", self.modules_url, name)
    }

    fn module_version_url(&self, name: &str, version: &Version) -> String {
        format!("{}/{}/{}", self.modules_url, name, version)
    }

    fn get_manifest(&self, url: &str) -> Result<Option<Manifest>> {
        let client = build_http_client()?;
        let response = with_auth(client.get(url), self.token.as_deref()).send()?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json::<Manifest>()?)),
            status => Err(JpmError::Store(format!(
                "registry answered {status} for {url}"
            ))),
        }
    }
}

impl MetadataStore for RemoteStore {
    fn record(&self, manifest: &Manifest) -> Result<()> {
        for dep in &manifest.dependencies {
            if !dep.is_resolved() {
                return Err(JpmError::MalformedVersion(format!(
                    "dependency '{}' of '{}' is unresolved",
                    dep.name, manifest.main
                )));
            }
        }

        let url = &self.modules_url;
        debug!("Recording {} at {}", manifest.main, url);
        let client = build_http_client()?;
        let response = with_auth(client.put(url), self.token.as_deref())
            .json(manifest)
            .send()?;
        match response.status() {
            StatusCode::CONFLICT => Err(JpmError::DuplicateArtifact(manifest.main.to_string())),
            status if status.is_success() => Ok(()),
            status => Err(JpmError::Store(format!(
                "registry refused to record {}: {status}",
                manifest.main
            ))),
        }
    }

    fn lookup(&self, name: &str, version: &Version) -> Result<Option<Manifest>> {
        self.get_manifest(&self.module_version_url(name, version))
    }

    fn lookup_latest(&self, name: &str) -> Result<Option<Manifest>> {
        let url = self.module_url(name);
        let client = build_http_client()?;
        let response = with_auth(client.get(&url), self.token.as_deref()).send()?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let all: Vec<Manifest> = response.json()?;
                Ok(all.into_iter().max_by_key(|m| *m.version()))
            }
            status => Err(JpmError::Store(format!(
                "registry answered {status} for {url}"
            ))),
        }
    }
}
