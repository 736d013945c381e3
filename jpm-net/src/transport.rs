use std::fs;
use std::path::{Path, PathBuf};

use jpm_common::config::Config;
use jpm_common::error::{JpmError, Result};
use jpm_common::library::{LibSlot, LibraryRegistry};
use jpm_common::manifest::{Manifest, ModuleId};
use jpm_common::resolver::Resolution;
use jpm_common::store::MetadataStore;
use tracing::{debug, error, info};

use crate::http::{build_http_client, with_auth};

/// Remote directory artifacts are published under.
const REMOTE_ARTIFACT_DIR: &str = "jpm";

/// Moves artifact bytes between the local library slots and the shared
/// repository, addressing artifacts by the `jpm/<name>-<version>.jar`
/// convention. Transfers are blocking, never retried, and every connection
/// is dropped when its call returns.
#[derive(Debug, Clone)]
pub struct ArtifactTransport {
    artifact_base: String,
    token: Option<String>,
}

impl ArtifactTransport {
    pub fn new(config: &Config) -> Self {
        Self {
            artifact_base: config.registry_endpoint(REMOTE_ARTIFACT_DIR),
            token: config.registry_token.clone(),
        }
    }

    /// Remote URL of an artifact.
    pub fn artifact_url(&self, id: &ModuleId) -> String {
        format!("{}/{}", self.artifact_base, id.artifact_file_name())
    }

    /// Downloads one artifact into `dest_dir`, through a temp file renamed
    /// into place. Fails with `TransferFailed` on connection or HTTP
    /// errors; does not retry.
    pub fn fetch(&self, id: &ModuleId, dest_dir: &Path) -> Result<PathBuf> {
        let url = self.artifact_url(id);
        let final_path = dest_dir.join(id.artifact_file_name());
        info!("Downloading {} as {}", url, final_path.display());

        fs::create_dir_all(dest_dir)?;
        let client = build_http_client()?;
        let response = with_auth(client.get(&url), self.token.as_deref())
            .send()
            .map_err(|e| transfer_failed(id, &url, &format!("connection failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(transfer_failed(id, &url, &format!("HTTP status {status}")));
        }

        let bytes = response
            .bytes()
            .map_err(|e| transfer_failed(id, &url, &format!("read failed: {e}")))?;

        let temp_path = dest_dir.join(format!(".{}.download", id.artifact_file_name()));
        fs::write(&temp_path, &bytes)?;
        if let Err(e) = fs::rename(&temp_path, &final_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        debug!("Fetched {} ({} bytes)", final_path.display(), bytes.len());
        Ok(final_path)
    }

    /// Downloads every artifact of a resolution into its library slot:
    /// requested modules into `main`, transitively pulled ones into
    /// `transitive`. Fail-fast: the first failed transfer aborts the bulk
    /// fetch.
    pub fn fetch_all(
        &self,
        resolution: &Resolution,
        library: &LibraryRegistry,
    ) -> Result<Vec<PathBuf>> {
        let mut fetched = Vec::with_capacity(resolution.len());
        let slotted = resolution
            .requested
            .iter()
            .map(|m| (LibSlot::Main, m))
            .chain(resolution.transitive.iter().map(|m| (LibSlot::Transitive, m)));
        for (slot, manifest) in slotted {
            let dest_dir = library.slot_dir(slot)?;
            match self.fetch(&manifest.main, &dest_dir) {
                Ok(path) => fetched.push(path),
                Err(e) => {
                    error!("Aborting bulk fetch after failure on {}: {e}", manifest.main);
                    return Err(e);
                }
            }
        }
        Ok(fetched)
    }

    /// Uploads one artifact under the naming convention, then records its
    /// manifest into the given (shared) metadata store. The artifact is
    /// made self-describing first: if it carries no embedded descriptor,
    /// the derived one is written into it. Nothing is recorded when the
    /// upload fails.
    pub fn publish(&self, jar: &Path, store: &dyn MetadataStore) -> Result<Manifest> {
        let manifest = match Manifest::from_artifact(jar) {
            Ok(m) => m,
            // a jar-named artifact that failed identification is missing
            // its version and cannot be addressed remotely; anything else
            // stays unidentifiable
            Err(JpmError::UnidentifiableArtifact(path)) => {
                let is_jar = path.extension().is_some_and(|ext| ext == "jar");
                return Err(if is_jar {
                    JpmError::UnversionedArtifact(path)
                } else {
                    JpmError::UnidentifiableArtifact(path)
                });
            }
            Err(e) => return Err(e),
        };

        if !Manifest::is_embedded_in(jar)? {
            debug!(
                "Embedding filename-derived descriptor for {} before upload",
                manifest.main
            );
            manifest.embed_into_artifact(jar)?;
        }

        let url = self.artifact_url(&manifest.main);
        info!("Uploading {} as {}", jar.display(), url);
        let bytes = fs::read(jar)?;
        let client = build_http_client()?;
        let response = with_auth(client.put(&url), self.token.as_deref())
            .body(bytes)
            .send()
            .map_err(|e| transfer_failed(&manifest.main, &url, &format!("connection failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(transfer_failed(
                &manifest.main,
                &url,
                &format!("HTTP status {status}"),
            ));
        }

        store.record(&manifest)?;
        Ok(manifest)
    }
}

fn transfer_failed(id: &ModuleId, url: &str, reason: &str) -> JpmError {
    JpmError::TransferFailed {
        what: id.to_string(),
        url: url.to_string(),
        reason: reason.to_string(),
    }
}
