use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::version::Version;

#[derive(Error, Debug, Clone)]
pub enum JpmError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("Malformed version '{0}': expected <major>.<minor>.<patch>")]
    MalformedVersion(String),

    #[error("Unknown package '{0}': not found in the metadata store")]
    UnknownPackage(String),

    #[error("Incompatible versions for '{name}': {v1} and {v2} differ in major version")]
    IncompatibleVersions {
        name: String,
        v1: Version,
        v2: Version,
    },

    #[error("Could not identify artifact {0}: no embedded descriptor and no <name>-<version>.jar filename")]
    UnidentifiableArtifact(PathBuf),

    #[error("No version information available for artifact {0}")]
    UnversionedArtifact(PathBuf),

    #[error("Transfer failed for '{what}' ({url}): {reason}")]
    TransferFailed {
        what: String,
        url: String,
        reason: String,
    },

    #[error("Artifact '{0}' is already published")]
    DuplicateArtifact(String),

    #[error("Manifest parse error: {0}")]
    ManifestParse(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Store Error: {0}")]
    Store(String),

    #[error("Archive Error: {0}")]
    Archive(String),
}

impl From<std::io::Error> for JpmError {
    fn from(err: std::io::Error) -> Self {
        JpmError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for JpmError {
    fn from(err: reqwest::Error) -> Self {
        JpmError::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for JpmError {
    fn from(err: serde_json::Error) -> Self {
        JpmError::Json(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, JpmError>;
