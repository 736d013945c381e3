// jpm-common/src/lib.rs
pub mod config;
pub mod error;
pub mod library;
pub mod manifest;
pub mod resolver;
pub mod store;
pub mod version;

// Re-export key types
pub use config::Config;
pub use error::{JpmError, Result};
pub use library::{InstalledLookup, LibSlot, LibraryRegistry};
pub use manifest::{Manifest, ModuleId, PackageRef};
pub use resolver::{resolve, Resolution, ResolutionContext, RootRequest};
pub use store::{LocalStore, MetadataStore};
pub use version::{Version, VersionRelation};
