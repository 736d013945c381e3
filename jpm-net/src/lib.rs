// jpm-net/src/lib.rs
mod http;
pub mod store;
pub mod transport;

pub use store::RemoteStore;
pub use transport::ArtifactTransport;
