mod client;
pub mod discovery;
#[cfg(test)]
pub mod fake;
pub mod selector;

pub use client::{ClusterClient, KubeClusterClient};
pub use discovery::{DEFAULT_NAMESPACE, RestMapper, RestMapping};
