pub mod adapter;
pub mod context;
pub mod curseforge;
pub mod github;
pub mod modrinth;

pub use adapter::{capabilities_for, Adapter, Capability, PlatformAdapter, RemoteRelease};
pub use context::PublishContext;

use std::path::Path;

use crate::core::error::{PublisherError, PublisherResult};
use crate::core::manifest::Artifact;

pub(crate) async fn read_artifact(path: &Path) -> PublisherResult<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|source| PublisherError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn mime_for(artifact: &Artifact) -> &'static str {
    if artifact.is_jar() {
        "application/java-archive"
    } else {
        "application/octet-stream"
    }
}
