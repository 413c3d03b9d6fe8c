mod digest;
mod jar;

pub use digest::ArtifactDigest;
pub use jar::check_jar_contents;

use std::path::PathBuf;

use tracing::debug;

use crate::core::error::{PublisherError, PublisherResult};
use crate::core::manifest::ReleaseManifest;

/// Local, network-free artifact checks run before publishing.
///
/// Primary jars (the first artifact of each targeted platform) must carry
/// loader metadata unless the manifest disables the check. Every artifact
/// is hashed.
pub async fn run_local_checks(manifest: &ReleaseManifest) -> PublisherResult<Vec<ArtifactDigest>> {
    if manifest.checks().empty_jar {
        let mut primaries: Vec<PathBuf> = Vec::new();
        for platform in manifest.targets() {
            if let Some(primary) = manifest.artifacts_for(platform).first() {
                if primary.is_jar() && !primaries.contains(&primary.path) {
                    primaries.push(primary.path.clone());
                }
            }
        }

        for path in primaries {
            let loaders = manifest.loaders().to_vec();
            debug!("Checking jar contents of {:?}", path);
            tokio::task::spawn_blocking(move || check_jar_contents(&path, &loaders))
                .await
                .map_err(|e| PublisherError::Other(format!("jar check task failed: {}", e)))??;
        }
    }

    let mut digests = Vec::with_capacity(manifest.artifacts().len());
    for artifact in manifest.artifacts() {
        digests.push(ArtifactDigest::compute(&artifact.path).await?);
    }
    Ok(digests)
}
