use crate::core::checks::ArtifactDigest;
use crate::core::credentials::Secret;
use crate::core::manifest::{DependencyDeclaration, ReleaseManifest};

/// Everything one adapter needs for one publish attempt.
/// Borrowed from the coordinator; adapters never mutate it.
pub struct PublishContext<'a> {
    pub manifest: &'a ReleaseManifest,
    /// Resolved dependencies for this adapter's platform only.
    pub dependencies: &'a [DependencyDeclaration],
    pub credential: &'a Secret,
    pub digests: &'a [ArtifactDigest],
    /// Build and log payloads without any network call.
    pub dry_run: bool,
}

impl PublishContext<'_> {
    pub fn digest_for(&self, path: &std::path::Path) -> Option<&ArtifactDigest> {
        self.digests.iter().find(|d| d.path == path)
    }
}
