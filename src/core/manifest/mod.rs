pub mod changelog;
pub mod loader;
pub mod model;
pub mod raw;

pub use loader::{clean_github_repo, ManifestFormat, ManifestLoader, DEFAULT_MANIFEST};
pub use model::{
    Artifact, Checks, CurseEnvironment, CurseForgeTarget, DependencyDeclaration, DependencyKind,
    GithubTarget, ModLoader, ModrinthTarget, Platform, ReleaseManifest, VersionType,
};
