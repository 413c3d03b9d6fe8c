use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A platform a release can be published to.
///
/// Variant order is the order results are reported in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[serde(alias = "curse")]
    CurseForge,
    Modrinth,
    Github,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::CurseForge, Platform::Modrinth, Platform::Github];

    /// Environment keys consulted for this platform's token, in priority order.
    pub fn credential_keys(&self) -> &'static [&'static str] {
        match self {
            Platform::CurseForge => &["CURSE_TOKEN", "CURSEFORGE_TOKEN"],
            Platform::Modrinth => &["MODRINTH_TOKEN"],
            Platform::Github => &["GITHUB_TOKEN"],
        }
    }

    pub fn requires_game_versions(&self) -> bool {
        matches!(self, Platform::CurseForge | Platform::Modrinth)
    }

    pub fn requires_loaders(&self) -> bool {
        matches!(self, Platform::Modrinth)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "curseforge" | "curse" => Some(Platform::CurseForge),
            "modrinth" => Some(Platform::Modrinth),
            "github" => Some(Platform::Github),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::CurseForge => write!(f, "curseforge"),
            Platform::Modrinth => write!(f, "modrinth"),
            Platform::Github => write!(f, "github"),
        }
    }
}

/// Mod loaders a release can declare support for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum ModLoader {
    Fabric,
    Forge,
    Quilt,
    NeoForge,
    Rift,
    /// Risugami's ModLoader.
    ModLoader,
    /// Any other well-formed loader identifier (e.g. `paper`, `bukkit`).
    Custom(String),
}

impl ModLoader {
    /// Parse a loader identifier. Returns `None` for malformed identifiers.
    pub fn parse(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_ascii_lowercase();
        let loader = match lower.as_str() {
            "fabric" => ModLoader::Fabric,
            "forge" => ModLoader::Forge,
            "quilt" => ModLoader::Quilt,
            "neoforge" => ModLoader::NeoForge,
            "rift" => ModLoader::Rift,
            "modloader" | "risugami's modloader" => ModLoader::ModLoader,
            other => {
                let mut chars = other.chars();
                let head_ok = chars
                    .next()
                    .map(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
                    .unwrap_or(false);
                let tail_ok = chars
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
                if !(head_ok && tail_ok) {
                    return None;
                }
                ModLoader::Custom(other.to_string())
            }
        };
        Some(loader)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ModLoader::Fabric => "fabric",
            ModLoader::Forge => "forge",
            ModLoader::Quilt => "quilt",
            ModLoader::NeoForge => "neoforge",
            ModLoader::Rift => "rift",
            ModLoader::ModLoader => "modloader",
            ModLoader::Custom(name) => name,
        }
    }
}

impl fmt::Display for ModLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ModLoader> for String {
    fn from(loader: ModLoader) -> Self {
        loader.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VersionType {
    Release,
    Beta,
    Alpha,
}

impl VersionType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "release" => Some(VersionType::Release),
            "beta" => Some(VersionType::Beta),
            "alpha" => Some(VersionType::Alpha),
            _ => None,
        }
    }

    pub fn is_prerelease(&self) -> bool {
        !matches!(self, VersionType::Release)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VersionType::Release => "release",
            VersionType::Beta => "beta",
            VersionType::Alpha => "alpha",
        }
    }
}

/// CurseForge client/server environment tag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CurseEnvironment {
    Client,
    Server,
    #[default]
    Both,
}

impl CurseEnvironment {
    pub fn tags(&self) -> &'static [&'static str] {
        match self {
            CurseEnvironment::Client => &["client"],
            CurseEnvironment::Server => &["server"],
            CurseEnvironment::Both => &["client", "server"],
        }
    }
}

/// A single file to publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// Absolute (or manifest-relative, resolved) path to the file.
    pub path: PathBuf,
    pub display_name: Option<String>,
    pub changelog: Option<String>,
    /// When set, the artifact is only published to these platforms.
    pub platforms: Option<Vec<Platform>>,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            display_name: None,
            changelog: None,
            platforms: None,
        }
    }

    pub fn applies_to(&self, platform: Platform) -> bool {
        match &self.platforms {
            Some(list) => list.contains(&platform),
            None => true,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn is_jar(&self) -> bool {
        self.path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("jar"))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Required,
    Optional,
    Incompatible,
    Embedded,
}

impl DependencyKind {
    pub const ALL: [DependencyKind; 4] = [
        DependencyKind::Required,
        DependencyKind::Optional,
        DependencyKind::Incompatible,
        DependencyKind::Embedded,
    ];
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyKind::Required => write!(f, "required"),
            DependencyKind::Optional => write!(f, "optional"),
            DependencyKind::Incompatible => write!(f, "incompatible"),
            DependencyKind::Embedded => write!(f, "embedded"),
        }
    }
}

/// A dependency on another project. Slugs are platform specific.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyDeclaration {
    pub platform: Platform,
    pub slug: String,
    pub kind: DependencyKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurseForgeTarget {
    pub project_id: u64,
    pub environment: CurseEnvironment,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModrinthTarget {
    /// Base62 project id or slug.
    pub project_id: String,
    pub staging: bool,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GithubTarget {
    /// Cleaned `owner/repo`.
    pub repo: String,
    pub tag: String,
    pub create_tag: bool,
    pub create_release: bool,
    pub update_release: bool,
    pub optional: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Checks {
    pub empty_jar: bool,
}

impl Default for Checks {
    fn default() -> Self {
        Self { empty_jar: true }
    }
}

/// A validated release description.
///
/// Only the manifest loader can build one, so every instance has passed
/// validation. There are no mutating accessors.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseManifest {
    pub(super) version: String,
    pub(super) display_name: String,
    pub(super) changelog: String,
    pub(super) version_type: VersionType,
    pub(super) artifacts: Vec<Artifact>,
    pub(super) game_versions: Vec<String>,
    pub(super) loaders: Vec<ModLoader>,
    pub(super) java_versions: Vec<u32>,
    pub(super) curseforge: Option<CurseForgeTarget>,
    pub(super) modrinth: Option<ModrinthTarget>,
    pub(super) github: Option<GithubTarget>,
    pub(super) dependencies: Vec<DependencyDeclaration>,
    pub(super) checks: Checks,
    pub(super) base_dir: PathBuf,
}

impl ReleaseManifest {
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn changelog(&self) -> &str {
        &self.changelog
    }

    pub fn version_type(&self) -> VersionType {
        self.version_type
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn game_versions(&self) -> &[String] {
        &self.game_versions
    }

    pub fn loaders(&self) -> &[ModLoader] {
        &self.loaders
    }

    pub fn java_versions(&self) -> &[u32] {
        &self.java_versions
    }

    pub fn curseforge(&self) -> Option<&CurseForgeTarget> {
        self.curseforge.as_ref()
    }

    pub fn modrinth(&self) -> Option<&ModrinthTarget> {
        self.modrinth.as_ref()
    }

    pub fn github(&self) -> Option<&GithubTarget> {
        self.github.as_ref()
    }

    pub fn dependencies(&self) -> &[DependencyDeclaration] {
        &self.dependencies
    }

    pub fn checks(&self) -> Checks {
        self.checks
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Targeted platforms in reporting order.
    pub fn targets(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.targets_platform(*p))
            .collect()
    }

    pub fn targets_platform(&self, platform: Platform) -> bool {
        match platform {
            Platform::CurseForge => self.curseforge.is_some(),
            Platform::Modrinth => self.modrinth.is_some(),
            Platform::Github => self.github.is_some(),
        }
    }

    /// Whether a failure on `platform` is tolerated by the exit code.
    pub fn is_optional(&self, platform: Platform) -> bool {
        match platform {
            Platform::CurseForge => self.curseforge.as_ref().map(|t| t.optional),
            Platform::Modrinth => self.modrinth.as_ref().map(|t| t.optional),
            Platform::Github => self.github.as_ref().map(|t| t.optional),
        }
        .unwrap_or(false)
    }

    /// Artifacts published to `platform`, primary file first.
    pub fn artifacts_for(&self, platform: Platform) -> Vec<&Artifact> {
        self.artifacts
            .iter()
            .filter(|a| a.applies_to(platform))
            .collect()
    }

    pub fn dependencies_for(&self, platform: Platform) -> Vec<&DependencyDeclaration> {
        self.dependencies
            .iter()
            .filter(|d| d.platform == platform)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loader_parsing_accepts_aliases_and_custom_ids() {
        assert_eq!(ModLoader::parse("NeoForge"), Some(ModLoader::NeoForge));
        assert_eq!(
            ModLoader::parse("risugami's modloader"),
            Some(ModLoader::ModLoader)
        );
        assert_eq!(
            ModLoader::parse("paper"),
            Some(ModLoader::Custom("paper".into()))
        );
        assert_eq!(ModLoader::parse("not a loader!"), None);
        assert_eq!(ModLoader::parse(""), None);
    }

    #[test]
    fn artifact_platform_restriction() {
        let mut artifact = Artifact::new("/tmp/mod.jar");
        assert!(artifact.applies_to(Platform::Github));
        artifact.platforms = Some(vec![Platform::Modrinth]);
        assert!(artifact.applies_to(Platform::Modrinth));
        assert!(!artifact.applies_to(Platform::CurseForge));
        assert!(artifact.is_jar());
        assert_eq!(artifact.file_name(), "mod.jar");
    }

    #[test]
    fn platform_parse_and_display_agree() {
        for platform in Platform::ALL {
            assert_eq!(Platform::parse(&platform.to_string()), Some(platform));
        }
        assert_eq!(Platform::parse("curse"), Some(Platform::CurseForge));
    }
}
