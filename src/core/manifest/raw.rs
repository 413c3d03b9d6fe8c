// ─── Raw Manifest ───
// On-disk shape of `publish.toml` / `publish.json`, before validation.
// Required fields are still optional here so that validation, not the
// parser, decides which problem is reported first.

use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawManifest {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub changelog: Option<RawChangelog>,
    #[serde(default)]
    pub version_type: Option<String>,
    #[serde(default)]
    pub artifacts: Vec<RawArtifact>,
    #[serde(default)]
    pub game_versions: Vec<String>,
    #[serde(default)]
    pub loaders: Vec<String>,
    #[serde(default)]
    pub java_versions: Vec<RawJavaVersion>,
    #[serde(default)]
    pub curseforge: Option<RawCurseForge>,
    #[serde(default)]
    pub modrinth: Option<RawModrinth>,
    #[serde(default)]
    pub github: Option<RawGithub>,
    #[serde(default)]
    pub checks: Option<RawChecks>,
}

/// Changelog as written by the user: inline text, a file, or a URL.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RawChangelog {
    Text(String),
    File { file: PathBuf },
    Url { url: String },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawArtifact {
    pub path: PathBuf,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub changelog: Option<RawChangelog>,
    #[serde(default)]
    pub platforms: Option<Vec<String>>,
}

/// Java versions may be written as `17`, `"17"` or `"Java 17"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawJavaVersion {
    Number(u32),
    Text(String),
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct RawDependencies {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub optional: Vec<String>,
    #[serde(default)]
    pub incompatible: Vec<String>,
    #[serde(default)]
    pub embedded: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawCurseForge {
    #[serde(default)]
    pub project_id: Option<RawProjectId>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub dependencies: RawDependencies,
}

/// CurseForge ids are often written unquoted.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawProjectId {
    Number(u64),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawModrinth {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub staging: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub dependencies: RawDependencies,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawGithub {
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default = "default_true")]
    pub create_tag: bool,
    #[serde(default = "default_true")]
    pub create_release: bool,
    #[serde(default = "default_true")]
    pub update_release: bool,
    #[serde(default)]
    pub optional: bool,
    /// Accepted for symmetry; GitHub has no dependency concept.
    #[serde(default)]
    pub dependencies: RawDependencies,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawChecks {
    #[serde(default = "default_true")]
    pub empty_jar: bool,
}

fn default_true() -> bool {
    true
}
