use std::collections::HashSet;
use std::path::{Path, PathBuf};

use reqwest::Client;
use tracing::{debug, info, warn};

use super::changelog::ChangelogResolver;
use super::model::{
    Artifact, Checks, CurseEnvironment, CurseForgeTarget, DependencyDeclaration, DependencyKind,
    GithubTarget, ModLoader, ModrinthTarget, Platform, ReleaseManifest, VersionType,
};
use super::raw::{
    RawArtifact, RawDependencies, RawJavaVersion, RawManifest, RawProjectId,
};
use crate::core::error::{PublisherError, PublisherResult};

/// Default manifest file name looked up by the CLI.
pub const DEFAULT_MANIFEST: &str = "publish.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Toml,
    Json,
}

impl ManifestFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ManifestFormat::Json,
            _ => ManifestFormat::Toml,
        }
    }
}

/// Parses and validates release manifests.
///
/// The HTTP client is only used to fetch remote changelogs; without one,
/// changelog URLs are kept as literal text.
pub struct ManifestLoader {
    client: Option<Client>,
}

impl ManifestLoader {
    pub fn new(client: Option<Client>) -> Self {
        Self { client }
    }

    /// Load a manifest file. Relative paths inside it resolve against the
    /// file's directory.
    pub async fn load(&self, path: &Path) -> PublisherResult<ReleaseManifest> {
        info!("Loading release manifest {:?}", path);

        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| PublisherError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        self.load_str(&text, ManifestFormat::from_path(path), &base_dir)
            .await
    }

    /// Parse and validate manifest text.
    pub async fn load_str(
        &self,
        text: &str,
        format: ManifestFormat,
        base_dir: &Path,
    ) -> PublisherResult<ReleaseManifest> {
        let raw: RawManifest = match format {
            ManifestFormat::Toml => toml::from_str(text)?,
            ManifestFormat::Json => serde_json::from_str(text)?,
        };
        self.validate(raw, base_dir).await
    }

    /// Validate a raw manifest into an immutable [`ReleaseManifest`].
    pub async fn validate(
        &self,
        raw: RawManifest,
        base_dir: &Path,
    ) -> PublisherResult<ReleaseManifest> {
        // 1. Artifacts come first: nothing else matters without a file.
        if raw.artifacts.is_empty() {
            return Err(PublisherError::MissingArtifact(
                "manifest does not list any artifacts".into(),
            ));
        }

        // 2. Scalar fields
        let version = normalize_version(raw.version.as_deref().ok_or_else(|| {
            PublisherError::InvalidManifest("`version` is required".into())
        })?)?;

        let display_name = raw
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| version.clone());

        let version_type = match raw.version_type.as_deref() {
            None => VersionType::Release,
            Some(v) => VersionType::parse(v).ok_or_else(|| {
                PublisherError::InvalidManifest(format!(
                    "version_type must be release, beta or alpha (got '{}')",
                    v
                ))
            })?,
        };

        // 3. Compatibility targets
        let game_versions = normalize_game_versions(&raw.game_versions)?;
        let loaders = normalize_loaders(&raw.loaders)?;
        let java_versions = raw
            .java_versions
            .iter()
            .map(parse_java_version)
            .collect::<PublisherResult<Vec<_>>>()?;

        // 4. Platform sections
        let mut dependencies = Vec::new();

        let curseforge = match raw.curseforge {
            Some(section) => {
                let project_id = match &section.project_id {
                    Some(id) => parse_curse_project_id(id)?,
                    None => {
                        return Err(PublisherError::InvalidTarget(
                            "curseforge.project_id is required".into(),
                        ))
                    }
                };
                let environment = match section.environment.as_deref() {
                    None => CurseEnvironment::default(),
                    Some(env) => parse_environment(env)?,
                };
                push_dependencies(&mut dependencies, Platform::CurseForge, &section.dependencies);
                Some(CurseForgeTarget {
                    project_id,
                    environment,
                    optional: section.optional,
                })
            }
            None => None,
        };

        let modrinth = match raw.modrinth {
            Some(section) => {
                let project_id = section
                    .project_id
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or_default()
                    .to_string();
                if project_id.is_empty() {
                    return Err(PublisherError::InvalidTarget(
                        "modrinth.project_id is missing or empty".into(),
                    ));
                }
                push_dependencies(&mut dependencies, Platform::Modrinth, &section.dependencies);
                Some(ModrinthTarget {
                    project_id,
                    staging: section.staging,
                    optional: section.optional,
                })
            }
            None => None,
        };

        let github = match raw.github {
            Some(section) => {
                let repo = clean_github_repo(section.repo.as_deref().unwrap_or_default());
                if repo.is_empty() {
                    return Err(PublisherError::InvalidManifest(
                        "github.repo is missing or empty".into(),
                    ));
                }
                if !(section.create_release || section.update_release) {
                    return Err(PublisherError::InvalidManifest(
                        "github create_release and update_release are both disabled, at least one must be enabled".into(),
                    ));
                }
                let tag = section
                    .tag
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| version.clone());
                push_dependencies(&mut dependencies, Platform::Github, &section.dependencies);
                Some(GithubTarget {
                    repo,
                    tag,
                    create_tag: section.create_tag,
                    create_release: section.create_release,
                    update_release: section.update_release,
                    optional: section.optional,
                })
            }
            None => None,
        };

        let targets: Vec<Platform> = [
            curseforge.as_ref().map(|_| Platform::CurseForge),
            modrinth.as_ref().map(|_| Platform::Modrinth),
            github.as_ref().map(|_| Platform::Github),
        ]
        .into_iter()
        .flatten()
        .collect();

        if targets.is_empty() {
            return Err(PublisherError::InvalidManifest(
                "no platform section (curseforge, modrinth, github) is configured".into(),
            ));
        }

        for platform in &targets {
            if platform.requires_game_versions() && game_versions.is_empty() {
                return Err(PublisherError::InvalidTarget(format!(
                    "game_versions must not be empty when publishing to {}",
                    platform
                )));
            }
            if platform.requires_loaders() && loaders.is_empty() {
                return Err(PublisherError::InvalidTarget(format!(
                    "loaders must not be empty when publishing to {}",
                    platform
                )));
            }
        }

        // 5. Changelogs (may hit the network for allow-listed URLs)
        let resolver = ChangelogResolver::new(self.client.as_ref(), base_dir);
        let changelog = match &raw.changelog {
            Some(c) => resolver.resolve(c).await?,
            None => String::new(),
        };

        // 6. Artifacts
        let mut artifacts = Vec::with_capacity(raw.artifacts.len());
        for entry in &raw.artifacts {
            let artifact = build_artifact(entry, base_dir, &targets, &resolver).await?;
            artifacts.push(artifact);
        }

        for platform in &targets {
            if !artifacts.iter().any(|a| a.applies_to(*platform)) {
                return Err(PublisherError::MissingArtifact(format!(
                    "no artifact applies to {}",
                    platform
                )));
            }
        }

        let checks = raw
            .checks
            .map(|c| Checks {
                empty_jar: c.empty_jar,
            })
            .unwrap_or_default();

        debug!(
            "Manifest {} validated: {} artifact(s), targets {:?}",
            version,
            artifacts.len(),
            targets
        );

        Ok(ReleaseManifest {
            version,
            display_name,
            changelog,
            version_type,
            artifacts,
            game_versions,
            loaders,
            java_versions,
            curseforge,
            modrinth,
            github,
            dependencies,
            checks,
            base_dir: base_dir.to_path_buf(),
        })
    }
}

async fn build_artifact(
    entry: &RawArtifact,
    base_dir: &Path,
    targets: &[Platform],
    resolver: &ChangelogResolver<'_>,
) -> PublisherResult<Artifact> {
    let path = if entry.path.is_absolute() {
        entry.path.clone()
    } else {
        base_dir.join(&entry.path)
    };

    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        _ => {
            return Err(PublisherError::MissingArtifact(format!(
                "cannot find file {:?}",
                path
            )))
        }
    }

    let platforms = match &entry.platforms {
        None => None,
        Some(names) => {
            let mut parsed = Vec::with_capacity(names.len());
            for name in names {
                let platform = Platform::parse(name).ok_or_else(|| {
                    PublisherError::InvalidTarget(format!("unknown platform '{}'", name))
                })?;
                if !targets.contains(&platform) {
                    return Err(PublisherError::InvalidTarget(format!(
                        "artifact {:?} is restricted to {}, which is not configured",
                        entry.path, platform
                    )));
                }
                if !parsed.contains(&platform) {
                    parsed.push(platform);
                }
            }
            Some(parsed)
        }
    };

    let changelog = match &entry.changelog {
        Some(c) => Some(resolver.resolve(c).await?),
        None => None,
    };

    Ok(Artifact {
        path,
        display_name: entry
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
        changelog,
        platforms,
    })
}

fn push_dependencies(
    out: &mut Vec<DependencyDeclaration>,
    platform: Platform,
    raw: &RawDependencies,
) {
    let groups = [
        (DependencyKind::Required, &raw.required),
        (DependencyKind::Optional, &raw.optional),
        (DependencyKind::Incompatible, &raw.incompatible),
        (DependencyKind::Embedded, &raw.embedded),
    ];
    for (kind, slugs) in groups {
        for slug in slugs {
            out.push(DependencyDeclaration {
                platform,
                slug: slug.clone(),
                kind,
            });
        }
    }
}

/// Trim and drop a leading `v` that precedes a digit (`v1.2.0` → `1.2.0`).
pub fn normalize_version(raw: &str) -> PublisherResult<String> {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    let stripped = match (chars.next(), chars.next()) {
        (Some('v' | 'V'), Some(d)) if d.is_ascii_digit() => &trimmed[1..],
        _ => trimmed,
    };

    if stripped.is_empty() {
        return Err(PublisherError::InvalidManifest("version is empty".into()));
    }
    if stripped.chars().any(char::is_whitespace) {
        return Err(PublisherError::InvalidManifest(format!(
            "version '{}' contains whitespace",
            stripped
        )));
    }
    Ok(stripped.to_string())
}

pub fn is_valid_game_version(version: &str) -> bool {
    let mut chars = version.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-' | ' '))
}

fn normalize_game_versions(raw: &[String]) -> PublisherResult<Vec<String>> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(raw.len());
    for entry in raw {
        let version = entry.trim();
        if !is_valid_game_version(version) {
            return Err(PublisherError::InvalidTarget(format!(
                "malformed game version '{}'",
                entry
            )));
        }
        if seen.insert(version.to_string()) {
            out.push(version.to_string());
        } else {
            warn!("Duplicate game version '{}' ignored", version);
        }
    }
    Ok(out)
}

fn normalize_loaders(raw: &[String]) -> PublisherResult<Vec<ModLoader>> {
    let mut out: Vec<ModLoader> = Vec::with_capacity(raw.len());
    for entry in raw {
        let loader = ModLoader::parse(entry).ok_or_else(|| {
            PublisherError::InvalidTarget(format!("malformed loader '{}'", entry))
        })?;
        if !out.contains(&loader) {
            out.push(loader);
        }
    }
    Ok(out)
}

fn parse_java_version(raw: &RawJavaVersion) -> PublisherResult<u32> {
    match raw {
        RawJavaVersion::Number(n) => Ok(*n),
        RawJavaVersion::Text(text) => {
            let trimmed = text.trim();
            let digits = trimmed.strip_prefix("Java ").unwrap_or(trimmed).trim();
            // Legacy "1.8" style means Java 8.
            let digits = digits.strip_prefix("1.").unwrap_or(digits);
            digits.parse::<u32>().map_err(|_| {
                PublisherError::InvalidTarget(format!("malformed Java version '{}'", text))
            })
        }
    }
}

fn parse_curse_project_id(raw: &RawProjectId) -> PublisherResult<u64> {
    match raw {
        RawProjectId::Number(n) => Ok(*n),
        RawProjectId::Text(text) => text.trim().parse::<u64>().map_err(|_| {
            PublisherError::InvalidTarget(format!(
                "curseforge.project_id must be numeric (got '{}')",
                text
            ))
        }),
    }
}

fn parse_environment(raw: &str) -> PublisherResult<CurseEnvironment> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "client" => Ok(CurseEnvironment::Client),
        "server" => Ok(CurseEnvironment::Server),
        "both" | "" => Ok(CurseEnvironment::Both),
        other => Err(PublisherError::InvalidTarget(format!(
            "curseforge.environment must be client, server or both (got '{}')",
            other
        ))),
    }
}

/// Reduce a GitHub repository reference to `owner/repo`.
pub fn clean_github_repo(raw: &str) -> String {
    let mut repo = raw.trim();
    for prefix in ["https://github.com/", "http://github.com/", "git@github.com:"] {
        if let Some(rest) = repo.strip_prefix(prefix) {
            repo = rest;
        }
    }
    let repo = repo.trim_end_matches('/');
    repo.strip_suffix(".git").unwrap_or(repo).to_string()
}
