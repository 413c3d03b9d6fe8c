use async_trait::async_trait;
use reqwest::header::HeaderValue;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::adapter::{PlatformAdapter, RemoteRelease};
use super::context::PublishContext;
use super::{mime_for, read_artifact};
use crate::core::error::{PublisherError, PublisherResult};
use crate::core::http::{expect_success, send_with_retry, token_header, RetryPolicy};
use crate::core::manifest::{
    Artifact, DependencyDeclaration, DependencyKind, ModLoader, Platform, ReleaseManifest,
};

const API_TOKEN: &str = "X-Api-Token";

/// Oldest game version CurseForge knows about.
const OLDEST_CURSE_VERSION: &str = "beta 1.6.6";
const OLDEST_BETA: [u32; 3] = [1, 6, 6];

/// Entry of `GET /api/game/versions`.
#[derive(Debug, Clone, Deserialize)]
pub struct CurseGameVersion {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub slug: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurseMetadata {
    pub changelog: String,
    pub changelog_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "parentFileID", skip_serializing_if = "Option::is_none")]
    pub parent_file_id: Option<u64>,
    /// Only sent for the primary file; additional files inherit them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_versions: Option<Vec<u64>>,
    pub release_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relations: Option<CurseRelations>,
}

#[derive(Debug, Serialize)]
pub struct CurseRelations {
    pub projects: Vec<CurseRelation>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct CurseRelation {
    pub slug: String,
    #[serde(rename = "type")]
    pub relation_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct CurseUploadResponse {
    id: u64,
}

pub struct CurseForgeAdapter {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl CurseForgeAdapter {
    pub fn new(client: Client, base_url: String, retry: RetryPolicy) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        }
    }

    async fn fetch_game_versions(
        &self,
        auth: &HeaderValue,
    ) -> PublisherResult<Vec<CurseGameVersion>> {
        let url = format!("{}/api/game/versions", self.base_url);
        let resp = send_with_retry(Platform::CurseForge, &self.retry, || {
            Ok(self.client.get(&url).header(API_TOKEN, auth.clone()))
        })
        .await?;
        let versions = expect_success(Platform::CurseForge, resp)
            .await?
            .json::<Vec<CurseGameVersion>>()
            .await?;
        debug!("CurseForge knows {} game version tags", versions.len());
        Ok(versions)
    }

    async fn upload_file(
        &self,
        auth: &HeaderValue,
        project_id: u64,
        artifact: &Artifact,
        metadata: &CurseMetadata,
    ) -> PublisherResult<u64> {
        let url = format!("{}/api/projects/{}/upload-file", self.base_url, project_id);
        let metadata_json = serde_json::to_string(metadata)?;
        let bytes = read_artifact(&artifact.path).await?;
        let file_name = artifact.file_name();
        let mime = mime_for(artifact);

        let resp = send_with_retry(Platform::CurseForge, &self.retry, || {
            let file = Part::bytes(bytes.clone())
                .file_name(file_name.clone())
                .mime_str(mime)?;
            let form = Form::new()
                .text("metadata", metadata_json.clone())
                .part("file", file);
            Ok(self
                .client
                .post(&url)
                .header(API_TOKEN, auth.clone())
                .multipart(form))
        })
        .await?;

        let uploaded = expect_success(Platform::CurseForge, resp)
            .await?
            .json::<CurseUploadResponse>()
            .await?;
        Ok(uploaded.id)
    }
}

#[async_trait]
impl PlatformAdapter for CurseForgeAdapter {
    fn platform(&self) -> Platform {
        Platform::CurseForge
    }

    async fn publish(&self, ctx: PublishContext<'_>) -> PublisherResult<RemoteRelease> {
        let manifest = ctx.manifest;
        let target = manifest.curseforge().ok_or_else(|| {
            PublisherError::InvalidTarget("curseforge is not configured in the manifest".into())
        })?;
        let artifacts = manifest.artifacts_for(Platform::CurseForge);
        let (primary, additional) = artifacts.split_first().ok_or_else(|| {
            PublisherError::MissingArtifact("no artifact applies to curseforge".into())
        })?;

        info!("Uploading {} to CurseForge project {}", primary.file_name(), target.project_id);

        let tags = version_tags(manifest, target.environment.tags());
        let relations = relations_for(ctx.dependencies);

        // 1. Dry run: show what would be sent, without touching the API
        if ctx.dry_run {
            let metadata = primary_metadata(manifest, primary, Vec::new(), relations);
            info!(
                "[dry-run] CurseForge metadata: {} (game version tags: {:?})",
                serde_json::to_string_pretty(&metadata)?,
                tags
            );
            for file in additional {
                info!("[dry-run] CurseForge additional file: {}", file.file_name());
            }
            return Ok(RemoteRelease::dry_run());
        }

        // 2. Map tag names to CurseForge ids
        let auth = token_header(ctx.credential.expose())?;
        let known = self.fetch_game_versions(&auth).await?;
        let game_version_ids = resolve_tag_ids(&tags, &known)?;

        // 3. Primary file
        let metadata = primary_metadata(manifest, primary, game_version_ids, relations);
        let file_id = self
            .upload_file(&auth, target.project_id, primary, &metadata)
            .await?;
        info!("CurseForge accepted {} as file {}", primary.file_name(), file_id);

        // 4. Additional files hang off the primary one
        for file in additional {
            let metadata = CurseMetadata {
                changelog: file
                    .changelog
                    .clone()
                    .unwrap_or_else(|| manifest.changelog().to_string()),
                changelog_type: "markdown",
                display_name: file.display_name.clone(),
                parent_file_id: Some(file_id),
                game_versions: None,
                release_type: manifest.version_type().as_str(),
                relations: None,
            };
            let child = self
                .upload_file(&auth, target.project_id, file, &metadata)
                .await?;
            debug!("CurseForge additional file {} -> {}", file.file_name(), child);
        }

        Ok(RemoteRelease {
            id: file_id.to_string(),
            url: Some(format!(
                "https://www.curseforge.com/projects/{}",
                target.project_id
            )),
        })
    }
}

fn primary_metadata(
    manifest: &ReleaseManifest,
    primary: &Artifact,
    game_versions: Vec<u64>,
    relations: Option<CurseRelations>,
) -> CurseMetadata {
    CurseMetadata {
        changelog: primary
            .changelog
            .clone()
            .unwrap_or_else(|| manifest.changelog().to_string()),
        changelog_type: "markdown",
        display_name: Some(
            primary
                .display_name
                .clone()
                .unwrap_or_else(|| manifest.display_name().to_string()),
        ),
        parent_file_id: None,
        game_versions: Some(game_versions),
        release_type: manifest.version_type().as_str(),
        relations,
    }
}

/// Every CurseForge "game version" tag for this release: Minecraft
/// versions, loaders, environments and Java versions share one namespace.
pub fn version_tags(manifest: &ReleaseManifest, environment: &[&str]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    let mut push = |tag: String| {
        if !tags.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
            tags.push(tag);
        }
    };

    for version in manifest.game_versions() {
        match curse_game_version(version) {
            Some(tag) => push(tag),
            None => debug!("CurseForge does not list game version {}, skipping", version),
        }
    }
    for loader in manifest.loaders() {
        push(curse_loader_name(loader));
    }
    for env in environment {
        push(env.to_string());
    }
    for java in manifest.java_versions() {
        push(format!("Java {}", java));
    }
    tags
}

/// Map a Minecraft version to CurseForge's naming, or `None` when
/// CurseForge has no tag for it (snapshots, pre-releases, release
/// candidates).
pub fn curse_game_version(version: &str) -> Option<String> {
    if version.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    if version.contains("-pre") || version.contains("-rc") {
        return None;
    }

    let lower = version.to_ascii_lowercase();
    if let Some(rest) = lower.strip_prefix('b') {
        if rest.starts_with(|c: char| c.is_ascii_digit()) {
            if numeric_parts(rest) < OLDEST_BETA.to_vec() {
                return Some(OLDEST_CURSE_VERSION.into());
            }
            return Some(format!("beta {}", rest));
        }
    }

    let pre_beta = ["rd-", "c0.", "inf-"].iter().any(|p| lower.starts_with(p))
        || (lower.starts_with('a') && lower[1..].starts_with(|c: char| c.is_ascii_digit()));
    if pre_beta {
        return Some(OLDEST_CURSE_VERSION.into());
    }

    Some(version.to_string())
}

fn numeric_parts(version: &str) -> Vec<u32> {
    version
        .split(|c: char| c == '.' || c == '_')
        .map(|p| {
            p.chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
                .parse()
                .unwrap_or(0)
        })
        .collect()
}

pub fn curse_loader_name(loader: &ModLoader) -> String {
    match loader {
        ModLoader::ModLoader => "risugami's modloader".into(),
        other => other.as_str().to_string(),
    }
}

fn relation_type(kind: DependencyKind) -> &'static str {
    match kind {
        DependencyKind::Required => "requiredDependency",
        DependencyKind::Optional => "optionalDependency",
        DependencyKind::Incompatible => "incompatible",
        DependencyKind::Embedded => "embeddedLibrary",
    }
}

fn relations_for(dependencies: &[DependencyDeclaration]) -> Option<CurseRelations> {
    if dependencies.is_empty() {
        return None;
    }
    Some(CurseRelations {
        projects: dependencies
            .iter()
            .map(|d| CurseRelation {
                slug: d.slug.clone(),
                relation_type: relation_type(d.kind),
            })
            .collect(),
    })
}

/// Resolve tag names to ids by case-insensitive name, then slug.
pub fn resolve_tag_ids(tags: &[String], known: &[CurseGameVersion]) -> PublisherResult<Vec<u64>> {
    let mut ids = Vec::with_capacity(tags.len());
    let mut unknown = Vec::new();

    for tag in tags {
        let slug = tag.to_ascii_lowercase().replace([' ', '.'], "-");
        let found = known
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(tag))
            .or_else(|| known.iter().find(|v| v.slug.eq_ignore_ascii_case(&slug)));
        match found {
            Some(v) if !ids.contains(&v.id) => ids.push(v.id),
            Some(_) => {}
            None => unknown.push(tag.clone()),
        }
    }

    if !unknown.is_empty() {
        warn!("CurseForge does not recognise: {}", unknown.join(", "));
        return Err(PublisherError::InvalidTarget(format!(
            "unknown CurseForge game version tag(s): {}",
            unknown.join(", ")
        )));
    }
    Ok(ids)
}
