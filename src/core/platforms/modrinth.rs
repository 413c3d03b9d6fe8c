use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::adapter::{PlatformAdapter, RemoteRelease};
use super::context::PublishContext;
use super::{mime_for, read_artifact};
use crate::core::checks::ArtifactDigest;
use crate::core::error::{PublisherError, PublisherResult};
use crate::core::http::{expect_success, send_with_retry, token_header, RetryPolicy};
use crate::core::manifest::{DependencyDeclaration, DependencyKind, ModLoader, Platform};

#[derive(Debug, Deserialize)]
struct ModrinthProject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ModrinthVersion {
    id: String,
    project_id: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ModrinthDependency {
    pub project_id: String,
    pub dependency_type: &'static str,
}

/// `data` part of `POST /version`.
#[derive(Debug, Serialize)]
pub struct VersionPayload {
    pub name: String,
    pub version_number: String,
    pub changelog: String,
    pub dependencies: Vec<ModrinthDependency>,
    pub game_versions: Vec<String>,
    pub version_type: &'static str,
    pub loaders: Vec<String>,
    pub featured: bool,
    pub status: &'static str,
    pub project_id: String,
    pub file_parts: Vec<String>,
    pub primary_file: String,
}

pub struct ModrinthAdapter {
    client: Client,
    base_url: String,
    staging_url: String,
    retry: RetryPolicy,
}

impl ModrinthAdapter {
    pub fn new(client: Client, base_url: String, staging_url: String, retry: RetryPolicy) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            staging_url: staging_url.trim_end_matches('/').to_string(),
            retry,
        }
    }

    fn api(&self, staging: bool) -> &str {
        if staging {
            &self.staging_url
        } else {
            &self.base_url
        }
    }

    /// Look up a project by slug or id and return its id. `/project/{ref}`
    /// accepts both, and an 8-character slug is indistinguishable from an id.
    async fn resolve_project(
        &self,
        api: &str,
        auth: &HeaderValue,
        reference: &str,
    ) -> PublisherResult<String> {
        let url = format!("{}/project/{}", api, reference);
        let resp = send_with_retry(Platform::Modrinth, &self.retry, || {
            Ok(self.client.get(&url).header(AUTHORIZATION, auth.clone()))
        })
        .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(PublisherError::InvalidTarget(format!(
                "modrinth project '{}' does not exist",
                reference
            )));
        }
        let project = expect_success(Platform::Modrinth, resp)
            .await?
            .json::<ModrinthProject>()
            .await?;
        debug!("Modrinth project {} -> {}", reference, project.id);
        Ok(project.id)
    }

    /// Fail if this exact file is already published to the project.
    async fn ensure_not_published(
        &self,
        api: &str,
        auth: &HeaderValue,
        project_id: &str,
        digest: &ArtifactDigest,
    ) -> PublisherResult<()> {
        let url = format!("{}/version_file/{}?algorithm=sha1", api, digest.sha1);
        let resp = send_with_retry(Platform::Modrinth, &self.retry, || {
            Ok(self.client.get(&url).header(AUTHORIZATION, auth.clone()))
        })
        .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let existing = expect_success(Platform::Modrinth, resp)
            .await?
            .json::<ModrinthVersion>()
            .await?;
        if existing.project_id == project_id {
            return Err(PublisherError::PlatformRejected {
                platform: Platform::Modrinth,
                status: StatusCode::CONFLICT.as_u16(),
                message: format!(
                    "{} is already published as version {}",
                    digest.path.display(),
                    existing.id
                ),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PlatformAdapter for ModrinthAdapter {
    fn platform(&self) -> Platform {
        Platform::Modrinth
    }

    async fn publish(&self, ctx: PublishContext<'_>) -> PublisherResult<RemoteRelease> {
        let manifest = ctx.manifest;
        let target = manifest.modrinth().ok_or_else(|| {
            PublisherError::InvalidTarget("modrinth is not configured in the manifest".into())
        })?;
        let artifacts = manifest.artifacts_for(Platform::Modrinth);
        if artifacts.is_empty() {
            return Err(PublisherError::MissingArtifact(
                "no artifact applies to modrinth".into(),
            ));
        }
        let api = self.api(target.staging);

        let mut payload = VersionPayload {
            name: manifest.display_name().to_string(),
            version_number: manifest.version().to_string(),
            changelog: manifest.changelog().to_string(),
            dependencies: Vec::new(),
            game_versions: modrinth_game_versions(manifest.game_versions()),
            version_type: manifest.version_type().as_str(),
            loaders: modrinth_loaders(manifest.loaders()),
            featured: false,
            status: "listed",
            project_id: target.project_id.clone(),
            file_parts: (0..artifacts.len()).map(|i| format!("file{}", i)).collect(),
            primary_file: "file0".into(),
        };

        if ctx.dry_run {
            payload.dependencies = ctx
                .dependencies
                .iter()
                .map(|d| ModrinthDependency {
                    project_id: d.slug.clone(),
                    dependency_type: dependency_type(d.kind),
                })
                .collect();
            info!(
                "[dry-run] Modrinth version payload for {}: {}",
                api,
                serde_json::to_string_pretty(&payload)?
            );
            return Ok(RemoteRelease::dry_run());
        }

        let auth = token_header(ctx.credential.expose())?;

        // 1. Project and dependency ids
        let project_id = self.resolve_project(api, &auth, &target.project_id).await?;
        payload.project_id = project_id.clone();
        payload.dependencies = self.resolve_dependencies(api, &auth, ctx.dependencies).await?;

        // 2. Duplicate check on the primary file
        if let Some(digest) = ctx.digest_for(&artifacts[0].path) {
            self.ensure_not_published(api, &auth, &project_id, digest)
                .await?;
        }

        // 3. Upload
        let mut files = Vec::with_capacity(artifacts.len());
        for artifact in &artifacts {
            files.push((
                artifact.file_name(),
                mime_for(artifact),
                read_artifact(&artifact.path).await?,
            ));
        }
        let data = serde_json::to_string(&payload)?;
        let url = format!("{}/version", api);

        info!(
            "Uploading {} file(s) to Modrinth project {}",
            files.len(),
            project_id
        );
        let resp = send_with_retry(Platform::Modrinth, &self.retry, || {
            let mut form = Form::new().text("data", data.clone());
            for (i, (name, mime, bytes)) in files.iter().enumerate() {
                let part = Part::bytes(bytes.clone())
                    .file_name(name.clone())
                    .mime_str(mime)?;
                form = form.part(format!("file{}", i), part);
            }
            Ok(self
                .client
                .post(&url)
                .header(AUTHORIZATION, auth.clone())
                .multipart(form))
        })
        .await?;

        let version = expect_success(Platform::Modrinth, resp)
            .await?
            .json::<ModrinthVersion>()
            .await?;
        info!("Modrinth created version {}", version.id);

        Ok(RemoteRelease {
            url: Some(format!(
                "https://modrinth.com/project/{}/version/{}",
                version.project_id, version.id
            )),
            id: version.id,
        })
    }
}

impl ModrinthAdapter {
    async fn resolve_dependencies(
        &self,
        api: &str,
        auth: &HeaderValue,
        dependencies: &[DependencyDeclaration],
    ) -> PublisherResult<Vec<ModrinthDependency>> {
        let mut out = Vec::with_capacity(dependencies.len());
        for dep in dependencies {
            out.push(ModrinthDependency {
                project_id: self.resolve_project(api, auth, &dep.slug).await?,
                dependency_type: dependency_type(dep.kind),
            });
        }
        Ok(out)
    }
}

/// Modrinth has no `-snapshot` versions; those are dropped.
pub fn modrinth_game_versions(versions: &[String]) -> Vec<String> {
    versions
        .iter()
        .filter(|v| !v.ends_with("-snapshot"))
        .cloned()
        .collect()
}

pub fn modrinth_loaders(loaders: &[ModLoader]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(loaders.len());
    for loader in loaders {
        let name = loader.as_str().to_string();
        if !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

fn dependency_type(kind: DependencyKind) -> &'static str {
    match kind {
        DependencyKind::Required => "required",
        DependencyKind::Optional => "optional",
        DependencyKind::Incompatible => "incompatible",
        DependencyKind::Embedded => "embedded",
    }
}
