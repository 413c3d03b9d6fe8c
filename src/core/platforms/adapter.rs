use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::error::PublisherResult;
use crate::core::manifest::Platform;
use crate::core::settings::PublisherSettings;

use super::{
    context::PublishContext, curseforge::CurseForgeAdapter, github::GithubAdapter,
    modrinth::ModrinthAdapter,
};

/// What an adapter is able to do on its platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    UploadArtifact,
    SetMetadata,
    DeclareDependency,
    CreateOrUpdateRelease,
}

pub fn capabilities_for(platform: Platform) -> &'static [Capability] {
    match platform {
        Platform::CurseForge => &[
            Capability::UploadArtifact,
            Capability::SetMetadata,
            Capability::DeclareDependency,
        ],
        Platform::Modrinth => &[
            Capability::UploadArtifact,
            Capability::SetMetadata,
            Capability::DeclareDependency,
        ],
        Platform::Github => &[
            Capability::UploadArtifact,
            Capability::CreateOrUpdateRelease,
        ],
    }
}

/// Where a successful publish landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRelease {
    pub id: String,
    pub url: Option<String>,
}

impl RemoteRelease {
    pub fn dry_run() -> Self {
        Self {
            id: "dry-run".into(),
            url: None,
        }
    }
}

#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    fn capabilities(&self) -> &'static [Capability] {
        capabilities_for(self.platform())
    }

    async fn publish(&self, ctx: PublishContext<'_>) -> PublisherResult<RemoteRelease>;
}

/// Boxed adapters, for callers that mix their own implementations.
#[async_trait]
impl<T: PlatformAdapter + ?Sized> PlatformAdapter for Box<T> {
    fn platform(&self) -> Platform {
        (**self).platform()
    }

    fn capabilities(&self) -> &'static [Capability] {
        (**self).capabilities()
    }

    async fn publish(&self, ctx: PublishContext<'_>) -> PublisherResult<RemoteRelease> {
        (**self).publish(ctx).await
    }
}

/// Concrete adapters, dispatched without a vtable.
pub enum Adapter {
    CurseForge(CurseForgeAdapter),
    Modrinth(ModrinthAdapter),
    Github(GithubAdapter),
}

impl Adapter {
    pub fn new(platform: Platform, client: reqwest::Client, settings: &PublisherSettings) -> Self {
        let retry = settings.retry_policy();
        let endpoints = &settings.endpoints;
        match platform {
            Platform::CurseForge => Self::CurseForge(CurseForgeAdapter::new(
                client,
                endpoints.curseforge.clone(),
                retry,
            )),
            Platform::Modrinth => Self::Modrinth(ModrinthAdapter::new(
                client,
                endpoints.modrinth.clone(),
                endpoints.modrinth_staging.clone(),
                retry,
            )),
            Platform::Github => Self::Github(GithubAdapter::new(
                client,
                endpoints.github_api.clone(),
                endpoints.github_uploads.clone(),
                retry,
            )),
        }
    }
}

#[async_trait]
impl PlatformAdapter for Adapter {
    fn platform(&self) -> Platform {
        match self {
            Adapter::CurseForge(_) => Platform::CurseForge,
            Adapter::Modrinth(_) => Platform::Modrinth,
            Adapter::Github(_) => Platform::Github,
        }
    }

    async fn publish(&self, ctx: PublishContext<'_>) -> PublisherResult<RemoteRelease> {
        match self {
            Adapter::CurseForge(a) => a.publish(ctx).await,
            Adapter::Modrinth(a) => a.publish(ctx).await,
            Adapter::Github(a) => a.publish(ctx).await,
        }
    }
}
