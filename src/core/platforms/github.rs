use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::adapter::{PlatformAdapter, RemoteRelease};
use super::context::PublishContext;
use super::{mime_for, read_artifact};
use crate::core::error::{PublisherError, PublisherResult};
use crate::core::http::{expect_success, send_with_retry, RetryPolicy};
use crate::core::manifest::{Artifact, GithubTarget, Platform, ReleaseManifest};

const GITHUB_JSON: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

#[derive(Debug, Deserialize)]
struct Repository {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct Release {
    id: u64,
    html_url: String,
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Deserialize)]
struct ReleaseAsset {
    id: u64,
    name: String,
}

#[derive(Debug, Serialize)]
pub struct NewRelease {
    pub tag_name: String,
    pub target_commitish: String,
    pub name: String,
    pub body: String,
    pub draft: bool,
    pub prerelease: bool,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ReleaseFinish {
    pub prerelease: bool,
    pub draft: bool,
}

/// What to do with the release for the configured tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseAction {
    Create,
    Update,
}

/// Apply the manifest's create/update policy to the lookup result.
pub fn plan_release(target: &GithubTarget, exists: bool) -> PublisherResult<ReleaseAction> {
    match (exists, target.update_release, target.create_release) {
        (true, true, _) => Ok(ReleaseAction::Update),
        (true, false, _) => Err(PublisherError::ReleaseNotWritable {
            tag: target.tag.clone(),
            reason: "release exists and updating is disabled".into(),
        }),
        (false, _, true) => Ok(ReleaseAction::Create),
        (false, _, false) => Err(PublisherError::ReleaseNotWritable {
            tag: target.tag.clone(),
            reason: "no release for this tag and creating is disabled".into(),
        }),
    }
}

pub fn release_name(manifest: &ReleaseManifest, target: &GithubTarget) -> String {
    [manifest.display_name(), manifest.version(), target.tag.as_str()]
        .into_iter()
        .find(|s| !s.trim().is_empty())
        .unwrap_or_default()
        .to_string()
}

pub struct GithubAdapter {
    client: Client,
    api_url: String,
    uploads_url: String,
    retry: RetryPolicy,
}

impl GithubAdapter {
    pub fn new(client: Client, api_url: String, uploads_url: String, retry: RetryPolicy) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            uploads_url: uploads_url.trim_end_matches('/').to_string(),
            retry,
        }
    }

    fn authed(&self, req: RequestBuilder, token: &str) -> RequestBuilder {
        req.bearer_auth(token)
            .header(ACCEPT, GITHUB_JSON)
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    async fn default_branch(&self, token: &str, repo: &str) -> PublisherResult<String> {
        let url = format!("{}/repos/{}", self.api_url, repo);
        let resp = send_with_retry(Platform::Github, &self.retry, || {
            Ok(self.authed(self.client.get(&url), token))
        })
        .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(PublisherError::InvalidTarget(format!(
                "github repository '{}' not found or not accessible",
                repo
            )));
        }
        let repository = expect_success(Platform::Github, resp)
            .await?
            .json::<Repository>()
            .await?;
        Ok(repository.default_branch)
    }

    async fn tag_exists(&self, token: &str, repo: &str, tag: &str) -> PublisherResult<bool> {
        let url = format!("{}/repos/{}/git/ref/tags/{}", self.api_url, repo, tag);
        let resp = send_with_retry(Platform::Github, &self.retry, || {
            Ok(self.authed(self.client.get(&url), token))
        })
        .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        expect_success(Platform::Github, resp).await?;
        Ok(true)
    }

    async fn find_release(
        &self,
        token: &str,
        repo: &str,
        tag: &str,
    ) -> PublisherResult<Option<Release>> {
        let url = format!("{}/repos/{}/releases/tags/{}", self.api_url, repo, tag);
        let resp = send_with_retry(Platform::Github, &self.retry, || {
            Ok(self.authed(self.client.get(&url), token))
        })
        .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let release = expect_success(Platform::Github, resp)
            .await?
            .json::<Release>()
            .await?;
        Ok(Some(release))
    }

    async fn create_release(
        &self,
        token: &str,
        repo: &str,
        payload: &NewRelease,
    ) -> PublisherResult<Release> {
        let url = format!("{}/repos/{}/releases", self.api_url, repo);
        let resp = send_with_retry(Platform::Github, &self.retry, || {
            Ok(self.authed(self.client.post(&url), token).json(payload))
        })
        .await?;
        let release = expect_success(Platform::Github, resp)
            .await?
            .json::<Release>()
            .await?;
        Ok(release)
    }

    async fn delete_asset(&self, token: &str, repo: &str, asset: &ReleaseAsset) -> PublisherResult<()> {
        let url = format!("{}/repos/{}/releases/assets/{}", self.api_url, repo, asset.id);
        let resp = send_with_retry(Platform::Github, &self.retry, || {
            Ok(self.authed(self.client.delete(&url), token))
        })
        .await?;
        expect_success(Platform::Github, resp).await?;
        debug!("Deleted previous asset {}", asset.name);
        Ok(())
    }

    async fn delete_release(&self, token: &str, repo: &str, release_id: u64) -> PublisherResult<()> {
        let url = format!("{}/repos/{}/releases/{}", self.api_url, repo, release_id);
        let resp = send_with_retry(Platform::Github, &self.retry, || {
            Ok(self.authed(self.client.delete(&url), token))
        })
        .await?;
        expect_success(Platform::Github, resp).await?;
        Ok(())
    }

    async fn upload_asset(
        &self,
        token: &str,
        repo: &str,
        release_id: u64,
        artifact: &Artifact,
        bytes: Vec<u8>,
    ) -> PublisherResult<()> {
        let url = format!(
            "{}/repos/{}/releases/{}/assets",
            self.uploads_url, repo, release_id
        );
        let mut query = vec![("name", artifact.file_name())];
        if let Some(label) = &artifact.display_name {
            query.push(("label", label.clone()));
        }
        let mime = mime_for(artifact);
        let resp = send_with_retry(Platform::Github, &self.retry, || {
            Ok(self
                .authed(self.client.post(&url), token)
                .query(&query)
                .header(CONTENT_TYPE, mime)
                .body(bytes.clone()))
        })
        .await?;
        expect_success(Platform::Github, resp).await?;
        Ok(())
    }

    async fn finish_release(
        &self,
        token: &str,
        repo: &str,
        release_id: u64,
        finish: &ReleaseFinish,
    ) -> PublisherResult<Release> {
        let url = format!("{}/repos/{}/releases/{}", self.api_url, repo, release_id);
        let resp = send_with_retry(Platform::Github, &self.retry, || {
            Ok(self.authed(self.client.patch(&url), token).json(finish))
        })
        .await?;
        let release = expect_success(Platform::Github, resp)
            .await?
            .json::<Release>()
            .await?;
        Ok(release)
    }
}

#[async_trait]
impl PlatformAdapter for GithubAdapter {
    fn platform(&self) -> Platform {
        Platform::Github
    }

    async fn publish(&self, ctx: PublishContext<'_>) -> PublisherResult<RemoteRelease> {
        let manifest = ctx.manifest;
        let target = manifest.github().ok_or_else(|| {
            PublisherError::InvalidTarget("github is not configured in the manifest".into())
        })?;
        let artifacts = manifest.artifacts_for(Platform::Github);
        if artifacts.is_empty() {
            return Err(PublisherError::MissingArtifact(
                "no artifact applies to github".into(),
            ));
        }
        let name = release_name(manifest, target);
        let finish = ReleaseFinish {
            prerelease: manifest.version_type().is_prerelease(),
            draft: false,
        };

        if ctx.dry_run {
            info!(
                "[dry-run] GitHub release '{}' on {} tag {} (prerelease: {}), assets: {:?}",
                name,
                target.repo,
                target.tag,
                finish.prerelease,
                artifacts.iter().map(|a| a.file_name()).collect::<Vec<_>>()
            );
            return Ok(RemoteRelease::dry_run());
        }

        let token = ctx.credential.expose();
        let repo = target.repo.as_str();

        // 1. Repository and tag
        let branch = self.default_branch(token, repo).await?;
        if !target.create_tag && !self.tag_exists(token, repo, &target.tag).await? {
            return Err(PublisherError::ReleaseNotWritable {
                tag: target.tag.clone(),
                reason: "tag does not exist and creating tags is disabled".into(),
            });
        }

        // 2. Release
        let existing = self.find_release(token, repo, &target.tag).await?;
        let (release, created) = match (plan_release(target, existing.is_some())?, existing) {
            (ReleaseAction::Update, Some(release)) => {
                info!("Updating GitHub release {} ({})", target.tag, release.id);
                (release, false)
            }
            _ => {
                info!("Creating GitHub release {} on {}", target.tag, branch);
                let payload = NewRelease {
                    tag_name: target.tag.clone(),
                    target_commitish: branch,
                    name: name.clone(),
                    body: manifest.changelog().to_string(),
                    draft: true,
                    prerelease: finish.prerelease,
                };
                (self.create_release(token, repo, &payload).await?, true)
            }
        };

        // 3. Assets, then un-draft. A draft created here is removed on failure.
        let done = match self
            .fill_release(token, target, &release, &artifacts, &finish)
            .await
        {
            Ok(done) => done,
            Err(e) => {
                if created {
                    warn!("Removing draft release {} after failure", release.id);
                    if let Err(cleanup) = self.delete_release(token, repo, release.id).await {
                        warn!("Could not remove draft release {}: {}", release.id, cleanup);
                    }
                }
                return Err(e);
            }
        };
        info!("GitHub release ready at {}", done.html_url);

        Ok(RemoteRelease {
            id: done.id.to_string(),
            url: Some(done.html_url),
        })
    }
}

impl GithubAdapter {
    /// Upload every asset, replacing same-named ones, then publish.
    async fn fill_release(
        &self,
        token: &str,
        target: &GithubTarget,
        release: &Release,
        artifacts: &[&Artifact],
        finish: &ReleaseFinish,
    ) -> PublisherResult<Release> {
        let repo = target.repo.as_str();
        for artifact in artifacts {
            let file_name = artifact.file_name();
            if let Some(old) = release.assets.iter().find(|a| a.name == file_name) {
                warn!("Replacing existing asset {} on {}", file_name, target.tag);
                self.delete_asset(token, repo, old).await?;
            }
            let bytes = read_artifact(&artifact.path).await?;
            self.upload_asset(token, repo, release.id, artifact, bytes)
                .await?;
            debug!("Uploaded {} to GitHub release {}", file_name, release.id);
        }
        self.finish_release(token, repo, release.id, finish).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::credentials::Secret;
    use crate::core::error::ErrorKind;
    use crate::core::manifest::{ManifestFormat, ManifestLoader};
    use crate::core::test_server::{CannedResponse, RecordedRequest, TestServer};

    fn target(create_release: bool, update_release: bool) -> GithubTarget {
        GithubTarget {
            repo: "owner/mod".into(),
            tag: "v1.0.0".into(),
            create_tag: true,
            create_release,
            update_release,
            optional: false,
        }
    }

    #[test]
    fn plan_follows_policy() {
        assert_eq!(
            plan_release(&target(true, true), true).unwrap(),
            ReleaseAction::Update
        );
        assert_eq!(
            plan_release(&target(true, true), false).unwrap(),
            ReleaseAction::Create
        );
        assert_eq!(
            plan_release(&target(false, true), true).unwrap(),
            ReleaseAction::Update
        );
    }

    #[test]
    fn plan_rejects_disallowed_writes() {
        let err = plan_release(&target(true, false), true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReleaseNotWritable);
        let err = plan_release(&target(false, true), false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReleaseNotWritable);
        assert!(err.to_string().contains("v1.0.0"));
    }

    #[test]
    fn finish_payload_shape() {
        let json = serde_json::to_value(ReleaseFinish {
            prerelease: true,
            draft: false,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"prerelease": true, "draft": false}));
    }

    #[test]
    fn release_lookup_parses_assets() {
        let release: Release = serde_json::from_str(
            r#"{"id": 7, "html_url": "https://github.com/o/r/releases/tag/v1",
                "assets": [{"id": 3, "name": "mod.jar", "size": 10}]}"#,
        )
        .unwrap();
        assert_eq!(release.id, 7);
        assert_eq!(release.assets[0].name, "mod.jar");
    }

    const RELEASE: &str = "/repos/owner/mod/releases";

    fn repo_routes(req: &RecordedRequest) -> Option<CannedResponse> {
        match (req.method.as_str(), req.path()) {
            ("GET", "/repos/owner/mod") => Some(CannedResponse::json(
                200,
                serde_json::json!({ "default_branch": "main" }),
            )),
            ("PATCH", path) if path.starts_with(RELEASE) => Some(CannedResponse::json(
                200,
                serde_json::json!({
                    "id": path.rsplit('/').next().unwrap().parse::<u64>().unwrap(),
                    "html_url": "https://github.com/owner/mod/releases/tag/1.0.0",
                    "assets": []
                }),
            )),
            ("DELETE", _) => Some(CannedResponse::status(204)),
            _ => None,
        }
    }

    async fn publish_fixture(server: &TestServer) -> PublisherResult<RemoteRelease> {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mod.jar"), b"jar").unwrap();
        let manifest = ManifestLoader::new(None)
            .load_str(
                r#"
                version = "1.0.0"
                changelog = "notes"
                [[artifacts]]
                path = "mod.jar"
                [github]
                repo = "owner/mod"
                "#,
                ManifestFormat::Toml,
                dir.path(),
            )
            .await
            .unwrap();
        let secret = Secret::new("gh-token");

        GithubAdapter::new(server.client(), server.url(), server.url(), RetryPolicy::none())
            .publish(PublishContext {
                manifest: &manifest,
                dependencies: &[],
                credential: &secret,
                digests: &[],
                dry_run: false,
            })
            .await
    }

    #[tokio::test]
    async fn existing_release_gets_assets_replaced_and_published() {
        let server = TestServer::start(|req| {
            if let Some(resp) = repo_routes(req) {
                return resp;
            }
            match (req.method.as_str(), req.path()) {
                ("GET", "/repos/owner/mod/releases/tags/1.0.0") => CannedResponse::json(
                    200,
                    serde_json::json!({
                        "id": 7,
                        "html_url": "https://github.com/owner/mod/releases/tag/1.0.0",
                        "assets": [{ "id": 3, "name": "mod.jar" }]
                    }),
                ),
                ("POST", "/repos/owner/mod/releases/7/assets") => {
                    CannedResponse::json(201, serde_json::json!({ "id": 4 }))
                }
                _ => CannedResponse::status(500),
            }
        })
        .await;

        let remote = publish_fixture(&server).await.unwrap();
        assert_eq!(remote.id, "7");

        assert_eq!(server.count("POST", RELEASE), 0);
        assert_eq!(server.count("DELETE", "/repos/owner/mod/releases/assets/3"), 1);
        let requests = server.requests();
        let upload = requests
            .iter()
            .find(|r| r.is("POST", "/repos/owner/mod/releases/7/assets"))
            .unwrap();
        assert!(upload.target.ends_with("?name=mod.jar"));
        assert_eq!(upload.header("content-type"), Some("application/java-archive"));
        assert_eq!(upload.header("authorization"), Some("Bearer gh-token"));
        assert_eq!(upload.body, b"jar");

        let finish = requests
            .iter()
            .find(|r| r.is("PATCH", "/repos/owner/mod/releases/7"))
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&finish.body).unwrap();
        assert_eq!(body, serde_json::json!({ "prerelease": false, "draft": false }));
    }

    #[tokio::test]
    async fn failed_upload_removes_new_draft() {
        let server = TestServer::start(|req| {
            if let Some(resp) = repo_routes(req) {
                return resp;
            }
            match (req.method.as_str(), req.path()) {
                ("GET", "/repos/owner/mod/releases/tags/1.0.0") => CannedResponse::status(404),
                ("POST", RELEASE) => CannedResponse::json(
                    201,
                    serde_json::json!({
                        "id": 9,
                        "html_url": "https://github.com/owner/mod/releases/tag/untagged-1",
                        "assets": []
                    }),
                ),
                ("POST", "/repos/owner/mod/releases/9/assets") => CannedResponse::json(
                    422,
                    serde_json::json!({ "message": "Validation Failed" }),
                ),
                _ => CannedResponse::status(500),
            }
        })
        .await;

        let err = publish_fixture(&server).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PlatformRejected);
        let requests = server.requests();
        let created = requests.iter().find(|r| r.is("POST", RELEASE)).unwrap();
        let payload: serde_json::Value = serde_json::from_slice(&created.body).unwrap();
        assert_eq!(payload["draft"], true);
        assert_eq!(payload["target_commitish"], "main");
        assert_eq!(server.count("DELETE", "/repos/owner/mod/releases/9"), 1);
        assert_eq!(server.count("PATCH", "/repos/owner/mod/releases/9"), 0);
    }

    #[tokio::test]
    async fn failed_upload_keeps_existing_release() {
        let server = TestServer::start(|req| {
            if let Some(resp) = repo_routes(req) {
                return resp;
            }
            match (req.method.as_str(), req.path()) {
                ("GET", "/repos/owner/mod/releases/tags/1.0.0") => CannedResponse::json(
                    200,
                    serde_json::json!({
                        "id": 7,
                        "html_url": "https://github.com/owner/mod/releases/tag/1.0.0",
                        "assets": []
                    }),
                ),
                _ => CannedResponse::status(403),
            }
        })
        .await;

        let err = publish_fixture(&server).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PlatformRejected);
        assert_eq!(server.count("DELETE", "/repos/owner/mod/releases/7"), 0);
    }
}
