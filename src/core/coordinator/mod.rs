// ─── Upload Coordinator ───
// Pending → Validating → Publishing → Completed.
// One independent attempt per targeted platform; a failure on one platform
// never cancels the others.

mod report;
mod state;

pub use report::{
    PublishOutcome, PublishReport, PublishResult, EXIT_INVALID, EXIT_PLATFORM_FAILED,
    EXIT_SUCCESS,
};
pub use state::CoordinatorState;

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures_util::future::join_all;
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::core::checks::{run_local_checks, ArtifactDigest};
use crate::core::credentials::Credentials;
use crate::core::dependency::{DependencyResolver, ResolvedDependencies};
use crate::core::error::{PublisherError, PublisherResult};
use crate::core::http::build_http_client;
use crate::core::manifest::{Platform, ReleaseManifest};
use crate::core::platforms::{Adapter, PlatformAdapter, PublishContext, RemoteRelease};
use crate::core::settings::PublisherSettings;

pub struct UploadCoordinator {
    settings: PublisherSettings,
    credentials: Arc<Credentials>,
    client: Client,
    state: Mutex<CoordinatorState>,
    dry_run: bool,
    only: Option<Vec<Platform>>,
}

impl UploadCoordinator {
    pub fn new(settings: PublisherSettings, credentials: Arc<Credentials>) -> PublisherResult<Self> {
        let client = build_http_client(&settings.user_agent, settings.request_timeout())?;
        Ok(Self::with_client(settings, credentials, client))
    }

    pub fn with_client(
        settings: PublisherSettings,
        credentials: Arc<Credentials>,
        client: Client,
    ) -> Self {
        Self {
            settings,
            credentials,
            client,
            state: Mutex::new(CoordinatorState::Pending),
            dry_run: false,
            only: None,
        }
    }

    /// Build and log payloads without calling any platform.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Restrict the run to a subset of the manifest's targets.
    pub fn only(mut self, platforms: Vec<Platform>) -> Self {
        self.only = if platforms.is_empty() {
            None
        } else {
            Some(platforms)
        };
        self
    }

    pub async fn state(&self) -> CoordinatorState {
        *self.state.lock().await
    }

    async fn advance(&self, next: CoordinatorState) -> PublisherResult<()> {
        let mut state = self.state.lock().await;
        if !state.can_advance_to(next) {
            return Err(PublisherError::Other(format!(
                "coordinator cannot move from {} to {}",
                *state, next
            )));
        }
        debug!("Coordinator {} -> {}", *state, next);
        *state = next;
        Ok(())
    }

    /// Platforms this run publishes to, in reporting order.
    fn selected_platforms(&self, manifest: &ReleaseManifest) -> PublisherResult<Vec<Platform>> {
        let targets = manifest.targets();
        match &self.only {
            None => Ok(targets),
            Some(only) => {
                if let Some(missing) = only.iter().find(|p| !targets.contains(p)) {
                    return Err(PublisherError::InvalidTarget(format!(
                        "{} was requested but is not configured in the manifest",
                        missing
                    )));
                }
                Ok(targets.into_iter().filter(|p| only.contains(p)).collect())
            }
        }
    }

    /// Publish with the built-in HTTP adapters.
    pub async fn publish(&self, manifest: Arc<ReleaseManifest>) -> PublisherResult<PublishReport> {
        let adapters: Vec<Adapter> = Platform::ALL
            .into_iter()
            .map(|p| Adapter::new(p, self.client.clone(), &self.settings))
            .collect();
        self.publish_with(manifest, adapters).await
    }

    /// Publish through the given adapters. Validation errors are returned as
    /// `Err`; platform failures are recorded in the report.
    pub async fn publish_with<A: PlatformAdapter>(
        &self,
        manifest: Arc<ReleaseManifest>,
        adapters: Vec<A>,
    ) -> PublisherResult<PublishReport> {
        let mut report = PublishReport::new(manifest.version(), self.dry_run);
        info!(
            "Publish run {} for {}{}",
            report.run_id,
            manifest.display_name(),
            if self.dry_run { " (dry run)" } else { "" }
        );

        // 1. Validation: nothing leaves the machine if this fails
        self.advance(CoordinatorState::Validating).await?;
        report.state = CoordinatorState::Validating;
        let validated = self.validate(&manifest).await;
        let (platforms, dependencies, digests) = match validated {
            Ok(v) => v,
            Err(e) => {
                error!("Validation failed: {}", e);
                self.advance(CoordinatorState::Completed).await?;
                return Err(e);
            }
        };
        report.digests = digests;

        // 2. Fan out
        self.advance(CoordinatorState::Publishing).await?;
        report.state = CoordinatorState::Publishing;

        let attempts = platforms.iter().map(|platform| {
            let adapter = adapters.iter().find(|a| a.platform() == *platform);
            self.attempt(
                *platform,
                adapter,
                &manifest,
                &dependencies,
                &report.digests,
            )
        });
        let results = join_all(attempts).await;

        // 3. Collect in platform order
        for result in results {
            report.push(result);
        }
        self.advance(CoordinatorState::Completed).await?;
        report.finish();

        let failed = report.results().iter().filter(|r| !r.is_success()).count();
        if failed == 0 {
            info!("Published to {} platform(s)", report.results().len());
        } else {
            warn!(
                "{} of {} platform(s) failed",
                failed,
                report.results().len()
            );
        }
        Ok(report)
    }

    async fn validate(
        &self,
        manifest: &ReleaseManifest,
    ) -> PublisherResult<(Vec<Platform>, ResolvedDependencies, Vec<ArtifactDigest>)> {
        let platforms = self.selected_platforms(manifest)?;
        let dependencies = DependencyResolver::resolve(manifest)?;
        let digests = run_local_checks(manifest).await?;
        Ok((platforms, dependencies, digests))
    }

    async fn attempt<A: PlatformAdapter>(
        &self,
        platform: Platform,
        adapter: Option<&A>,
        manifest: &ReleaseManifest,
        dependencies: &ResolvedDependencies,
        digests: &[ArtifactDigest],
    ) -> PublishResult {
        let started = Instant::now();
        let outcome = match self
            .run_attempt(platform, adapter, manifest, dependencies, digests)
            .await
        {
            Ok(remote) => {
                info!(
                    "{}: published {}",
                    platform,
                    remote.url.as_deref().unwrap_or(&remote.id)
                );
                PublishOutcome::Success { remote }
            }
            Err(e) => {
                error!("{}: {}", platform, e);
                PublishOutcome::failed(&e)
            }
        };

        PublishResult {
            platform,
            optional: manifest.is_optional(platform),
            outcome,
            elapsed_ms: started.elapsed().as_millis() as u64,
            finished_at: Utc::now(),
        }
    }

    async fn run_attempt<A: PlatformAdapter>(
        &self,
        platform: Platform,
        adapter: Option<&A>,
        manifest: &ReleaseManifest,
        dependencies: &ResolvedDependencies,
        digests: &[ArtifactDigest],
    ) -> PublisherResult<RemoteRelease> {
        let credential = self
            .credentials
            .get(platform)
            .ok_or(PublisherError::MissingCredential(platform))?;
        let adapter = adapter
            .ok_or_else(|| PublisherError::Other(format!("no adapter registered for {}", platform)))?;

        let ctx = PublishContext {
            manifest,
            dependencies: dependencies.for_platform(platform),
            credential,
            digests,
            dry_run: self.dry_run,
        };

        let limit = self.settings.publish_timeout();
        match tokio::time::timeout(limit, adapter.publish(ctx)).await {
            Ok(result) => result,
            Err(_) => Err(PublisherError::Timeout {
                platform,
                after_secs: limit.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::core::error::ErrorKind;
    use crate::core::manifest::{ManifestFormat, ManifestLoader};

    struct FakeAdapter {
        platform: Platform,
        calls: Arc<AtomicUsize>,
        fail: bool,
        delay: Duration,
    }

    impl FakeAdapter {
        fn boxed(platform: Platform, calls: &Arc<AtomicUsize>) -> Box<dyn PlatformAdapter> {
            Box::new(Self {
                platform,
                calls: calls.clone(),
                fail: false,
                delay: Duration::ZERO,
            })
        }
    }

    #[async_trait]
    impl PlatformAdapter for FakeAdapter {
        fn platform(&self) -> Platform {
            self.platform
        }

        async fn publish(&self, ctx: PublishContext<'_>) -> PublisherResult<RemoteRelease> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(PublisherError::PlatformRejected {
                    platform: self.platform,
                    status: 400,
                    message: "bad".into(),
                });
            }
            Ok(RemoteRelease {
                id: format!("{}-{}", self.platform, ctx.manifest.version()),
                url: None,
            })
        }
    }

    const MANIFEST: &str = r#"
        version = "1.0.0"
        changelog = "notes"
        game_versions = ["1.20.1"]
        loaders = ["fabric"]

        [[artifacts]]
        path = "mod.jar"

        [checks]
        empty_jar = false

        [curseforge]
        project_id = 1

        [modrinth]
        project_id = "AANobbMI"

        [github]
        repo = "owner/mod"
    "#;

    async fn manifest(text: &str) -> (tempfile::TempDir, Arc<ReleaseManifest>) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mod.jar"), b"not really a jar").unwrap();
        let manifest = ManifestLoader::new(None)
            .load_str(text, ManifestFormat::Toml, dir.path())
            .await
            .unwrap();
        (dir, Arc::new(manifest))
    }

    fn all_credentials() -> Arc<Credentials> {
        Arc::new(
            Credentials::default()
                .with_token(Platform::CurseForge, "c")
                .with_token(Platform::Modrinth, "m")
                .with_token(Platform::Github, "g"),
        )
    }

    fn fakes(calls: &Arc<AtomicUsize>) -> Vec<Box<dyn PlatformAdapter>> {
        Platform::ALL
            .into_iter()
            .map(|p| FakeAdapter::boxed(p, calls))
            .collect()
    }

    fn coordinator(credentials: Arc<Credentials>) -> UploadCoordinator {
        UploadCoordinator::with_client(PublisherSettings::default(), credentials, Client::new())
    }

    #[tokio::test]
    async fn full_success_reports_every_platform() {
        let (_dir, manifest) = manifest(MANIFEST).await;
        let calls = Arc::new(AtomicUsize::new(0));
        let coordinator = coordinator(all_credentials());

        let report = coordinator
            .publish_with(manifest, fakes(&calls))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(report.is_full_success());
        assert_eq!(report.exit_code(), EXIT_SUCCESS);
        assert_eq!(report.state, CoordinatorState::Completed);
        assert!(report.finished_at.is_some());
        assert_eq!(report.digests.len(), 1);
        let order: Vec<Platform> = report.results().iter().map(|r| r.platform).collect();
        assert_eq!(order, Platform::ALL.to_vec());
        assert_eq!(coordinator.state().await, CoordinatorState::Completed);
    }

    #[tokio::test]
    async fn missing_credential_skips_only_that_platform() {
        let (_dir, manifest) = manifest(MANIFEST).await;
        let calls = Arc::new(AtomicUsize::new(0));
        let credentials = Arc::new(
            Credentials::default()
                .with_token(Platform::CurseForge, "c")
                .with_token(Platform::Github, "g"),
        );

        let report = coordinator(credentials)
            .publish_with(manifest, fakes(&calls))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.results().len(), 3);
        let modrinth = report.result_for(Platform::Modrinth).unwrap();
        assert_eq!(modrinth.error_kind(), Some(ErrorKind::MissingCredential));
        assert!(report.result_for(Platform::CurseForge).unwrap().is_success());
        assert!(report.result_for(Platform::Github).unwrap().is_success());
        assert_eq!(report.exit_code(), EXIT_PLATFORM_FAILED);
    }

    #[tokio::test]
    async fn one_failure_does_not_cancel_siblings() {
        let (_dir, manifest) = manifest(MANIFEST).await;
        let calls = Arc::new(AtomicUsize::new(0));
        let adapters: Vec<Box<dyn PlatformAdapter>> = vec![
            Box::new(FakeAdapter {
                platform: Platform::CurseForge,
                calls: calls.clone(),
                fail: true,
                delay: Duration::ZERO,
            }),
            Box::new(FakeAdapter {
                platform: Platform::Modrinth,
                calls: calls.clone(),
                fail: false,
                delay: Duration::from_millis(20),
            }),
            FakeAdapter::boxed(Platform::Github, &calls),
        ];

        let report = coordinator(all_credentials())
            .publish_with(manifest, adapters)
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            report.result_for(Platform::CurseForge).unwrap().error_kind(),
            Some(ErrorKind::PlatformRejected)
        );
        assert!(report.result_for(Platform::Modrinth).unwrap().is_success());
        assert!(!report.is_full_success());
    }

    #[tokio::test]
    async fn dependency_conflict_aborts_before_any_attempt() {
        let text = format!(
            "{}\n[modrinth.dependencies]\nrequired = [\"sodium\"]\nincompatible = [\"Sodium\"]\n",
            MANIFEST
        );
        let (_dir, manifest) = manifest(&text).await;
        let calls = Arc::new(AtomicUsize::new(0));
        let coordinator = coordinator(all_credentials());

        let err = coordinator
            .publish_with(manifest, fakes(&calls))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DependencyConflict);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.state().await, CoordinatorState::Completed);
    }

    #[tokio::test]
    async fn slow_platform_times_out() {
        let (_dir, manifest) = manifest(MANIFEST).await;
        let calls = Arc::new(AtomicUsize::new(0));
        let settings = PublisherSettings {
            publish_timeout_secs: 0,
            ..PublisherSettings::default()
        };
        let adapters: Vec<Box<dyn PlatformAdapter>> = vec![Box::new(FakeAdapter {
            platform: Platform::Github,
            calls: calls.clone(),
            fail: false,
            delay: Duration::from_millis(200),
        })];

        let report = UploadCoordinator::with_client(settings, all_credentials(), Client::new())
            .only(vec![Platform::Github])
            .publish_with(manifest, adapters)
            .await
            .unwrap();

        assert_eq!(report.results().len(), 1);
        assert_eq!(
            report.results()[0].error_kind(),
            Some(ErrorKind::NetworkFailure)
        );
    }

    #[tokio::test]
    async fn only_filter_rejects_untargeted_platform() {
        let text = MANIFEST.replace("[github]\n        repo = \"owner/mod\"", "");
        let (_dir, manifest) = manifest(&text).await;
        let calls = Arc::new(AtomicUsize::new(0));

        let err = coordinator(all_credentials())
            .only(vec![Platform::Github])
            .publish_with(manifest, fakes(&calls))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidTarget);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn coordinator_is_single_use() {
        let (_dir, manifest) = manifest(MANIFEST).await;
        let calls = Arc::new(AtomicUsize::new(0));
        let coordinator = coordinator(all_credentials());

        coordinator
            .publish_with(manifest.clone(), fakes(&calls))
            .await
            .unwrap();
        assert!(coordinator.publish_with(manifest, fakes(&calls)).await.is_err());
    }

    #[tokio::test]
    async fn dry_run_adapters_make_no_calls() {
        let (_dir, manifest) = manifest(MANIFEST).await;
        let report = coordinator(all_credentials())
            .dry_run(true)
            .publish(manifest)
            .await
            .unwrap();

        assert!(report.dry_run);
        assert!(report.is_full_success());
        for result in report.results() {
            match &result.outcome {
                PublishOutcome::Success { remote } => assert_eq!(remote.id, "dry-run"),
                other => panic!("unexpected outcome {other:?}"),
            }
        }
    }
}
