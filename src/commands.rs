use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};

use crate::core::checks::{run_local_checks, ArtifactDigest};
use crate::core::coordinator::{
    PublishOutcome, PublishReport, UploadCoordinator, EXIT_INVALID, EXIT_SUCCESS,
};
use crate::core::credentials::Credentials;
use crate::core::dependency::DependencyResolver;
use crate::core::error::{ErrorKind, PublisherError, PublisherResult};
use crate::core::http::build_http_client;
use crate::core::manifest::{ManifestLoader, Platform, ReleaseManifest, DEFAULT_MANIFEST};
use crate::core::settings::PublisherSettings;

#[derive(Debug, Parser)]
#[command(name = "modpublisher", version)]
#[command(about = "Publish a Minecraft mod release to CurseForge, Modrinth and GitHub", long_about = None)]
pub struct Cli {
    /// More log output (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate the manifest and publish to every configured platform
    Publish(PublishArgs),
    /// Load, resolve and check the manifest without contacting any platform
    Validate(ValidateArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlatformArg {
    #[value(alias = "curse")]
    Curseforge,
    Modrinth,
    Github,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Curseforge => Platform::CurseForge,
            PlatformArg::Modrinth => Platform::Modrinth,
            PlatformArg::Github => Platform::Github,
        }
    }
}

#[derive(Debug, Args)]
pub struct PublishArgs {
    /// Release manifest (TOML, or JSON by extension)
    #[arg(short, long, default_value = DEFAULT_MANIFEST)]
    pub manifest: PathBuf,

    /// Build and log every payload without publishing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Only publish to these platforms
    #[arg(long, value_enum, num_args = 1..)]
    pub only: Vec<PlatformArg>,

    /// Settings file (defaults to the per-user config directory)
    #[arg(long, env = "MODPUBLISHER_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Per-platform publish timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Release manifest (TOML, or JSON by extension)
    #[arg(short, long, default_value = DEFAULT_MANIFEST)]
    pub manifest: PathBuf,

    /// Settings file (defaults to the per-user config directory)
    #[arg(long, env = "MODPUBLISHER_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run a parsed command line and return the process exit code.
pub async fn dispatch(cli: Cli) -> u8 {
    match cli.command {
        Command::Publish(args) => publish(args).await,
        Command::Validate(args) => validate(args).await,
    }
}

async fn publish(args: PublishArgs) -> u8 {
    let (settings, manifest) = match prepare(&args.manifest, args.settings.as_deref()).await {
        Ok(v) => v,
        Err(e) => return fail(&e, args.json),
    };
    let mut settings = settings;
    if let Some(secs) = args.timeout {
        settings.publish_timeout_secs = secs;
    }

    let client = match build_http_client(&settings.user_agent, settings.request_timeout()) {
        Ok(c) => c,
        Err(e) => return fail(&PublisherError::from(e), args.json),
    };
    let credentials = Arc::new(Credentials::from_env());
    let coordinator = UploadCoordinator::with_client(settings, credentials, client)
        .dry_run(args.dry_run)
        .only(args.only.into_iter().map(Platform::from).collect());

    match coordinator.publish(Arc::new(manifest)).await {
        Ok(report) => {
            print_report(&report, args.json);
            report.exit_code()
        }
        Err(e) => fail(&e, args.json),
    }
}

#[derive(Debug, Serialize)]
struct ValidationSummary<'a> {
    version: &'a str,
    display_name: &'a str,
    version_type: &'static str,
    targets: Vec<Platform>,
    dependencies: usize,
    missing_credentials: Vec<Platform>,
    digests: Vec<ArtifactDigest>,
}

async fn validate(args: ValidateArgs) -> u8 {
    let result: PublisherResult<u8> = async {
        let (_, manifest) = prepare(&args.manifest, args.settings.as_deref()).await?;
        let dependencies = DependencyResolver::resolve(&manifest)?;
        let digests = run_local_checks(&manifest).await?;

        let credentials = Credentials::from_env();
        let targets = manifest.targets();
        let missing_credentials: Vec<Platform> = targets
            .iter()
            .copied()
            .filter(|p| !credentials.has(*p))
            .collect();
        for platform in &missing_credentials {
            warn!(
                "No token for {} (set {})",
                platform,
                platform.credential_keys().join(" or ")
            );
        }

        let summary = ValidationSummary {
            version: manifest.version(),
            display_name: manifest.display_name(),
            version_type: manifest.version_type().as_str(),
            targets,
            dependencies: dependencies.len(),
            missing_credentials,
            digests,
        };
        print_summary(&summary, args.json)?;
        Ok(EXIT_SUCCESS)
    }
    .await;

    result.unwrap_or_else(|e| fail(&e, args.json))
}

/// Settings, then the manifest. Changelog URLs are fetched with the
/// configured client.
async fn prepare(
    manifest_path: &Path,
    settings_path: Option<&Path>,
) -> PublisherResult<(PublisherSettings, ReleaseManifest)> {
    let settings = PublisherSettings::load(settings_path)?;
    let client = build_http_client(&settings.user_agent, settings.request_timeout())?;
    let manifest = ManifestLoader::new(Some(client)).load(manifest_path).await?;
    info!(
        "Loaded {} {} targeting {}",
        manifest.display_name(),
        manifest.version(),
        manifest
            .targets()
            .iter()
            .map(Platform::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok((settings, manifest))
}

#[derive(Debug, Serialize)]
struct ErrorOutput<'a> {
    kind: ErrorKind,
    error: &'a PublisherError,
}

fn fail(err: &PublisherError, json: bool) -> u8 {
    if json {
        let out = ErrorOutput {
            kind: err.kind(),
            error: err,
        };
        match serde_json::to_string_pretty(&out) {
            Ok(text) => println!("{}", text),
            Err(_) => eprintln!("Error: {}", err),
        }
    } else {
        eprintln!("Error: {}", err);
    }
    EXIT_INVALID
}

fn print_report(report: &PublishReport, json: bool) {
    if json {
        match serde_json::to_string_pretty(report) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Error: could not serialize report: {}", e),
        }
        return;
    }

    println!(
        "Release {}{} (run {})",
        report.version,
        if report.dry_run { " [dry run]" } else { "" },
        report.run_id
    );
    for result in report.results() {
        let optional = if result.optional { " (optional)" } else { "" };
        match &result.outcome {
            PublishOutcome::Success { remote } => println!(
                "  ✔ {:<10} {}{}",
                result.platform.to_string(),
                remote.url.as_deref().unwrap_or(&remote.id),
                optional
            ),
            PublishOutcome::Failed { message, .. } => println!(
                "  ✘ {:<10} {}{}",
                result.platform.to_string(),
                message,
                optional
            ),
        }
    }
}

fn print_summary(summary: &ValidationSummary<'_>, json: bool) -> PublisherResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!(
        "{} {} ({}) is valid",
        summary.display_name, summary.version, summary.version_type
    );
    println!(
        "  targets:      {}",
        summary
            .targets
            .iter()
            .map(Platform::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  dependencies: {}", summary.dependencies);
    for digest in &summary.digests {
        println!(
            "  {} ({} bytes) sha1 {}",
            digest.path.display(),
            digest.size,
            digest.sha1
        );
    }
    if !summary.missing_credentials.is_empty() {
        println!(
            "  missing tokens: {}",
            summary
                .missing_credentials
                .iter()
                .map(Platform::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    Ok(())
}
