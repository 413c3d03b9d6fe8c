use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::core::manifest::Platform;

/// Central error type for the entire publisher backend.
/// Every module returns `Result<T, PublisherError>`.
#[derive(Debug, Error)]
pub enum PublisherError {
    // ── Manifest ────────────────────────────────────────
    #[error("Missing artifact: {0}")]
    MissingArtifact(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    // ── Dependencies ────────────────────────────────────
    #[error("Dependency conflict on {platform}: {} declared under more than one kind", slugs.join(", "))]
    DependencyConflict {
        platform: Platform,
        slugs: Vec<String>,
    },

    // ── Credentials ─────────────────────────────────────
    #[error("No credential configured for {0}")]
    MissingCredential(Platform),

    // ── Remote ──────────────────────────────────────────
    #[error("{platform} rejected the request (HTTP {status}): {message}")]
    PlatformRejected {
        platform: Platform,
        status: u16,
        message: String,
    },

    #[error("Network failure talking to {platform} after {attempts} attempt(s): {message}")]
    NetworkFailure {
        platform: Platform,
        attempts: u32,
        message: String,
    },

    #[error("{platform} publish timed out after {after_secs}s")]
    Timeout { platform: Platform, after_secs: u64 },

    #[error("GitHub release {tag} cannot be written: {reason}")]
    ReleaseNotWritable { tag: String, reason: String },

    // ── Artifact checks ─────────────────────────────────
    #[error("Artifact {path:?} looks empty: {reason}")]
    EmptyJar { path: PathBuf, reason: String },

    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    // ── Formats ─────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type PublisherResult<T> = Result<T, PublisherError>;

/// Coarse classification of a [`PublisherError`], as reported per platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingArtifact,
    InvalidTarget,
    InvalidManifest,
    DependencyConflict,
    MissingCredential,
    PlatformRejected,
    NetworkFailure,
    ReleaseNotWritable,
    EmptyJar,
    Io,
    Other,
}

impl PublisherError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PublisherError::MissingArtifact(_) => ErrorKind::MissingArtifact,
            PublisherError::InvalidTarget(_) => ErrorKind::InvalidTarget,
            PublisherError::InvalidManifest(_)
            | PublisherError::Json(_)
            | PublisherError::Toml(_) => ErrorKind::InvalidManifest,
            PublisherError::DependencyConflict { .. } => ErrorKind::DependencyConflict,
            PublisherError::MissingCredential(_) => ErrorKind::MissingCredential,
            PublisherError::PlatformRejected { .. } => ErrorKind::PlatformRejected,
            PublisherError::NetworkFailure { .. }
            | PublisherError::Timeout { .. }
            | PublisherError::Http(_) => ErrorKind::NetworkFailure,
            PublisherError::ReleaseNotWritable { .. } => ErrorKind::ReleaseNotWritable,
            PublisherError::EmptyJar { .. } | PublisherError::Zip(_) => ErrorKind::EmptyJar,
            PublisherError::Io { .. } => ErrorKind::Io,
            PublisherError::Other(_) => ErrorKind::Other,
        }
    }

    /// Errors raised before any platform is contacted.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::MissingArtifact
                | ErrorKind::InvalidTarget
                | ErrorKind::InvalidManifest
                | ErrorKind::DependencyConflict
                | ErrorKind::EmptyJar
        )
    }
}

impl From<std::io::Error> for PublisherError {
    fn from(source: std::io::Error) -> Self {
        PublisherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

// ── Serialization for the JSON report ───────────────────
impl serde::Serialize for PublisherError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_lists_slugs() {
        let err = PublisherError::DependencyConflict {
            platform: Platform::Modrinth,
            slugs: vec!["fabric-api".into(), "sodium".into()],
        };
        assert_eq!(err.kind(), ErrorKind::DependencyConflict);
        assert!(err.to_string().contains("fabric-api, sodium"));
        assert!(err.is_validation());
    }

    #[test]
    fn timeouts_are_network_failures() {
        let err = PublisherError::Timeout {
            platform: Platform::Github,
            after_secs: 30,
        };
        assert_eq!(err.kind(), ErrorKind::NetworkFailure);
        assert!(!err.is_validation());
    }
}
