use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::error::{PublisherError, PublisherResult};
use crate::core::http::RetryPolicy;

const APP_DIR_NAME: &str = "modpublisher";
const SETTINGS_FILE: &str = "settings.json";

pub const DEFAULT_USER_AGENT: &str =
    "modpublisher/0.1.0 (https://github.com/firstdarkdev/modpublisher)";

/// Base URLs for every platform API. Overridable for staging or mirrors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Endpoints {
    pub curseforge: String,
    pub modrinth: String,
    pub modrinth_staging: String,
    pub github_api: String,
    pub github_uploads: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            curseforge: "https://minecraft.curseforge.com".into(),
            modrinth: "https://api.modrinth.com/v2".into(),
            modrinth_staging: "https://staging-api.modrinth.com/v2".into(),
            github_api: "https://api.github.com".into(),
            github_uploads: "https://uploads.github.com".into(),
        }
    }
}

/// Tunables read from `settings.json`. Every field has a default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PublisherSettings {
    pub user_agent: String,
    /// Per HTTP request.
    pub request_timeout_secs: u64,
    /// Per platform publish attempt, retries included.
    pub publish_timeout_secs: u64,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub endpoints: Endpoints,
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.into(),
            request_timeout_secs: 60,
            publish_timeout_secs: 600,
            max_retries: 3,
            base_backoff_ms: 500,
            max_backoff_ms: 8_000,
            endpoints: Endpoints::default(),
        }
    }
}

impl PublisherSettings {
    /// Load settings from an explicit file, or from the per-user config
    /// directory when `path` is `None`. A missing default file yields the
    /// defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> PublisherResult<Self> {
        match path {
            Some(p) => Self::read(p),
            None => match default_settings_path() {
                Some(p) if p.exists() => Self::read(&p).or_else(|e| {
                    warn!("Ignoring unreadable settings at {:?}: {}", p, e);
                    Ok(Self::default())
                }),
                _ => Ok(Self::default()),
            },
        }
    }

    fn read(path: &Path) -> PublisherResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| PublisherError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = serde_json::from_str(&raw)?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_backoff: Duration::from_millis(self.base_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }
}

pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join(APP_DIR_NAME).join(SETTINGS_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{ "max_retries": 5, "endpoints": { "modrinth": "http://localhost:8080" } }"#,
        )
        .unwrap();

        let settings = PublisherSettings::load(Some(&path)).unwrap();
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.endpoints.modrinth, "http://localhost:8080");
        assert_eq!(settings.endpoints.github_api, "https://api.github.com");
        assert_eq!(settings.publish_timeout_secs, 600);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PublisherSettings::load(Some(&dir.path().join("nope.json"))).unwrap_err();
        assert!(matches!(err, PublisherError::Io { .. }));
    }

    #[test]
    fn retry_policy_mirrors_settings() {
        let settings = PublisherSettings {
            max_retries: 2,
            base_backoff_ms: 100,
            max_backoff_ms: 1_000,
            ..Default::default()
        };
        let policy = settings.retry_policy();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.base_backoff, Duration::from_millis(100));
    }
}
