use std::path::Path;

use reqwest::Client;
use tracing::{debug, warn};

use super::raw::RawChangelog;
use crate::core::error::{PublisherError, PublisherResult};

/// Hosts remote changelogs may be fetched from.
pub const ALLOWED_CHANGELOG_HOSTS: [&str; 3] = [
    "https://gist.githubusercontent.com",
    "https://raw.githubusercontent.com",
    "https://paste.firstdark.dev/raw",
];

pub fn is_allowed_changelog_url(url: &str) -> bool {
    ALLOWED_CHANGELOG_HOSTS
        .iter()
        .any(|prefix| url.starts_with(prefix))
}

fn looks_like_url(text: &str) -> bool {
    text.starts_with("http://") || text.starts_with("https://")
}

/// Turns a [`RawChangelog`] into the final markdown text.
pub struct ChangelogResolver<'a> {
    client: Option<&'a Client>,
    base_dir: &'a Path,
}

impl<'a> ChangelogResolver<'a> {
    pub fn new(client: Option<&'a Client>, base_dir: &'a Path) -> Self {
        Self { client, base_dir }
    }

    pub async fn resolve(&self, raw: &RawChangelog) -> PublisherResult<String> {
        match raw {
            RawChangelog::Text(text) if looks_like_url(text.trim()) => {
                self.fetch_or_literal(text.trim()).await
            }
            RawChangelog::Text(text) => Ok(text.clone()),
            RawChangelog::Url { url } => self.fetch_or_literal(url.trim()).await,
            RawChangelog::File { file } => {
                let path = self.base_dir.join(file);
                tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|source| PublisherError::Io { path, source })
            }
        }
    }

    /// Fetch an allow-listed URL. Anything that cannot be fetched falls back
    /// to the URL itself as literal changelog text.
    async fn fetch_or_literal(&self, url: &str) -> PublisherResult<String> {
        if !is_allowed_changelog_url(url) {
            warn!("{} is an unsupported changelog site, using it as plain text", url);
            return Ok(url.to_string());
        }

        let Some(client) = self.client else {
            warn!("No HTTP client available to fetch changelog {}", url);
            return Ok(url.to_string());
        };

        let resp = match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                warn!("Changelog fetch returned {} for {}", resp.status(), url);
                return Ok(url.to_string());
            }
            Err(e) => {
                warn!("Could not fetch changelog {}: {}", url, e);
                return Ok(url.to_string());
            }
        };

        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Could not read changelog {}: {}", url, e);
                return Ok(url.to_string());
            }
        };
        if body.trim().is_empty() {
            warn!("Changelog at {} is empty, using the URL as text", url);
            return Ok(url.to_string());
        }

        debug!("Fetched changelog from {} ({} bytes)", url, body.len());
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_accepts_raw_gist_urls() {
        assert!(is_allowed_changelog_url(
            "https://gist.githubusercontent.com/hypherionmc/92f825d3/raw/test_gist.md"
        ));
        assert!(is_allowed_changelog_url(
            "https://paste.firstdark.dev/raw/abcdef"
        ));
    }

    #[test]
    fn allow_list_rejects_html_gist_pages() {
        assert!(!is_allowed_changelog_url(
            "https://gist.github.com/hypherionmc/92f825d3c9337964cc77c9c8c9bf65e6"
        ));
    }

    #[tokio::test]
    async fn plain_text_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = ChangelogResolver::new(None, dir.path());
        let text = resolver
            .resolve(&RawChangelog::Text("Hello World".into()))
            .await
            .unwrap();
        assert_eq!(text, "Hello World");
    }

    #[tokio::test]
    async fn unsupported_url_is_kept_literally() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = ChangelogResolver::new(None, dir.path());
        let url = "https://example.com/changelog.md";
        let text = resolver
            .resolve(&RawChangelog::Url { url: url.into() })
            .await
            .unwrap();
        assert_eq!(text, url);
    }

    #[tokio::test]
    async fn file_changelog_is_read_relative_to_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("CHANGELOG.md"), "- fixed things\n").unwrap();
        let resolver = ChangelogResolver::new(None, dir.path());
        let text = resolver
            .resolve(&RawChangelog::File {
                file: "CHANGELOG.md".into(),
            })
            .await
            .unwrap();
        assert_eq!(text, "- fixed things\n");
    }

    #[tokio::test]
    async fn missing_changelog_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = ChangelogResolver::new(None, dir.path());
        let err = resolver
            .resolve(&RawChangelog::File {
                file: "nope.md".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PublisherError::Io { .. }));
    }
}
