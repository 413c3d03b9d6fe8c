use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use crate::core::error::{PublisherError, PublisherResult};
use crate::core::manifest::Platform;

/// Longest remote error body kept in an error message.
const MAX_ERROR_BODY: usize = 500;

pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(user_agent)
        .default_headers(default_headers)
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
}

/// Header value for an API token, flagged so it is never printed in
/// request dumps.
pub fn token_header(token: &str) -> PublisherResult<HeaderValue> {
    let mut value = HeaderValue::from_str(token).map_err(|_| {
        PublisherError::Other("API token contains characters not allowed in a header".into())
    })?;
    value.set_sensitive(true);
    Ok(value)
}

/// Bounded exponential backoff, applied per request by each adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
}

/// Send a request, retrying transient failures.
///
/// `build` is called once per attempt since multipart bodies cannot be
/// cloned. Returns the first response that is not retryable (including
/// 4xx responses; use [`expect_success`] to reject those).
pub async fn send_with_retry<F>(
    platform: Platform,
    policy: &RetryPolicy,
    mut build: F,
) -> PublisherResult<Response>
where
    F: FnMut() -> PublisherResult<RequestBuilder>,
{
    let mut attempt: u32 = 0;
    loop {
        let request = build()?;
        let last = attempt >= policy.max_retries;

        match request.send().await {
            Ok(resp) if is_retryable_status(resp.status()) => {
                let status = resp.status();
                if last {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(PublisherError::NetworkFailure {
                        platform,
                        attempts: attempt + 1,
                        message: format!("HTTP {}: {}", status.as_u16(), truncate(&body)),
                    });
                }
                warn!(
                    "{} returned {} (attempt {}), retrying",
                    platform,
                    status,
                    attempt + 1
                );
            }
            Ok(resp) => return Ok(resp),
            Err(e) if is_retryable_error(&e) => {
                if last {
                    return Err(PublisherError::NetworkFailure {
                        platform,
                        attempts: attempt + 1,
                        message: e.to_string(),
                    });
                }
                warn!("{} request failed (attempt {}): {}, retrying", platform, attempt + 1, e);
            }
            Err(e) => return Err(PublisherError::Http(e)),
        }

        let delay = policy.backoff(attempt);
        debug!("{}: backing off {:?}", platform, delay);
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Map a non-2xx response to [`PublisherError::PlatformRejected`].
pub async fn expect_success(platform: Platform, resp: Response) -> PublisherResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(PublisherError::PlatformRejected {
        platform,
        status: status.as_u16(),
        message: truncate(&body),
    })
}

fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(MAX_ERROR_BODY).collect();
    format!("{}…", cut)
}
