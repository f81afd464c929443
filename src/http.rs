use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context as _;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::HeaderMap;
use serde_json::Value;

use crate::cache::{JsonCache, cache_key};
use crate::config::HostConfig;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("not found: {url}")]
    NotFound { url: String },
    #[error("request rejected ({status}) for {url}: {message}")]
    Rejected {
        status: u16,
        url: String,
        message: String,
    },
    #[error("gave up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: String,
    },
    #[error("invalid JSON from {url}: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// `base_delay * 2^(attempt-1)` before the given retry.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        self.base_delay
            .saturating_mul(1u32 << (attempt - 1).min(16))
    }
}

/// Header names and thresholds for a provider's rate-limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub remaining_header: &'static str,
    pub reset_header: &'static str,
    pub floor: u64,
    pub max_wait: Duration,
}

impl RateLimitPolicy {
    pub const GITHUB: (&'static str, &'static str) = ("x-ratelimit-remaining", "x-ratelimit-reset");
    pub const GITLAB: (&'static str, &'static str) = ("ratelimit-remaining", "ratelimit-reset");

    pub fn new(headers: (&'static str, &'static str), config: &HostConfig) -> Self {
        Self {
            remaining_header: headers.0,
            reset_header: headers.1,
            floor: config.rate_limit_floor,
            max_wait: Duration::from_secs(config.max_rate_limit_wait_secs),
        }
    }

    fn remaining(&self, headers: &HeaderMap) -> Option<u64> {
        header_u64(headers, self.remaining_header)
    }

    /// How long to sleep before the next request, if the window is nearly spent.
    pub fn wait(&self, headers: &HeaderMap, now_epoch: u64) -> Option<Duration> {
        let remaining = self.remaining(headers)?;
        if remaining >= self.floor {
            return None;
        }
        let reset = header_u64(headers, self.reset_header)?;
        // GitHub sends an epoch timestamp, GitLab may send seconds until reset.
        let secs = if reset > now_epoch {
            reset - now_epoch
        } else if reset < 1_000_000_000 {
            reset
        } else {
            0
        };
        Some(Duration::from_secs(secs).min(self.max_wait))
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

/// Blocking HTTP with bounded retries. Timeouts, connection failures, 429 and
/// 5xx back off exponentially; 404 and other client errors return at once.
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    retry: RetryPolicy,
    rate_limit: Option<RateLimitPolicy>,
}

impl Transport {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hiring-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            retry,
            rate_limit: None,
        })
    }

    pub fn with_rate_limit(mut self, policy: RateLimitPolicy) -> Self {
        self.rate_limit = Some(policy);
        self
    }

    pub fn execute(
        &self,
        url: &str,
        build: impl Fn(&Client) -> RequestBuilder,
    ) -> Result<RawResponse, FetchError> {
        let attempts = self.retry.attempts.max(1);
        let mut last = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.retry.delay_before(attempt);
                tracing::warn!(
                    url,
                    attempt,
                    attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %last,
                    "request failed; retrying"
                );
                std::thread::sleep(delay);
            }

            let response = match build(&self.client).send() {
                Ok(response) => response,
                Err(err) if err.is_timeout() || err.is_connect() || err.is_request() => {
                    last = err.to_string();
                    continue;
                }
                Err(err) => {
                    return Err(FetchError::Exhausted {
                        url: url.to_owned(),
                        attempts: attempt + 1,
                        last: err.to_string(),
                    });
                }
            };

            let status = response.status();
            let headers = response.headers().clone();
            let body = response.text().unwrap_or_default();

            if let Some(policy) = self.rate_limit
                && let Some(wait) = policy.wait(&headers, now_epoch())
                && !wait.is_zero()
            {
                tracing::warn!(
                    url,
                    wait_secs = wait.as_secs(),
                    "rate limit nearly exhausted; waiting for reset"
                );
                std::thread::sleep(wait);
            }

            if status.is_success() {
                return Ok(RawResponse {
                    status,
                    headers,
                    body,
                });
            }
            if status == StatusCode::NOT_FOUND {
                return Err(FetchError::NotFound {
                    url: url.to_owned(),
                });
            }

            let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
                || (status == StatusCode::FORBIDDEN
                    && self
                        .rate_limit
                        .and_then(|policy| policy.remaining(&headers))
                        == Some(0));
            if rate_limited || status.is_server_error() {
                last = format!("{status}: {}", truncate(&body, 200));
                continue;
            }

            return Err(FetchError::Rejected {
                status: status.as_u16(),
                url: url.to_owned(),
                message: truncate(&body, 500),
            });
        }

        Err(FetchError::Exhausted {
            url: url.to_owned(),
            attempts,
            last,
        })
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// JSON API client for one code host: base URL, auth header, cache prefix.
#[derive(Debug, Clone)]
pub struct ApiClient {
    transport: Transport,
    base_url: String,
    auth: Option<(&'static str, String)>,
    cache: Option<JsonCache>,
    cache_prefix: &'static str,
}

impl ApiClient {
    pub fn new(
        transport: Transport,
        base_url: &str,
        auth: Option<(&'static str, String)>,
        cache: Option<JsonCache>,
        cache_prefix: &'static str,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_owned(),
            auth,
            cache,
            cache_prefix,
        }
    }

    /// GET `{base}{path}` as JSON, served from the cache when present. Only
    /// successful responses are written back.
    pub fn get_json(&self, path: &str, params: &[(&str, String)]) -> Result<Value, FetchError> {
        let url = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_owned()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        };
        let key = cache_key(self.cache_prefix, &self.base_url, &url, params);

        if let Some(cache) = &self.cache
            && let Some(value) = cache.get::<Value>(&key)
        {
            return Ok(value);
        }

        let response = self.transport.execute(&url, |client| {
            let mut request = client
                .get(&url)
                .query(params)
                .header("Accept", "application/json");
            if let Some((name, value)) = &self.auth {
                request = request.header(*name, value);
            }
            request
        })?;

        let value: Value = serde_json::from_str(&response.body).map_err(|source| FetchError::Json {
            url: url.clone(),
            source,
        })?;

        if let Some(cache) = &self.cache
            && let Err(err) = cache.put(&key, &value)
        {
            tracing::warn!(key, error = %err, "cache write failed");
        }
        Ok(value)
    }
}
