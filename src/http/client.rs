//! Web API transport
//!
//! Every call into the service goes through [`HttpClient::get`], which
//! throttles, attaches the bearer credential, and retries transient
//! failures. A `401` triggers one credential refresh that does not count
//! against the retry budget.

use super::rate_limit::RateLimiter;
use crate::auth::{AuthConfig, Authenticator};
use crate::config::TapConfig;
use crate::error::{Error, Result};
use crate::types::{BackoffType, OptionStringExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::{Client, ClientBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// Delay used when a 429 carries no usable `Retry-After`
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Delay schedule between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub kind: BackoffType,
    pub initial: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            kind: BackoffType::Exponential,
            initial: Duration::from_millis(500),
            max: Duration::from_secs(60),
        }
    }
}

impl Backoff {
    /// Same delay before every retry
    pub fn constant(delay: Duration) -> Self {
        Self {
            kind: BackoffType::Constant,
            initial: delay,
            max: delay,
        }
    }

    /// Delay before retry number `attempt + 1`, capped at `max`
    pub fn delay(&self, attempt: u32) -> Duration {
        let delay = match self.kind {
            BackoffType::Constant => self.initial,
            BackoffType::Linear => self.initial.saturating_mul(attempt.saturating_add(1)),
            BackoffType::Exponential => self.initial.saturating_mul(2u32.saturating_pow(attempt)),
        };
        delay.min(self.max)
    }
}

/// Transport settings
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Service root that relative targets are resolved against
    pub base_url: Option<String>,
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub backoff: Backoff,
    /// Steady request rate; `None` disables client-side throttling
    pub requests_per_second: Option<u32>,
    /// Headers sent unless a call supplies its own value
    pub default_headers: Vec<(String, String)>,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(120),
            max_retries: 3,
            backoff: Backoff::default(),
            requests_per_second: Some(10),
            default_headers: Vec::new(),
            user_agent: format!("tap-dynamics/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Settings for a Dynamics Web API service root.
    ///
    /// Negotiates OData v4 JSON and asks for server-driven paging at the
    /// configured page size.
    pub fn from_tap_config(config: &TapConfig) -> Self {
        let mut settings = Self {
            base_url: Some(config.service_url()),
            max_retries: config.max_retries,
            requests_per_second: Some(config.requests_per_second),
            ..Self::default()
        }
        .with_header("Accept", "application/json")
        .with_header("OData-Version", "4.0")
        .with_header("OData-MaxVersion", "4.0")
        .with_header("Prefer", format!("odata.maxpagesize={}", config.page_size));

        if let Some(agent) = config.user_agent.clone().none_if_empty() {
            settings.user_agent = agent;
        }
        settings
    }

    /// Settings rooted at `base_url` with nothing else switched on
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            requests_per_second: None,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.default_headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.default_headers.push((name, value.into()));
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Value of a default header, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.default_headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn header_map(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.default_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::invalid_value("headers", format!("{name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::invalid_value("headers", format!("{name}: {e}")))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    fn client_builder(&self) -> ClientBuilder {
        Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
    }
}

/// Throttled, authenticated, retrying GET client
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    authenticator: Option<Authenticator>,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Unauthenticated client
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = config
            .client_builder()
            .default_headers(config.header_map()?)
            .build()
            .map_err(Error::Http)?;
        let rate_limiter = config.requests_per_second.map(RateLimiter::per_second);

        Ok(Self {
            client,
            config,
            authenticator: None,
            rate_limiter,
        })
    }

    /// Client that authenticates every request.
    ///
    /// Token exchanges use a separate connection pool without the OData
    /// default headers.
    pub fn with_auth(config: HttpClientConfig, auth: AuthConfig) -> Result<Self> {
        let token_client = config.client_builder().build().map_err(Error::Http)?;
        let mut client = Self::with_config(config)?;
        client.authenticator = Some(Authenticator::with_client(auth, token_client));
        Ok(client)
    }

    /// GET `target` and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        target: &str,
        params: &[(String, String)],
    ) -> Result<T> {
        let response = self.get(target, params, None).await?;
        response
            .json()
            .await
            .map_err(|e| Error::decode(format!("{target}: {e}")))
    }

    /// GET `target` as XML, returning the raw document
    pub async fn get_xml(&self, target: &str) -> Result<String> {
        let response = self.get(target, &[], Some("application/xml")).await?;
        response.text().await.map_err(Error::Http)
    }

    /// GET `target` with retries.
    ///
    /// `target` is either relative to the base URL or an absolute next link.
    /// `accept` overrides the default `Accept` header for this call.
    pub async fn get(
        &self,
        target: &str,
        params: &[(String, String)],
        accept: Option<&str>,
    ) -> Result<Response> {
        let url = self.resolve(target);
        let max_retries = self.config.max_retries;
        let mut attempt = 0;
        let mut refreshed = false;

        loop {
            if let Some(limiter) = &self.rate_limiter {
                limiter.wait().await;
            }

            let error = match self.send(&url, params, accept).await? {
                Ok(response) => {
                    debug!("GET {} -> {}", url, response.status().as_u16());
                    return Ok(response);
                }
                Err(error) => error,
            };

            if error.is_unauthorized() && !refreshed {
                if let Some(auth) = self.authenticator.as_ref().filter(|a| a.can_refresh()) {
                    warn!("Access token rejected, refreshing");
                    auth.invalidate().await;
                    refreshed = true;
                    continue;
                }
            }

            if attempt >= max_retries || !error.is_retryable() {
                return Err(error);
            }

            let delay = match &error {
                Error::RateLimited {
                    retry_after_seconds,
                } => Duration::from_secs(*retry_after_seconds),
                _ => self.config.backoff.delay(attempt),
            };
            warn!(
                attempt = attempt + 1,
                of = max_retries + 1,
                "GET {} failed ({}), retrying in {:?}",
                url,
                error,
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// One attempt. The outer error is fatal (credential acquisition); the
    /// inner one describes a failed exchange the caller may retry.
    async fn send(
        &self,
        url: &str,
        params: &[(String, String)],
        accept: Option<&str>,
    ) -> Result<std::result::Result<Response, Error>> {
        let mut request = self.client.get(url);
        if !params.is_empty() {
            request = request.query(params);
        }
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }
        if let Some(auth) = &self.authenticator {
            request = auth.apply(request).await?;
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Ok(Err(Error::Timeout {
                    timeout_ms: self.config.timeout.as_millis() as u64,
                }))
            }
            Err(e) => return Ok(Err(Error::Http(e))),
        };

        let status = response.status();
        if status.is_success() || status.is_redirection() {
            return Ok(Ok(response));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(Err(Error::RateLimited {
                retry_after_seconds: retry_after(&response),
            }));
        }
        let body = response.text().await.unwrap_or_default();
        Ok(Err(Error::http_status(status.as_u16(), body)))
    }

    fn resolve(&self, target: &str) -> String {
        if target.starts_with("http://") || target.starts_with("https://") {
            return target.to_string();
        }
        match &self.config.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                target.trim_start_matches('/')
            ),
            None => target.to_string(),
        }
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.config.base_url)
            .field("authenticated", &self.authenticator.is_some())
            .field("throttled", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Seconds to wait according to the `Retry-After` header
fn retry_after(response: &Response) -> u64 {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}
