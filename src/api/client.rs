// CourseSync - Course Content Sync
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! HTTP client for the course platform API
//!
//! This module provides the HTTP client wrapper used by every endpoint module:
//! - API base derived from a configurable subdomain
//! - Bearer token authentication once a token is supplied
//! - A uniform request timeout, overridable per call
//! - A shared response cache in front of every GET
//!
//! # Architecture
//!
//! ## Client Structure
//! `CourseClient` wraps `reqwest::Client` and provides:
//! - Base URL management (`https://{subdomain}.{domain}/api-2.0`)
//! - Custom headers (User-Agent, Accept, Authorization)
//! - Timeout and connection pooling configuration
//! - The fan-out policy and stream resolver used by the content orchestrator
//!
//! ## Failures
//! Requests are never retried. Non-2xx responses become `ApiRequestFailed` with the
//! status code attached, so callers (and the curriculum fallback) can inspect it.
//! Timeouts surface as `Timeout` and do not affect sibling requests.

use crate::api::cache::{request_key, ResponseCache, DEFAULT_CACHE_TTL};
use crate::api::fanout::FanOut;
use crate::error::{CourseError, Result};
use crate::streams::{HlsPlaylistResolver, PlaylistResolver, StreamSourceResolver};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Method, Response};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Default request timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 40_000;

/// Default platform subdomain
pub const DEFAULT_SUBDOMAIN: &str = "www";

/// Default platform domain
pub const DEFAULT_DOMAIN: &str = "udemy.com";

/// Path of the API below the platform host
pub const API_PATH: &str = "/api-2.0";

/// Normalize a subdomain: trimmed, lowercased, blank becomes `www`
pub fn normalize_subdomain(subdomain: &str) -> String {
    let trimmed = subdomain.trim();
    if trimmed.is_empty() {
        DEFAULT_SUBDOMAIN.to_string()
    } else {
        trimmed.to_ascii_lowercase()
    }
}

/// Map a transport-level reqwest failure to a crate error
pub(crate) fn transport_error(err: reqwest::Error, endpoint: &str, timeout: Duration) -> CourseError {
    if err.is_timeout() {
        CourseError::Timeout {
            endpoint: endpoint.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        CourseError::network_error(
            format!("Network request failed: {}", err),
            err.is_connect() || err.is_request(),
        )
    }
}

/// Configuration for CourseClient
/// Provides a builder pattern for client customization
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub subdomain: String,
    pub domain: String,
    /// Full API base, overrides `subdomain`/`domain` when set
    pub base_url: Option<String>,
    pub timeout: Duration,
    pub cache_ttl: Duration,
    /// Fan-out cap, `None` for unbounded
    pub max_concurrency: Option<usize>,
    pub user_agent: String,
    pub access_token: Option<String>,
    pub enable_cookies: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            subdomain: DEFAULT_SUBDOMAIN.to_string(),
            domain: DEFAULT_DOMAIN.to_string(),
            base_url: None,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            cache_ttl: DEFAULT_CACHE_TTL,
            max_concurrency: None,
            user_agent: concat!("CourseSync/", env!("CARGO_PKG_VERSION"), " (course-core)").to_string(),
            access_token: None,
            enable_cookies: true,
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// API base URL without trailing slash
    pub fn api_base(&self) -> String {
        match &self.base_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!(
                "https://{}.{}{}",
                normalize_subdomain(&self.subdomain),
                self.domain,
                API_PATH
            ),
        }
    }
}

/// Builder for ClientConfig
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subdomain<S: AsRef<str>>(mut self, subdomain: S) -> Self {
        self.config.subdomain = normalize_subdomain(subdomain.as_ref());
        self
    }

    pub fn domain<S: Into<String>>(mut self, domain: S) -> Self {
        self.config.domain = domain.into();
        self
    }

    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.config.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.config.cache_ttl = cache_ttl;
        self
    }

    pub fn max_concurrency(mut self, max_concurrency: Option<usize>) -> Self {
        self.config.max_concurrency = max_concurrency;
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn access_token<S: Into<String>>(mut self, token: S) -> Self {
        self.config.access_token = Some(token.into());
        self
    }

    pub fn enable_cookies(mut self, enable: bool) -> Self {
        self.config.enable_cookies = enable;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Per-call request options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Overrides the client-wide timeout
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

/// Main HTTP client for the course platform API
///
/// # Example
/// ```rust,no_run
/// use course_core::api::client::{ClientConfig, CourseClient};
/// use course_core::api::curriculum::ContentType;
///
/// # async fn example() -> course_core::error::Result<()> {
/// let config = ClientConfig::builder()
///     .subdomain("acme")
///     .access_token("token")
///     .build();
/// let client = CourseClient::new(config)?;
///
/// let content = client.fetch_course_content(12345, ContentType::Lectures).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CourseClient {
    /// Underlying HTTP client
    client: Client,
    /// API base URL (e.g., https://www.udemy.com/api-2.0)
    base_url: String,
    /// Client configuration
    config: ClientConfig,
    /// Bearer token, replaceable at runtime
    access_token: RwLock<Option<String>>,
    /// Cache in front of every GET
    cache: ResponseCache<Value>,
    fan_out: FanOut,
    streams: StreamSourceResolver,
}

impl CourseClient {
    /// Create a client that resolves adaptive playlists over HLS
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = Self::build_http_client(&config)?;
        let playlists = Arc::new(HlsPlaylistResolver::with_cache_ttl(
            client.clone(),
            config.timeout,
            config.cache_ttl,
        ));
        Self::from_parts(client, config, playlists)
    }

    /// Create a client with a custom adaptive playlist resolver
    pub fn with_playlist_resolver(
        config: ClientConfig,
        playlists: Arc<dyn PlaylistResolver>,
    ) -> Result<Self> {
        let client = Self::build_http_client(&config)?;
        Self::from_parts(client, config, playlists)
    }

    fn from_parts(
        client: Client,
        config: ClientConfig,
        playlists: Arc<dyn PlaylistResolver>,
    ) -> Result<Self> {
        let base_url = config.api_base();
        url::Url::parse(&base_url).map_err(|e| {
            CourseError::InvalidConfiguration(format!("Invalid API base '{}': {}", base_url, e))
        })?;

        let fan_out = FanOut::new(config.max_concurrency);

        Ok(Self {
            client,
            base_url,
            access_token: RwLock::new(config.access_token.clone()),
            cache: ResponseCache::new(config.cache_ttl),
            streams: StreamSourceResolver::new(playlists, fan_out),
            fan_out,
            config,
        })
    }

    fn build_http_client(config: &ClientConfig) -> Result<Client> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| CourseError::InvalidConfiguration(format!("Invalid user agent: {}", e)))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut client_builder = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .pool_idle_timeout(Duration::from_secs(90));

        if config.enable_cookies {
            client_builder = client_builder.cookie_store(true);
        }

        Ok(client_builder.build()?)
    }

    /// Create a builder for custom client configuration
    pub fn builder() -> ClientConfigBuilder {
        ClientConfig::builder()
    }

    /// Get the API base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResponseCache<Value> {
        &self.cache
    }

    pub fn fan_out(&self) -> FanOut {
        self.fan_out
    }

    pub fn stream_resolver(&self) -> &StreamSourceResolver {
        &self.streams
    }

    /// Replace the bearer token used for subsequent requests
    pub async fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().await = token;
    }

    /// Absolute URL for an endpoint path or an already absolute URL
    pub fn endpoint_url(&self, target: &str) -> String {
        if target.starts_with("http://") || target.starts_with("https://") {
            target.to_string()
        } else {
            format!("{}{}", self.base_url, target)
        }
    }

    /// Perform a cached GET and return the raw JSON payload
    pub async fn get_json(&self, target: &str) -> Result<Value> {
        self.get_json_with(target, RequestOptions::default()).await
    }

    /// Perform a cached GET with per-call options
    pub async fn get_json_with(&self, target: &str, options: RequestOptions) -> Result<Value> {
        let url = self.endpoint_url(target);
        let key = request_key(&Method::GET, &url);
        self.cache
            .get_or_fetch(&key, || self.execute(Method::GET, &url, None, options))
            .await
    }

    /// Perform a cached GET and deserialize the payload
    pub async fn get<T>(&self, target: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let value = self.get_json(target).await?;
        parse_value(value)
    }

    /// Perform a POST request with JSON body
    ///
    /// POSTs are not cached: the cache key does not include the body.
    pub async fn post<T, B>(&self, target: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: Serialize,
    {
        let url = self.endpoint_url(target);
        let body = serde_json::to_value(body)?;
        let value = self
            .execute(Method::POST, &url, Some(body), RequestOptions::default())
            .await?;
        parse_value(value)
    }

    async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<Value> {
        let timeout = options.timeout.unwrap_or(self.config.timeout);
        let headers = self.build_auth_headers().await?;

        let mut request = self
            .client
            .request(method.clone(), url)
            .headers(headers)
            .timeout(timeout);
        if let Some(ref b) = body {
            request = request.json(b);
        }

        tracing::debug!(%method, endpoint = %self.extract_endpoint_from_url(url), "sending request");

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, &self.extract_endpoint_from_url(url), timeout))?;

        if response.status().is_success() {
            self.handle_success_response(response).await
        } else {
            self.handle_error_response(response).await
        }
    }

    /// Build authentication headers from the current token
    async fn build_auth_headers(&self) -> Result<HeaderMap> {
        let token = self.access_token.read().await;
        let mut headers = HeaderMap::new();

        if let Some(ref token) = *token {
            let auth_value = format!("Bearer {}", token);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| CourseError::InvalidInput(format!("Invalid auth token: {}", e)))?,
            );
        }

        Ok(headers)
    }

    /// Handle successful HTTP response
    async fn handle_success_response(&self, response: Response) -> Result<Value> {
        let status = response.status();
        let endpoint = self.extract_endpoint_from_url(response.url().as_str());

        // Get response text first so we can report it on parse error
        let response_text = response.text().await.map_err(|e| CourseError::ApiRequestFailed {
            message: format!("Failed to read response body: {}", e),
            status_code: Some(status.as_u16()),
            endpoint: Some(endpoint.clone()),
        })?;

        serde_json::from_str::<Value>(&response_text).map_err(|e| {
            let snippet: String = response_text.chars().take(400).collect();
            CourseError::InvalidApiResponse {
                message: format!("Parse error from {}: {} (line {}, col {})", endpoint, e, e.line(), e.column()),
                response_body: Some(snippet),
            }
        })
    }

    /// Handle error HTTP response
    async fn handle_error_response<T>(&self, response: Response) -> Result<T> {
        let status = response.status();
        let endpoint = self.extract_endpoint_from_url(response.url().as_str());
        let error_body = response.text().await.unwrap_or_default();

        Err(CourseError::api_failed(
            format!("{} {}", status, error_body.chars().take(200).collect::<String>()),
            Some(status.as_u16()),
            Some(endpoint),
        ))
    }

    /// Extract endpoint path from full URL
    fn extract_endpoint_from_url(&self, url: &str) -> String {
        url.strip_prefix(&self.base_url)
            .unwrap_or(url)
            .to_string()
    }
}

/// Deserialize a cached payload into a typed response
fn parse_value<T>(value: Value) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_value(value.clone()).map_err(|e| {
        let snippet: String = value.to_string().chars().take(400).collect();
        CourseError::InvalidApiResponse {
            message: format!("Unexpected response shape: {}", e),
            response_body: Some(snippet),
        }
    })
}

// ===== TESTS =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_subdomain() {
        assert_eq!(normalize_subdomain("Acme"), "acme");
        assert_eq!(normalize_subdomain("  BUSINESS "), "business");
        assert_eq!(normalize_subdomain(""), "www");
        assert_eq!(normalize_subdomain("   "), "www");
    }

    #[test]
    fn test_default_api_base() {
        let config = ClientConfig::default();
        assert_eq!(config.api_base(), "https://www.udemy.com/api-2.0");
        assert_eq!(config.timeout, Duration::from_millis(40_000));
        assert_eq!(config.cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.max_concurrency, None);
    }

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::builder()
            .subdomain(" Acme ")
            .timeout(Duration::from_secs(5))
            .cache_ttl(Duration::from_secs(10))
            .max_concurrency(Some(4))
            .user_agent("TestAgent/1.0")
            .access_token("secret")
            .enable_cookies(false)
            .build();

        assert_eq!(config.api_base(), "https://acme.udemy.com/api-2.0");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.cache_ttl, Duration::from_secs(10));
        assert_eq!(config.max_concurrency, Some(4));
        assert_eq!(config.user_agent, "TestAgent/1.0");
        assert_eq!(config.access_token.as_deref(), Some("secret"));
        assert!(!config.enable_cookies);
    }

    #[test]
    fn test_base_url_override() {
        let config = ClientConfig::builder()
            .base_url("http://127.0.0.1:8080/api-2.0/")
            .build();
        assert_eq!(config.api_base(), "http://127.0.0.1:8080/api-2.0");
    }

    #[test]
    fn test_endpoint_url() {
        let client = CourseClient::new(ClientConfig::default()).unwrap();
        assert_eq!(
            client.endpoint_url("/users/me/subscribed-courses"),
            "https://www.udemy.com/api-2.0/users/me/subscribed-courses"
        );
        assert_eq!(
            client.endpoint_url("https://other.example.com/x?page=2"),
            "https://other.example.com/x?page=2"
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let config = ClientConfig::builder().base_url("not a url").build();
        let result = CourseClient::new(config);
        assert!(matches!(result, Err(CourseError::InvalidConfiguration(_))));
    }
}
