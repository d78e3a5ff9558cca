//! HTTP client for the TMDb-compatible metadata API.

use async_trait::async_trait;
use reqwest::{Client, Url, header::ACCEPT};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::application::metadata::{MetadataApi, UpstreamRequest};
use crate::config::UpstreamSettings;

use super::backoff::{RetryPolicy, retry_with_backoff};
use super::error::UpstreamError;

const API_KEY_PARAM: &str = "api_key";
const LANGUAGE_PARAM: &str = "language";

/// Connection details for [`TmdbClient`].
#[derive(Debug, Clone)]
pub struct TmdbClientConfig {
    pub base_url: Url,
    pub api_key: Option<String>,
    pub language: String,
    pub retry: RetryPolicy,
}

impl From<&UpstreamSettings> for TmdbClientConfig {
    fn from(settings: &UpstreamSettings) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            language: settings.language.clone(),
            retry: RetryPolicy {
                max_attempts: settings.max_attempts,
                backoff_unit: settings.backoff_unit,
                attempt_timeout: settings.attempt_timeout,
            },
        }
    }
}

#[derive(Clone)]
pub struct TmdbClient {
    http: Client,
    base: String,
    api_key: Option<String>,
    language: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for TmdbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TmdbClient")
            .field("base", &self.base)
            .field("has_api_key", &self.api_key.is_some())
            .field("language", &self.language)
            .field("retry", &self.retry)
            .finish()
    }
}

impl TmdbClient {
    pub fn new(config: TmdbClientConfig) -> Result<Self, UpstreamError> {
        let http = Client::builder()
            .user_agent(Self::user_agent())
            .connect_timeout(config.retry.attempt_timeout)
            .build()
            .map_err(UpstreamError::Network)?;

        Ok(Self {
            http,
            base: config.base_url.as_str().trim_end_matches('/').to_string(),
            api_key: config.api_key.filter(|key| !key.trim().is_empty()),
            language: config.language,
            retry: config.retry,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("reelview/", env!("CARGO_PKG_VERSION"))
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Full request URL with credential and language attached.
    ///
    /// `language` from the request parameters overrides the configured
    /// default.
    pub fn endpoint_url(&self, request: &UpstreamRequest, api_key: &str) -> Result<Url, UpstreamError> {
        let path = request.path().trim_start_matches('/');
        let mut url = Url::parse(&format!("{}/{}", self.base, path))?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair(API_KEY_PARAM, api_key);
            if request.param(LANGUAGE_PARAM).is_none() {
                pairs.append_pair(LANGUAGE_PARAM, &self.language);
            }
            for (name, value) in request.params() {
                pairs.append_pair(name, value);
            }
        }

        Ok(url)
    }

    /// Issue `request`, retrying transient failures per the retry policy.
    #[instrument(skip(self), fields(path = %request.path()))]
    pub async fn fetch_json(&self, request: &UpstreamRequest) -> Result<Value, UpstreamError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(UpstreamError::MissingCredential)?;
        let url = self.endpoint_url(request, api_key)?;

        retry_with_backoff(&self.retry, |attempt| self.attempt(url.clone(), attempt)).await
    }

    async fn attempt(&self, url: Url, attempt: u32) -> Result<Value, UpstreamError> {
        debug!(attempt, path = url.path(), "requesting upstream");

        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(UpstreamError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::status(
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown status"),
            ));
        }

        let bytes = response.bytes().await.map_err(UpstreamError::Network)?;
        serde_json::from_slice(&bytes).map_err(|err| UpstreamError::decode(err.to_string()))
    }
}

#[async_trait]
impl MetadataApi for TmdbClient {
    async fn fetch(&self, request: &UpstreamRequest) -> Result<Value, UpstreamError> {
        self.fetch_json(request).await
    }
}
