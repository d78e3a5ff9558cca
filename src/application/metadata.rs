//! Port to the upstream metadata API.

use async_trait::async_trait;
use serde_json::Value;

pub use crate::infra::upstream::UpstreamError;

/// A GET request against the metadata API, relative to its base URL.
///
/// Credential and default language are added by the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    path: String,
    params: Vec<(String, String)>,
}

impl UpstreamRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// First value for `name`, if present.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, value)| value)
    }
}

#[async_trait]
pub trait MetadataApi: Send + Sync {
    /// Fetch and decode one JSON document.
    async fn fetch(&self, request: &UpstreamRequest) -> Result<Value, UpstreamError>;
}
