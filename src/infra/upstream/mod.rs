//! Upstream metadata API access.
//!
//! [`TmdbClient`] attaches the credential and language to every request
//! and retries transient failures with exponential backoff.

mod backoff;
mod client;
mod error;

pub use backoff::{RetryPolicy, retry_with_backoff};
pub use client::{TmdbClient, TmdbClientConfig};
pub use error::UpstreamError;
