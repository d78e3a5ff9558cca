use std::num::NonZeroU32;
use std::time::Duration;

use httpmock::prelude::*;
use reelview::application::metadata::{MetadataApi, UpstreamError, UpstreamRequest};
use reelview::infra::upstream::{RetryPolicy, TmdbClient, TmdbClientConfig};
use reqwest::Url;
use serde_json::json;

fn client(server: &MockServer, api_key: Option<&str>, max_attempts: u32) -> TmdbClient {
    TmdbClient::new(TmdbClientConfig {
        base_url: Url::parse(&server.url("/3")).expect("mock url"),
        api_key: api_key.map(str::to_string),
        language: "en-US".to_string(),
        retry: RetryPolicy {
            max_attempts: NonZeroU32::new(max_attempts).expect("non-zero attempts"),
            backoff_unit: Duration::from_millis(1),
            attempt_timeout: Duration::from_secs(5),
        },
    })
    .expect("client builds")
}

#[tokio::test]
async fn sends_credential_language_and_params() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/3/search/multi")
                .query_param("api_key", "test-key")
                .query_param("language", "en-US")
                .query_param("query", "아이유")
                .query_param("page", "2")
                .header("accept", "application/json");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "page": 2, "results": [] }));
        })
        .await;

    let client = client(&server, Some("test-key"), 1);
    let request = UpstreamRequest::new("/search/multi")
        .with_param("query", "아이유")
        .with_param("page", 2);
    let document = client.fetch(&request).await.expect("fetch succeeds");

    assert_eq!(document["page"], 2);
    mock.assert_async().await;
}

#[tokio::test]
async fn server_errors_are_retried_until_budget_is_spent() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/3/movie/popular");
            then.status(503);
        })
        .await;

    let client = client(&server, Some("test-key"), 3);
    let err = client
        .fetch(&UpstreamRequest::new("/movie/popular"))
        .await
        .expect_err("503 on every attempt");

    assert_eq!(err.status_code(), Some(503));
    mock.assert_calls_async(3).await;
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/3/genre/tv/list");
            then.status(200)
                .header("content-type", "application/json")
                .body("{not json");
        })
        .await;

    let client = client(&server, Some("test-key"), 2);
    let err = client
        .fetch(&UpstreamRequest::new("/genre/tv/list"))
        .await
        .expect_err("decode fails");

    assert!(matches!(err, UpstreamError::Decode(_)));
    mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn missing_credential_never_reaches_the_network() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(200).json_body(json!({}));
        })
        .await;

    let client = client(&server, None, 3);
    let err = client
        .fetch(&UpstreamRequest::new("/trending/all/day"))
        .await
        .expect_err("no credential");

    assert!(matches!(err, UpstreamError::MissingCredential));
    mock.assert_calls_async(0).await;
}
