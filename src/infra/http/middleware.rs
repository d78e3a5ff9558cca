use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, Request, header::CACHE_CONTROL},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

use super::catalog::DEGRADED_HEADER;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const MAX_REQUEST_ID_LEN: usize = 64;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Tag each request with an id, reusing a well-formed inbound
/// `x-request-id` so ids survive a fronting proxy.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id =
        inbound_request_id(request.headers()).unwrap_or_else(|| Uuid::new_v4().to_string());
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

fn inbound_request_id(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(REQUEST_ID_HEADER)?.to_str().ok()?.trim();
    let well_formed = !value.is_empty()
        && value.len() <= MAX_REQUEST_ID_LEN
        && value
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.'));
    well_formed.then(|| value.to_string())
}

/// One log line per request: errors with their diagnostic chain, degraded
/// listings as warnings, everything else at debug.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();

    if status.is_client_error() || status.is_server_error() {
        let (source, messages) = match response.extensions_mut().remove::<ErrorReport>() {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .map(String::as_str)
            .unwrap_or("no diagnostic available");

        if status.is_server_error() {
            error!(
                target: "reelview::http::response",
                status = status.as_u16(),
                method = %method,
                path = %path,
                elapsed_ms,
                source,
                detail,
                chain = ?messages,
                request_id = %request_id,
                "request failed"
            );
        } else {
            warn!(
                target: "reelview::http::response",
                status = status.as_u16(),
                method = %method,
                path = %path,
                elapsed_ms,
                source,
                detail,
                request_id = %request_id,
                "client request error"
            );
        }
    } else if response.headers().contains_key(DEGRADED_HEADER) {
        warn!(
            target: "reelview::http::response",
            status = status.as_u16(),
            path = %path,
            elapsed_ms,
            request_id = %request_id,
            "served degraded listing"
        );
    } else {
        let cache_control = response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        debug!(
            target: "reelview::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            elapsed_ms,
            cache_control,
            request_id = %request_id,
            "request served"
        );
    }

    response
}
