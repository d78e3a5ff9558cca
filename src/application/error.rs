use std::error::Error as StdError;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::{
    application::catalog::CatalogError, domain::error::DomainError, infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = error_body(self.status, self.public_message);
        self.report.attach(&mut response);
        response
    }
}

/// API errors are JSON like every other response: `{"error": "..."}`.
fn error_body(status: StatusCode, message: &'static str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

impl From<CatalogError> for HttpError {
    fn from(error: CatalogError) -> Self {
        match &error {
            CatalogError::Domain(_) => HttpError::from_error(
                "infra::http::catalog_error_to_http_error",
                StatusCode::BAD_REQUEST,
                "Request could not be processed",
                &error,
            ),
            CatalogError::Upstream(_) | CatalogError::Cache(_) => HttpError::from_error(
                "infra::http::catalog_error_to_http_error",
                StatusCode::BAD_GATEWAY,
                "Metadata service unavailable",
                &error,
            ),
        }
    }
}

impl From<DomainError> for HttpError {
    fn from(error: DomainError) -> Self {
        HttpError::from_error(
            "infra::http::domain_error_to_http_error",
            StatusCode::BAD_REQUEST,
            "Request could not be processed",
            &error,
        )
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Domain(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Catalog(CatalogError::Domain(_)) => StatusCode::BAD_REQUEST,
            AppError::Catalog(_) => StatusCode::BAD_GATEWAY,
            AppError::Infra(InfraError::Configuration { .. })
            | AppError::Infra(InfraError::Telemetry(_))
            | AppError::Infra(InfraError::Io(_))
            | AppError::Infra(InfraError::Upstream(_))
            | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self {
            AppError::Domain(_) | AppError::Validation(_) => "Request could not be processed",
            AppError::Catalog(CatalogError::Domain(_)) => "Request could not be processed",
            AppError::Catalog(_) => "Metadata service unavailable",
            AppError::Infra(InfraError::Configuration { .. }) => "Service misconfigured",
            AppError::Infra(InfraError::Telemetry(_)) => "Logging subsystem could not start",
            AppError::Infra(InfraError::Io(_)) => "I/O failure during request",
            AppError::Infra(InfraError::Upstream(_)) => "Metadata client could not start",
            AppError::Unexpected(_) => "Unexpected error occurred",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.presentation_message();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = error_body(status, message);
        report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::metadata::UpstreamError;

    #[test]
    fn report_collects_error_chain() {
        let error = CatalogError::from(UpstreamError::decode("missing field"));
        let report = ErrorReport::from_error("test", StatusCode::BAD_GATEWAY, &error);
        assert_eq!(report.status, StatusCode::BAD_GATEWAY);
        assert_eq!(
            report.messages.first().map(String::as_str),
            Some("failed to decode upstream response: missing field")
        );
    }

    #[test]
    fn catalog_errors_map_to_gateway_or_bad_request() {
        let upstream = HttpError::from(CatalogError::from(UpstreamError::MissingCredential));
        assert_eq!(upstream.into_response().status(), StatusCode::BAD_GATEWAY);

        let invalid = HttpError::from(CatalogError::from(DomainError::validation("page")));
        let response = invalid.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.extensions().get::<ErrorReport>().is_some());
    }

    #[test]
    fn app_error_status_codes() {
        assert_eq!(
            AppError::validation("bad").into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(InfraError::configuration("missing"))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
