use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::ports::{QueryError, SdkError},
    domain::error::DomainError,
    infra::error::InfraError,
    presentation::views::TemplateRenderError,
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
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

/// Every way a native render can fail.
#[derive(Debug, Error)]
pub enum NativeRenderError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("sdk version resolution failed")]
    Resolution(#[source] SdkError),
    #[error("render parameter query failed")]
    Query(#[source] QueryError),
    #[error("markup generation failed")]
    Render(#[source] TemplateRenderError),
    #[error("render task aborted: {0}")]
    Aborted(String),
}

impl NativeRenderError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            NativeRenderError::Validation(_) => StatusCode::BAD_REQUEST,
            NativeRenderError::Resolution(_) => StatusCode::SERVICE_UNAVAILABLE,
            NativeRenderError::Query(_) => StatusCode::BAD_GATEWAY,
            NativeRenderError::Render(_) | NativeRenderError::Aborted(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Label used for metrics and tracking.
    pub fn outcome(&self) -> &'static str {
        match self {
            NativeRenderError::Validation(_) => "rejected",
            NativeRenderError::Resolution(_) => "resolution_failed",
            NativeRenderError::Query(_) => "query_failed",
            NativeRenderError::Render(_) => "render_failed",
            NativeRenderError::Aborted(_) => "aborted",
        }
    }

    /// Body sent to the client. Validation failures echo the reason so the
    /// integrator can fix the request; internal failures only name the category.
    pub fn presentation_message(&self) -> String {
        match self {
            NativeRenderError::Validation(err) => format!("Invalid request: {err}"),
            NativeRenderError::Resolution(_) => {
                "Checkout SDK version is temporarily unavailable".to_string()
            }
            NativeRenderError::Query(_) => "Checkout configuration could not be loaded".to_string(),
            NativeRenderError::Render(_) => "Checkout page could not be rendered".to_string(),
            NativeRenderError::Aborted(_) => "Unexpected error occurred".to_string(),
        }
    }
}

/// Failures of the binary outside request handling.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Sdk(#[from] SdkError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
