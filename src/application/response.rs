use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};

use crate::application::error::{ErrorReport, NativeRenderError};

pub const TEXT_HTML: &str = "text/html";
pub const TEXT_PLAIN: &str = "text/plain";

const SOURCE: &str = "application::native::NativeRenderer";

/// Finalized outcome of one render invocation.
#[derive(Debug, Clone)]
pub struct RenderResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
    report: Option<ErrorReport>,
}

impl RenderResponse {
    pub fn html(body: String) -> Self {
        Self::with_content_type(StatusCode::OK, TEXT_HTML, body)
    }

    pub fn plain(status: StatusCode, body: String) -> Self {
        Self::with_content_type(status, TEXT_PLAIN, body)
    }

    pub fn from_error(error: &NativeRenderError) -> Self {
        let status = error.status_code();
        let source = match error {
            NativeRenderError::Render(err) => err.source,
            _ => SOURCE,
        };
        let mut response = Self::plain(status, error.presentation_message());
        response.report = Some(ErrorReport::from_error(source, status, error));
        response
    }

    fn with_content_type(status: StatusCode, content_type: &'static str, body: String) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        Self {
            status,
            headers,
            body,
            report: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE.as_str())
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn report(&self) -> Option<&ErrorReport> {
        self.report.as_ref()
    }
}

impl IntoResponse for RenderResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        if let Some(report) = self.report {
            report.attach(&mut response);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        application::ports::SdkError,
        domain::{error::DomainError, origin::OriginRejection},
    };

    #[test]
    fn html_and_plain_carry_exact_content_types() {
        assert_eq!(
            RenderResponse::html("<p>ok</p>".into()).content_type(),
            Some(TEXT_HTML)
        );
        let plain = RenderResponse::plain(StatusCode::BAD_REQUEST, "nope".into());
        assert_eq!(plain.status(), StatusCode::BAD_REQUEST);
        assert_eq!(plain.content_type(), Some(TEXT_PLAIN));
    }

    #[test]
    fn errors_become_plain_text_with_a_report() {
        let err = NativeRenderError::Validation(DomainError::from(OriginRejection::Missing));
        let response = RenderResponse::from_error(&err);

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.content_type(), Some(TEXT_PLAIN));
        assert!(response.body().contains("missing"));
        let report = response.report().expect("report");
        assert_eq!(report.source, SOURCE);
        assert_eq!(report.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_details_stay_out_of_the_body() {
        let err = NativeRenderError::Resolution(SdkError::Install {
            package: "@paypal/smart-payment-buttons".into(),
            version: "5.0.100".into(),
            reason: "registry at 10.0.0.7 refused".into(),
        });
        let response = RenderResponse::from_error(&err);

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!response.body().contains("10.0.0.7"));
        let report = response.report().expect("report");
        assert!(report.messages.iter().any(|m| m.contains("10.0.0.7")));
    }

    #[test]
    fn into_response_keeps_status_headers_and_report() {
        let err = NativeRenderError::Aborted("task panicked".into());
        let response = RenderResponse::from_error(&err).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).map(|v| v.as_bytes()),
            Some(TEXT_PLAIN.as_bytes())
        );
        assert!(response.extensions().get::<ErrorReport>().is_some());
    }
}
