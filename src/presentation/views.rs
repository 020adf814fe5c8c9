use askama::{Error as AskamaError, Template};
use serde::Serialize;
use thiserror::Error;

use crate::domain::types::RenderMode;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: TemplateFailure,
}

#[derive(Debug, Error)]
pub enum TemplateFailure {
    #[error(transparent)]
    Askama(#[from] AskamaError),
    #[error("setup payload could not be serialized: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("template produced an empty document")]
    Empty,
}

impl TemplateRenderError {
    pub fn new(
        source: &'static str,
        public_message: &'static str,
        error: impl Into<TemplateFailure>,
    ) -> Self {
        Self {
            source,
            public_message,
            error: error.into(),
        }
    }
}

pub fn render_template<T: Template>(template: T) -> Result<String, TemplateRenderError> {
    let html = template.render().map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
    })?;

    if html.trim().is_empty() {
        return Err(TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            TemplateFailure::Empty,
        ));
    }

    Ok(html)
}

/// Values shared by both native page variants.
#[derive(Debug, Clone)]
pub struct NativePageView {
    pub title: String,
    pub lang: String,
    pub mode: &'static str,
    pub funding_source: &'static str,
    pub buttons_version: String,
    pub sdk_script_url: String,
    pub nonce: String,
    pub setup_function: &'static str,
    pub setup_json: String,
}

impl NativePageView {
    pub fn new<P: Serialize>(
        mode: RenderMode,
        setup: &P,
        parts: NativePageParts,
    ) -> Result<Self, TemplateRenderError> {
        let setup_json = script_safe_json(setup).map_err(|err| {
            TemplateRenderError::new(
                "presentation::views::NativePageView::new",
                "Setup payload could not be serialized",
                err,
            )
        })?;

        Ok(Self {
            title: parts.title,
            lang: parts.lang,
            mode: mode.as_str(),
            funding_source: parts.funding_source,
            buttons_version: parts.buttons_version,
            sdk_script_url: parts.sdk_script_url,
            nonce: parts.nonce,
            setup_function: mode.setup_function(),
            setup_json,
        })
    }
}

pub struct NativePageParts {
    pub title: String,
    pub lang: String,
    pub funding_source: &'static str,
    pub buttons_version: String,
    pub sdk_script_url: String,
    pub nonce: String,
}

#[derive(Template)]
#[template(path = "native/popup.html")]
pub struct NativePopupTemplate {
    pub page: NativePageView,
}

#[derive(Template)]
#[template(path = "native/fallback.html")]
pub struct NativeFallbackTemplate {
    pub page: NativePageView,
}

/// Render the page variant matching `page.mode`.
pub fn render_native_page(
    mode: RenderMode,
    page: NativePageView,
) -> Result<String, TemplateRenderError> {
    match mode {
        RenderMode::Popup => render_template(NativePopupTemplate { page }),
        RenderMode::Fallback => render_template(NativeFallbackTemplate { page }),
    }
}

/// Serialize `value` as JSON that cannot close the surrounding `<script>`.
pub fn script_safe_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let raw = serde_json::to_string(value)?;
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '<' => escaped.push_str("\\u003c"),
            '>' => escaped.push_str("\\u003e"),
            '&' => escaped.push_str("\\u0026"),
            '\u{2028}' => escaped.push_str("\\u2028"),
            '\u{2029}' => escaped.push_str("\\u2029"),
            other => escaped.push(other),
        }
    }
    Ok(escaped)
}
