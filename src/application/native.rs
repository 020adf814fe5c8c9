//! Render pipeline shared by the native popup and fallback entry points.
//!
//! One invocation validates the claimed parent domain, resolves the SDK
//! version and fetches the render parameters (concurrently; both suspend),
//! then renders markup. Every failure is converted into a [`RenderResponse`]
//! here; nothing escapes to the transport.

use std::{sync::Arc, time::Instant};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use metrics::{counter, histogram};
use serde::Serialize;
use serde_json::{Value, json};
use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

use crate::{
    application::{
        error::NativeRenderError,
        ports::{QueryExecutor, RenderLogger, SdkVersionManager, TrackingEvent, TrackingSink},
        query::{query_for, variables_for},
        request::{Locale, ParsedOptions, RenderOptions, RenderRequest},
        response::RenderResponse,
        sdk::{DEFAULT_SDK_PACKAGE, SdkVersion, SdkVersionResolver},
    },
    domain::{
        origin::validate_parent_domain,
        types::{FundingSource, RenderMode},
    },
    presentation::views::{
        NativePageParts, NativePageView, TemplateRenderError, render_native_page,
    },
};

pub const DEFAULT_SDK_BASE_URL: &str = "https://www.paypalobjects.com/smart-payment-buttons";

type PageRenderer = fn(RenderMode, NativePageView) -> Result<String, TemplateRenderError>;

/// Collaborators shared read-only by every invocation of a renderer.
#[derive(Clone)]
pub struct RenderConfiguration {
    pub query: Arc<dyn QueryExecutor>,
    pub logger: Arc<dyn RenderLogger>,
    pub tracking: Arc<dyn TrackingSink>,
    pub funding_source: FundingSource,
    pub sdk_versions: Arc<dyn SdkVersionManager>,
}

/// Where the SDK bundles are published.
#[derive(Debug, Clone)]
pub struct SdkAssets {
    pub base_url: String,
    pub package: String,
}

impl SdkAssets {
    pub fn new(base_url: &Url, package: impl Into<String>) -> Self {
        Self {
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            package: package.into(),
        }
    }

    pub fn script_url(&self, version: &SdkVersion, mode: RenderMode) -> String {
        format!("{}/{}/{}", self.base_url, version, mode.bundle_file())
    }
}

impl Default for SdkAssets {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SDK_BASE_URL.to_string(),
            package: DEFAULT_SDK_PACKAGE.to_string(),
        }
    }
}

/// Entry point rendering the native popup page.
pub fn native_popup_middleware(config: RenderConfiguration) -> NativeRenderer {
    NativeRenderer::new(RenderMode::Popup, config)
}

/// Entry point rendering the native fallback page.
pub fn native_fallback_middleware(config: RenderConfiguration) -> NativeRenderer {
    NativeRenderer::new(RenderMode::Fallback, config)
}

#[derive(Clone)]
pub struct NativeRenderer {
    mode: RenderMode,
    config: Arc<RenderConfiguration>,
    resolver: SdkVersionResolver,
    assets: SdkAssets,
    render_page: PageRenderer,
}

impl NativeRenderer {
    pub fn new(mode: RenderMode, config: RenderConfiguration) -> Self {
        Self::with_assets(mode, config, SdkAssets::default())
    }

    pub fn with_assets(mode: RenderMode, config: RenderConfiguration, assets: SdkAssets) -> Self {
        let resolver = SdkVersionResolver::new(config.sdk_versions.clone(), assets.package.clone());
        Self {
            mode,
            config: Arc::new(config),
            resolver,
            assets,
            render_page: render_native_page,
        }
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn funding_source(&self) -> FundingSource {
        self.config.funding_source
    }

    #[cfg(test)]
    fn with_page_renderer(mut self, render_page: PageRenderer) -> Self {
        self.render_page = render_page;
        self
    }

    pub async fn handle(&self, request: RenderRequest) -> RenderResponse {
        let started = Instant::now();
        let mut trail = Trail::new(self, &request);

        self.config.logger.track(&trail.payload("start"));
        self.config
            .logger
            .debug("native_render_start", &trail.payload("start"));

        let (outcome, response) = match self.run(&request, &mut trail).await {
            Ok(html) => {
                self.config
                    .logger
                    .info("native_render_success", &trail.payload("rendered"));
                ("rendered", RenderResponse::html(html))
            }
            Err(err) => {
                let outcome = err.outcome();
                let response = RenderResponse::from_error(&err);
                let chain = response
                    .report()
                    .map(|report| report.messages.join(": "))
                    .unwrap_or_else(|| err.to_string());
                match err {
                    NativeRenderError::Validation(_) => self
                        .config
                        .logger
                        .warn("native_render_rejected", &trail.with_error(outcome, &chain)),
                    _ => self
                        .config
                        .logger
                        .error("native_render_failed", &trail.with_error(outcome, &chain)),
                }
                (outcome, response)
            }
        };

        self.record_metrics(outcome, started);
        self.config
            .tracking
            .track(trail.event(outcome, response.status().as_u16()));

        response
    }

    async fn run(
        &self,
        request: &RenderRequest,
        trail: &mut Trail,
    ) -> Result<String, NativeRenderError> {
        let domain = validate_parent_domain(
            request.parent_domain(),
            self.config.funding_source.authorized_root_domains(),
        )
        .into_result()
        .map_err(|reason| NativeRenderError::Validation(reason.into()))?;

        trail.parent_domain = Some(domain.clone());

        let ParsedOptions { options, ignored } = request.options();
        for err in &ignored {
            self.config.logger.warn(
                "native_render_param_ignored",
                &trail.with_error("validated", &err.to_string()),
            );
        }
        self.config
            .logger
            .debug("native_render_validated", &trail.payload("validated"));

        let query = query_for(self.mode);
        let variables = variables_for(self.config.funding_source, &options);
        let (version, render_config) = tokio::join!(
            self.resolver.resolve(),
            self.config.query.execute(query, variables)
        );
        let version = version.map_err(NativeRenderError::Resolution)?;
        let render_config = render_config.map_err(NativeRenderError::Query)?;

        trail.buttons_version = Some(version.to_string());
        self.config
            .logger
            .debug("native_render_resolved", &trail.payload("resolved"));

        self.render(&domain, &options, &version, render_config)
    }

    fn render(
        &self,
        parent_domain: &str,
        options: &RenderOptions,
        version: &SdkVersion,
        render_config: Value,
    ) -> Result<String, NativeRenderError> {
        let funding_source = self.config.funding_source;
        let setup = SetupPayload {
            funding_source,
            parent_domain,
            env: options.env.as_str(),
            client_id: options.client_id.as_deref(),
            session_id: options.session_id.as_deref(),
            button_session_id: options.button_session_id.as_deref(),
            sdk_correlation_id: options.sdk_correlation_id.as_deref(),
            locale: &options.locale,
            buttons_version: version.as_str(),
            debug: options.debug,
            config: render_config,
        };

        let parts = NativePageParts {
            title: funding_source.display_name().to_string(),
            lang: options.locale.lang.clone(),
            funding_source: funding_source.as_str(),
            buttons_version: version.to_string(),
            sdk_script_url: self.assets.script_url(version, self.mode),
            nonce: csp_nonce(),
        };

        NativePageView::new(self.mode, &setup, parts)
            .and_then(|page| (self.render_page)(self.mode, page))
            .map_err(NativeRenderError::Render)
    }

    fn record_metrics(&self, outcome: &'static str, started: Instant) {
        let mode = self.mode.as_str();
        let funding_source = self.config.funding_source.as_str();
        counter!(
            "native_render_total",
            "mode" => mode,
            "funding_source" => funding_source,
            "outcome" => outcome
        )
        .increment(1);
        histogram!(
            "native_render_ms",
            "mode" => mode,
            "funding_source" => funding_source
        )
        .record(started.elapsed().as_secs_f64() * 1000.0);
    }
}

/// Argument of the client-side `spb.setupNative*` call.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SetupPayload<'a> {
    funding_source: FundingSource,
    parent_domain: &'a str,
    env: &'static str,
    #[serde(rename = "clientID")]
    client_id: Option<&'a str>,
    #[serde(rename = "sessionID")]
    session_id: Option<&'a str>,
    #[serde(rename = "buttonSessionID")]
    button_session_id: Option<&'a str>,
    #[serde(rename = "sdkCorrelationID")]
    sdk_correlation_id: Option<&'a str>,
    locale: &'a Locale,
    buttons_version: &'a str,
    debug: bool,
    config: Value,
}

/// Per-invocation context carried into log lines and the tracking event.
struct Trail {
    mode: RenderMode,
    funding_source: FundingSource,
    request_id: Option<String>,
    session_id: Option<String>,
    parent_domain: Option<String>,
    buttons_version: Option<String>,
}

impl Trail {
    fn new(renderer: &NativeRenderer, request: &RenderRequest) -> Self {
        Self {
            mode: renderer.mode,
            funding_source: renderer.config.funding_source,
            request_id: request.request_id.clone(),
            session_id: request.query.session_id.clone(),
            parent_domain: None,
            buttons_version: None,
        }
    }

    fn payload(&self, state: &str) -> Value {
        json!({
            "state": state,
            "mode": self.mode.as_str(),
            "fundingSource": self.funding_source.as_str(),
            "requestID": self.request_id,
            "sessionID": self.session_id,
            "parentDomain": self.parent_domain,
            "buttonsVersion": self.buttons_version,
        })
    }

    fn with_error(&self, state: &str, error: &str) -> Value {
        let mut payload = self.payload(state);
        payload["error"] = Value::String(error.to_string());
        payload
    }

    fn event(&self, outcome: &'static str, status: u16) -> TrackingEvent {
        TrackingEvent {
            event: "native_render",
            outcome,
            mode: self.mode,
            funding_source: self.funding_source,
            status,
            parent_domain: self.parent_domain.clone(),
            buttons_version: self.buttons_version.clone(),
            request_id: self.request_id.clone(),
            session_id: self.session_id.clone(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

fn csp_nonce() -> String {
    BASE64.encode(Uuid::new_v4().as_bytes())
}
