#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use http_body_util::BodyExt;
use native_render::{
    application::{
        native::{NativeRenderer, RenderConfiguration},
        ports::{
            LogLevel, QueryError, QueryExecutor, RenderLogger, SdkError, SdkInstallRequest,
            SdkVersionManager, TrackingEvent, TrackingSink,
        },
    },
    domain::types::{FundingSource, RenderMode},
    infra::http::build_router,
};
use serde_json::{Value, json};
use tower::ServiceExt;

pub const LIVE_VERSION: &str = "5.0.100";

pub struct StubQuery;

#[async_trait]
impl QueryExecutor for StubQuery {
    async fn execute(&self, _query: &str, _variables: Value) -> Result<Value, QueryError> {
        Ok(json!({ "eligible": true }))
    }
}

/// Answers like [`StubQuery`] after a delay.
pub struct SlowQuery {
    pub delay: Duration,
}

#[async_trait]
impl QueryExecutor for SlowQuery {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, QueryError> {
        tokio::time::sleep(self.delay).await;
        StubQuery.execute(query, variables).await
    }
}

pub struct StubVersions {
    pub live: &'static str,
}

#[async_trait]
impl SdkVersionManager for StubVersions {
    fn live_version(&self) -> String {
        self.live.to_string()
    }

    async fn get_or_install(&self, request: SdkInstallRequest) -> Result<String, SdkError> {
        Ok(request.version)
    }
}

pub struct QuietLogger;

impl RenderLogger for QuietLogger {
    fn log(&self, _level: LogLevel, _event: &str, _payload: &Value) {}

    fn track(&self, _payload: &Value) {}
}

#[derive(Clone, Default)]
pub struct RecordingTracking {
    pub events: Arc<Mutex<Vec<TrackingEvent>>>,
}

impl TrackingSink for RecordingTracking {
    fn track(&self, event: TrackingEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn renderers(live: &'static str, tracking: RecordingTracking) -> Vec<NativeRenderer> {
    renderers_with_query(live, tracking, Arc::new(StubQuery))
}

pub fn renderers_with_query(
    live: &'static str,
    tracking: RecordingTracking,
    query: Arc<dyn QueryExecutor>,
) -> Vec<NativeRenderer> {
    let mut renderers = Vec::new();
    for funding_source in FundingSource::ALL {
        let config = RenderConfiguration {
            query: query.clone(),
            logger: Arc::new(QuietLogger),
            tracking: Arc::new(tracking.clone()),
            funding_source,
            sdk_versions: Arc::new(StubVersions { live }),
        };
        for mode in [RenderMode::Popup, RenderMode::Fallback] {
            renderers.push(NativeRenderer::new(mode, config.clone()));
        }
    }
    renderers
}

pub fn router() -> Router {
    build_router(renderers(LIVE_VERSION, RecordingTracking::default()))
}

pub fn request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request should build")
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    app.clone()
        .oneshot(request(uri))
        .await
        .expect("router should respond")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub fn content_type(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get("content-type")
        .and_then(|value| value.to_str().ok())
}
