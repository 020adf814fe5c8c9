//! Capability traits for the collaborators the render pipeline depends on.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::types::{FundingSource, RenderMode};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query transport failed: {0}")]
    Transport(String),
    #[error("query endpoint answered with status {status}")]
    Status { status: u16 },
    #[error("query response could not be decoded: {0}")]
    Decode(String),
    #[error("query returned errors: {}", messages.join("; "))]
    Graphql { messages: Vec<String> },
    #[error("query response carried no data")]
    MissingData,
}

/// Executes a named query with JSON variables and yields the opaque result.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, QueryError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Structured logger handed to renderers at construction.
pub trait RenderLogger: Send + Sync {
    fn log(&self, level: LogLevel, event: &str, payload: &Value);

    fn track(&self, payload: &Value);

    fn debug(&self, event: &str, payload: &Value) {
        self.log(LogLevel::Debug, event, payload);
    }

    fn info(&self, event: &str, payload: &Value) {
        self.log(LogLevel::Info, event, payload);
    }

    fn warn(&self, event: &str, payload: &Value) {
        self.log(LogLevel::Warn, event, payload);
    }

    fn error(&self, event: &str, payload: &Value) {
        self.log(LogLevel::Error, event, payload);
    }
}

/// Outcome reported to the tracking sink once per invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent {
    pub event: &'static str,
    pub outcome: &'static str,
    pub mode: RenderMode,
    pub funding_source: FundingSource,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buttons_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Fire-and-forget sink; implementations must not block the caller.
pub trait TrackingSink: Send + Sync {
    fn track(&self, event: TrackingEvent);
}

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("no live version is published for `{package}`")]
    NoLiveVersion { package: String },
    #[error("`{package}@{version}` is not available: {reason}")]
    Install {
        package: String,
        version: String,
        reason: String,
    },
    #[error("installed version of `{package}` is empty")]
    EmptyInstalledVersion { package: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkInstallRequest {
    pub package: String,
    pub version: String,
}

/// Source of SDK bundle versions.
#[async_trait]
pub trait SdkVersionManager: Send + Sync {
    /// Currently published version; empty when none is known.
    fn live_version(&self) -> String;

    /// Ensure the requested version is available locally and return it.
    async fn get_or_install(&self, request: SdkInstallRequest) -> Result<String, SdkError>;
}
