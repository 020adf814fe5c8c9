//! Logger and tracking sinks wired to `tracing` and an optional HTTP beacon.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::application::ports::{LogLevel, RenderLogger, TrackingEvent, TrackingSink};

use super::error::InfraError;

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRenderLogger;

impl RenderLogger for TracingRenderLogger {
    fn log(&self, level: LogLevel, event: &str, payload: &Value) {
        match level {
            LogLevel::Debug => debug!(target = "native::render", event, payload = %payload),
            LogLevel::Info => info!(target = "native::render", event, payload = %payload),
            LogLevel::Warn => warn!(target = "native::render", event, payload = %payload),
            LogLevel::Error => error!(target = "native::render", event, payload = %payload),
        }
    }

    fn track(&self, payload: &Value) {
        info!(target = "native::track", payload = %payload, "track");
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTrackingSink;

impl TrackingSink for TracingTrackingSink {
    fn track(&self, event: TrackingEvent) {
        info!(
            target = "native::tracking",
            event = event.event,
            outcome = event.outcome,
            mode = event.mode.as_str(),
            funding_source = event.funding_source.as_str(),
            status = event.status,
            parent_domain = event.parent_domain.as_deref().unwrap_or(""),
            request_id = event.request_id.as_deref().unwrap_or(""),
            "tracking event"
        );
    }
}

/// Posts each event to a collector on a detached task.
#[derive(Clone)]
pub struct BeaconTrackingSink {
    http: Client,
    endpoint: Url,
}

impl BeaconTrackingSink {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, InfraError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::configuration(format!("tracking client: {err}")))?;
        Ok(Self { http, endpoint })
    }
}

impl TrackingSink for BeaconTrackingSink {
    fn track(&self, event: TrackingEvent) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(target = "native::tracking", "no runtime; dropping event");
            return;
        };

        let http = self.http.clone();
        let endpoint = self.endpoint.clone();
        runtime.spawn(async move {
            let result = http.post(endpoint.clone()).json(&event).send().await;
            match result {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => warn!(
                    target = "native::tracking",
                    endpoint = %endpoint,
                    status = response.status().as_u16(),
                    "tracking beacon rejected"
                ),
                Err(err) => warn!(
                    target = "native::tracking",
                    endpoint = %endpoint,
                    error = %err,
                    "tracking beacon failed"
                ),
            }
        });
    }
}

/// Forwards every event to each inner sink.
pub struct FanoutTrackingSink {
    sinks: Vec<Box<dyn TrackingSink>>,
}

impl FanoutTrackingSink {
    pub fn new(sinks: Vec<Box<dyn TrackingSink>>) -> Self {
        Self { sinks }
    }
}

impl TrackingSink for FanoutTrackingSink {
    fn track(&self, event: TrackingEvent) {
        for sink in &self.sinks {
            sink.track(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use time::OffsetDateTime;

    use crate::domain::types::{FundingSource, RenderMode};

    #[derive(Clone, Default)]
    struct Recording(Arc<Mutex<Vec<&'static str>>>);

    impl TrackingSink for Recording {
        fn track(&self, event: TrackingEvent) {
            self.0.lock().unwrap().push(event.outcome);
        }
    }

    fn event() -> TrackingEvent {
        TrackingEvent {
            event: "native_render",
            outcome: "rendered",
            mode: RenderMode::Popup,
            funding_source: FundingSource::Venmo,
            status: 200,
            parent_domain: Some("foo.paypal.com".into()),
            buttons_version: Some("5.0.100".into()),
            request_id: None,
            session_id: None,
            timestamp: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn fanout_reaches_every_sink() {
        let first = Recording::default();
        let second = Recording::default();
        let sink = FanoutTrackingSink::new(vec![Box::new(first.clone()), Box::new(second.clone())]);

        sink.track(event());

        assert_eq!(first.0.lock().unwrap().as_slice(), &["rendered"]);
        assert_eq!(second.0.lock().unwrap().as_slice(), &["rendered"]);
    }

    #[test]
    fn events_serialize_in_camel_case() {
        let json = serde_json::to_value(event()).expect("json");
        assert_eq!(json["fundingSource"], "venmo");
        assert_eq!(json["parentDomain"], "foo.paypal.com");
        assert_eq!(json["timestamp"], "1970-01-01T00:00:00Z");
        assert!(json.get("requestId").is_none());
    }

    #[test]
    fn beacon_without_runtime_drops_silently() {
        let sink = BeaconTrackingSink::new(
            Url::parse("http://127.0.0.1:9/collect").expect("url"),
            Duration::from_millis(50),
        )
        .expect("sink");
        sink.track(event());
    }
}
