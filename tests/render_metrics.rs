mod support;

use std::collections::HashSet;

use axum::http::StatusCode;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use support::{get, router};

#[tokio::test]
async fn renders_emit_counter_and_latency_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let app = router();
    let ok = get(&app, "/smart/checkout/native/popup?parentDomain=foo.paypal.com").await;
    assert_eq!(ok.status(), StatusCode::OK);
    let rejected = get(&app, "/smart/checkout/native/popup?parentDomain=haxpaypal.com").await;
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

    let snapshot = snapshotter.snapshot().into_vec();

    let names: HashSet<String> = snapshot
        .iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();
    for metric in ["native_render_total", "native_render_ms"] {
        assert!(names.contains(metric), "missing metric: {metric}");
    }

    let mut outcomes = Vec::new();
    for (composite_key, _, _, value) in &snapshot {
        let key = composite_key.key();
        if key.name() != "native_render_total" {
            continue;
        }
        let outcome = key
            .labels()
            .find(|label| label.key() == "outcome")
            .map(|label| label.value().to_string())
            .expect("outcome label");
        assert!(matches!(value, DebugValue::Counter(1)), "{outcome}");
        outcomes.push(outcome);
    }
    outcomes.sort();
    assert_eq!(outcomes, vec!["rejected".to_string(), "rendered".to_string()]);
}
