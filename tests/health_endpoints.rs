//! Integration tests for the health HTTP surface.

use safehaven_core::health::{shared_readiness, spawn_health_server, ReadinessState};

fn get_json(url: &str) -> (u16, serde_json::Value) {
    match ureq::get(url).call() {
        Ok(response) => {
            let status = response.status();
            (status, response.into_json().expect("json body"))
        }
        Err(ureq::Error::Status(status, response)) => {
            (status, response.into_json().expect("json body"))
        }
        Err(err) => panic!("request failed: {err}"),
    }
}

#[test]
fn health_surface_serves_liveness_readiness_and_404() {
    let readiness = shared_readiness();
    let server = spawn_health_server(0, readiness.clone()).expect("spawn health server");
    let base = format!("http://127.0.0.1:{}", server.addr.port());

    let (status, body) = get_json(&format!("{base}/healthz"));
    assert_eq!(status, 200);
    assert_eq!(body, serde_json::json!({"ok": true}));

    // Not ready until the probe has reported both dependencies up.
    let (status, body) = get_json(&format!("{base}/readyz"));
    assert_eq!(status, 503);
    assert_eq!(body["ready"], false);

    *readiness.lock().expect("lock") = ReadinessState::from_checks(true, true);
    let (status, body) = get_json(&format!("{base}/readyz"));
    assert_eq!(status, 200);
    assert_eq!(body["ready"], true);
    assert_eq!(body["dependencies"]["frigate"], true);
    assert_eq!(body["dependencies"]["metis_detector"], true);

    *readiness.lock().expect("lock") = ReadinessState::from_checks(true, false);
    let (status, body) = get_json(&format!("{base}/readyz"));
    assert_eq!(status, 503);
    assert_eq!(body["dependencies"]["metis_detector"], false);

    let (status, body) = get_json(&format!("{base}/metrics"));
    assert_eq!(status, 404);
    assert_eq!(body, serde_json::json!({"error": "not found"}));

    server.stop().expect("stop server");
}
