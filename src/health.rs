//! Dependency probe and health surface.
//!
//! A background probe polls Frigate and Metis health endpoints every five
//! seconds and replaces a shared readiness snapshot wholesale; the HTTP
//! health server reads that snapshot for `/readyz`. Readiness is advisory
//! only: the pipeline keeps running regardless.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use crate::config::AppConfig;
use crate::httpd::{self, HttpResponse, HttpServerHandle};

const PROBE_INTERVAL: Duration = Duration::from_secs(5);
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Snapshot of dependency health. `ready` is the AND of all details.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadinessState {
    pub ready: bool,
    pub details: BTreeMap<String, bool>,
}

impl ReadinessState {
    /// Build a snapshot from the two dependency checks.
    pub fn from_checks(frigate_ok: bool, metis_ok: bool) -> Self {
        Self {
            ready: frigate_ok && metis_ok,
            details: BTreeMap::from([
                ("frigate".to_string(), frigate_ok),
                ("metis_detector".to_string(), metis_ok),
            ]),
        }
    }
}

pub type SharedReadiness = Arc<Mutex<ReadinessState>>;

pub fn shared_readiness() -> SharedReadiness {
    Arc::new(Mutex::new(ReadinessState::default()))
}

/// Derive the Metis health URL from its detect URL: a trailing `/detect`
/// path segment becomes `/healthz`, anything else probes `/healthz` at the
/// root. Query and fragment are dropped.
pub fn metis_health_url(detect_url: &str) -> Result<String> {
    let mut parsed = Url::parse(detect_url).context("parse metis detector url")?;
    let path = parsed.path().to_string();
    let health_path = match path.strip_suffix("/detect") {
        Some(prefix) => format!("{prefix}/healthz"),
        None => "/healthz".to_string(),
    };
    parsed.set_path(&health_path);
    parsed.set_query(None);
    parsed.set_fragment(None);
    Ok(parsed.to_string())
}

/// A dependency is "up" iff it answered with any status below 500 within the
/// probe timeout. Transport errors are "down".
fn is_http_up(url: &str) -> bool {
    match ureq::get(url).timeout(PROBE_TIMEOUT).call() {
        Ok(_) => true,
        Err(ureq::Error::Status(status, _)) => status < 500,
        Err(_) => false,
    }
}

/// Start the dependency probe thread.
pub fn spawn_dependency_probe(config: Arc<AppConfig>, readiness: SharedReadiness) {
    let frigate_url = format!(
        "{}/api/version",
        config.frigate_base_url.trim_end_matches('/')
    );
    let metis_url = metis_health_url(&config.metis_detector_url);
    if let Err(err) = &metis_url {
        log::warn!("metis health url derivation failed: {:#}", err);
    }
    let spawned = std::thread::Builder::new()
        .name("dependency-probe".to_string())
        .spawn(move || loop {
            let frigate_ok = is_http_up(&frigate_url);
            let metis_ok = metis_url.as_ref().map(|url| is_http_up(url)).unwrap_or(false);
            let snapshot = ReadinessState::from_checks(frigate_ok, metis_ok);
            if let Ok(mut shared) = readiness.lock() {
                *shared = snapshot;
            }
            std::thread::sleep(PROBE_INTERVAL);
        });
    if let Err(err) = spawned {
        log::error!("failed to spawn dependency probe: {}", err);
    }
}

/// Start the health HTTP server: `/healthz` is liveness (always ok while the
/// process runs), `/readyz` reflects the probe snapshot.
pub fn spawn_health_server(port: u16, readiness: SharedReadiness) -> Result<HttpServerHandle> {
    httpd::spawn("health", port, move |request| match request.path.as_str() {
        "/healthz" => HttpResponse::json(200, &serde_json::json!({"ok": true})),
        "/readyz" => {
            let snapshot = readiness
                .lock()
                .map(|shared| shared.clone())
                .unwrap_or_default();
            let status = if snapshot.ready { 200 } else { 503 };
            HttpResponse::json(
                status,
                &serde_json::json!({
                    "ready": snapshot.ready,
                    "dependencies": snapshot.details,
                }),
            )
        }
        _ => HttpResponse::json(404, &serde_json::json!({"error": "not found"})),
    })
}
