//! Frigate event API client.
//!
//! Emits semantic lifecycle events to a Frigate-compatible NVR and fetches
//! its recorded snapshot/clip for an event id. Event creation is fire-and-
//! forget: failures are logged and the event is considered dropped, never
//! retried.

use serde::Serialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_EVENT_TIMEOUT: Duration = Duration::from_secs(3);
const MEDIA_TIMEOUT_FLOOR: Duration = Duration::from_secs(10);

/// Overlay boxes attached to a created event.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct DrawPayload {
    pub boxes: Vec<DrawBox>,
}

/// One normalized overlay box. `score` is an integer percentage here while
/// the top-level event score stays a float; Frigate expects the asymmetry.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct DrawBox {
    #[serde(rename = "box")]
    pub rect: [f64; 4],
    pub color: [u8; 3],
    pub score: i64,
}

#[derive(Debug, Serialize)]
struct CreateEventBody<'a> {
    sub_label: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<i64>,
    include_recording: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    draw: Option<DrawPayload>,
}

#[derive(Clone, Debug)]
pub struct FrigateClient {
    base_url: String,
    timeout: Duration,
}

impl FrigateClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_EVENT_TIMEOUT,
        }
    }

    /// Create an event; returns Frigate's event id when the response carries
    /// one. Failures are logged at WARN and yield `None`.
    #[allow(clippy::too_many_arguments)]
    pub fn create_event(
        &self,
        camera: &str,
        label: &str,
        sub_label: &str,
        score: Option<f64>,
        duration: Option<i64>,
        include_recording: bool,
        draw: Option<DrawPayload>,
    ) -> Option<String> {
        let url = format!("{}/api/events/{}/{}/create", self.base_url, camera, label);
        let body = CreateEventBody {
            sub_label,
            score,
            duration,
            include_recording,
            draw,
        };
        let payload = match serde_json::to_value(&body) {
            Ok(payload) => payload,
            Err(err) => {
                log::warn!("Create Event payload encode failed url={} err={}", url, err);
                return None;
            }
        };
        match ureq::post(&url).timeout(self.timeout).send_json(payload.clone()) {
            Ok(response) => {
                // ureq only errors on 4xx/5xx; anything >= 300 that slipped
                // through (e.g. an unfollowed 3xx) is still a failure here.
                let status = response.status();
                if status >= 300 {
                    let body = response.into_string().unwrap_or_default();
                    log::warn!(
                        "Create Event failed url={} status={} body={}",
                        url,
                        status,
                        body
                    );
                    return None;
                }
                log::info!(
                    "Create Event success url={} payload={} status={}",
                    url,
                    payload,
                    status
                );
                response
                    .into_json::<serde_json::Value>()
                    .ok()
                    .and_then(|value| value.get("event_id").and_then(|id| id.as_str().map(String::from)))
            }
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                log::warn!(
                    "Create Event failed url={} status={} body={}",
                    url,
                    status,
                    body
                );
                None
            }
            Err(err) => {
                log::warn!("Create Event request error url={} err={}", url, err);
                None
            }
        }
    }

    /// Best-effort fetch of Frigate's recorded snapshot and clip for an
    /// event. Missing media is expected shortly after creation and logged at
    /// INFO only.
    pub fn fetch_event_media(&self, event_id: &str, out_dir: &Path) {
        if let Err(err) = std::fs::create_dir_all(out_dir) {
            log::warn!(
                "Event media directory create failed dir={} err={}",
                out_dir.display(),
                err
            );
            return;
        }
        let timeout = self.timeout.max(MEDIA_TIMEOUT_FLOOR);
        for (media, ext) in [("snapshot.jpg", "jpg"), ("clip.mp4", "mp4")] {
            let url = format!("{}/api/events/{}/{}", self.base_url, event_id, media);
            let path = out_dir.join(format!("{event_id}.{ext}"));
            match ureq::get(&url).timeout(timeout).call() {
                Ok(response) => {
                    let mut bytes = Vec::new();
                    if let Err(err) =
                        std::io::Read::read_to_end(&mut response.into_reader(), &mut bytes)
                    {
                        log::info!("Event media read failed url={} err={}", url, err);
                        continue;
                    }
                    if bytes.is_empty() {
                        log::info!("Event media unavailable yet url={} (empty body)", url);
                        continue;
                    }
                    match std::fs::write(&path, &bytes) {
                        Ok(()) => log::info!("Saved event media {}", path.display()),
                        Err(err) => log::warn!(
                            "Event media write failed path={} err={}",
                            path.display(),
                            err
                        ),
                    }
                }
                Err(ureq::Error::Status(status, _)) => {
                    log::info!("Event media unavailable yet url={} status={}", url, status);
                }
                Err(err) => {
                    log::info!("Event media fetch failed url={} err={}", url, err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_body_omits_unset_fields() {
        let body = CreateEventBody {
            sub_label: "zone=gate conf=0.90 source=metis",
            score: None,
            duration: None,
            include_recording: true,
            draw: None,
        };
        let value = serde_json::to_value(&body).expect("serialize");
        let object = value.as_object().expect("object");
        assert_eq!(object.len(), 2);
        assert_eq!(object["include_recording"], true);
        assert!(!object.contains_key("score"));
        assert!(!object.contains_key("duration"));
        assert!(!object.contains_key("draw"));
    }

    #[test]
    fn event_body_is_stable_for_identical_inputs() {
        let make = || CreateEventBody {
            sub_label: "zone=garage state=open conf=0.88 source=metis",
            score: Some(0.88),
            duration: Some(15),
            include_recording: true,
            draw: Some(DrawPayload {
                boxes: vec![DrawBox {
                    rect: [0.1, 0.2, 0.3, 0.4],
                    color: [0, 255, 0],
                    score: 88,
                }],
            }),
        };
        let a = serde_json::to_value(make()).expect("serialize");
        let b = serde_json::to_value(make()).expect("serialize");
        assert_eq!(a, b);
    }

    #[test]
    fn draw_box_serializes_with_box_key() {
        let draw = DrawPayload {
            boxes: vec![DrawBox {
                rect: [0.0, 0.0, 0.5, 0.5],
                color: [0, 255, 0],
                score: 73,
            }],
        };
        let value = serde_json::to_value(&draw).expect("serialize");
        assert_eq!(value["boxes"][0]["box"][2], 0.5);
        assert_eq!(value["boxes"][0]["score"], 73);
        assert_eq!(value["boxes"][0]["color"][1], 255);
    }
}
