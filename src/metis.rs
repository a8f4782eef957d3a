//! Metis detector client.
//!
//! Metis is an external HTTP object-detection service: POST a JPEG, get back
//! a JSON array of `[class_id, score, x1, y1, x2, y2]` rows. Malformed rows
//! are skipped silently; HTTP error statuses and decode failures surface as
//! errors so the worker can degrade the observation to `unknown`.

use anyhow::{bail, Context, Result};
use std::time::{Duration, Instant};

use crate::config::ZoneClassIds;
use crate::metrics::INFER_MS;
use crate::state::ZoneState;

/// One detection row from Metis, normalized box coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub class_id: i64,
    pub score: f64,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

#[derive(Clone, Debug)]
pub struct MetisClient {
    url: String,
    timeout: Duration,
}

impl MetisClient {
    pub fn new(url: impl Into<String>, timeout_s: f64) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs_f64(timeout_s.max(0.1)),
        }
    }

    /// Submit one JPEG-encoded ROI for detection.
    ///
    /// Inference latency is recorded for every call that produced an HTTP
    /// response, including error statuses; transport failures (no response)
    /// are not recorded.
    pub fn detect(&self, jpeg: &[u8]) -> Result<Vec<Detection>> {
        let started = Instant::now();
        let result = ureq::post(&self.url)
            .timeout(self.timeout)
            .set("Content-Type", "image/jpeg")
            .send_bytes(jpeg);
        match result {
            Ok(response) => {
                INFER_MS.observe(elapsed_ms(started));
                let value: serde_json::Value = response
                    .into_json()
                    .context("decode metis detection response")?;
                Ok(parse_detections(&value))
            }
            Err(ureq::Error::Status(code, response)) => {
                INFER_MS.observe(elapsed_ms(started));
                let body = response.into_string().unwrap_or_default();
                bail!("metis returned status {}: {}", code, body);
            }
            Err(err) => Err(err).context("metis request failed"),
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Parse the Metis response body into detections.
///
/// A non-array top level yields an empty set. Rows shorter than 6 elements
/// or with non-numeric entries are skipped. Box coordinates are clamped to
/// `[0, 1]` on ingest.
pub fn parse_detections(value: &serde_json::Value) -> Vec<Detection> {
    let Some(rows) = value.as_array() else {
        return Vec::new();
    };
    rows.iter()
        .filter_map(|row| {
            let row = row.as_array()?;
            if row.len() < 6 {
                return None;
            }
            let mut fields = [0.0f64; 6];
            for (slot, cell) in fields.iter_mut().zip(row.iter()) {
                *slot = cell.as_f64()?;
            }
            Some(Detection {
                class_id: fields[0] as i64,
                score: fields[1],
                x1: fields[2].clamp(0.0, 1.0),
                y1: fields[3].clamp(0.0, 1.0),
                x2: fields[4].clamp(0.0, 1.0),
                y2: fields[5].clamp(0.0, 1.0),
            })
        })
        .collect()
}

/// Reduce a detection set to a single zone observation.
///
/// Takes the best score per class; below-threshold on both sides means
/// `unknown`. Ties go to `open`.
pub fn reduce_detections(
    detections: &[Detection],
    ids: &ZoneClassIds,
    conf_threshold: f64,
) -> (ZoneState, f64) {
    let mut best_open = 0.0f64;
    let mut best_closed = 0.0f64;
    for det in detections {
        if det.class_id == ids.open {
            best_open = best_open.max(det.score);
        } else if det.class_id == ids.closed {
            best_closed = best_closed.max(det.score);
        }
    }
    if best_open < conf_threshold && best_closed < conf_threshold {
        return (ZoneState::Unknown, 0.0);
    }
    if best_open >= best_closed {
        (ZoneState::Open, best_open)
    } else {
        (ZoneState::Closed, best_closed)
    }
}
