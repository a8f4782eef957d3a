//! Per-camera inference-and-decision worker.
//!
//! Drains the camera's sample queue; for each frame and each configured zone
//! it crops the ROI, runs remote detection, reduces the result to an
//! observation, and feeds the zone's debounced state machine. Committed
//! transitions and left-open conditions are handed to the event emitter.
//!
//! Nothing in per-ROI processing escapes the loop: any error degrades that
//! zone's observation to `(unknown, 0)` so debouncing continues.

use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::config::{AppConfig, CameraConfig, Roi, ZoneClassIds};
use crate::events::{zone_spec, EventEmitter, EventMedia};
use crate::frame::{crop_roi, Frame, Sample};
use crate::metis::{reduce_detections, MetisClient};
use crate::metrics::E2E_MS;
use crate::queue::SampleQueue;
use crate::state::{DebouncedStateMachine, ZoneState};

const TRANSITION_DURATION_S: i64 = 15;
const LEFT_OPEN_DURATION_S: i64 = 30;

pub struct DecisionWorker {
    config: Arc<AppConfig>,
    camera: CameraConfig,
    queue: Arc<SampleQueue>,
    metis: MetisClient,
    emitter: EventEmitter,
    machines: BTreeMap<String, DebouncedStateMachine>,
    /// Zones whose current failure streak has already been logged at WARN;
    /// repeats drop to DEBUG until the zone observes successfully again.
    warned_zones: BTreeSet<String>,
    debug_counter: u64,
    last_demo_emit_ts: f64,
}

impl DecisionWorker {
    pub fn new(
        config: Arc<AppConfig>,
        camera: CameraConfig,
        queue: Arc<SampleQueue>,
        emitter: EventEmitter,
    ) -> Self {
        let left_open_seconds = config.left_open_seconds();
        let machines = camera
            .rois
            .keys()
            .filter_map(|zone| {
                zone_spec(zone).map(|spec| {
                    (
                        zone.clone(),
                        DebouncedStateMachine::new(spec, left_open_seconds),
                    )
                })
            })
            .collect();
        let metis = MetisClient::new(&config.metis_detector_url, config.metis_timeout_s);
        Self {
            config,
            camera,
            queue,
            metis,
            emitter,
            machines,
            warned_zones: BTreeSet::new(),
            debug_counter: 0,
            last_demo_emit_ts: 0.0,
        }
    }

    /// Worker thread body: consume samples until the queue handle fails.
    pub fn run(mut self) -> Result<()> {
        loop {
            let sample = self.queue.pop()?;
            self.process_sample(&sample);
        }
    }

    pub fn process_sample(&mut self, sample: &Sample) {
        let now = crate::unix_now_secs();

        for (zone, roi) in &self.camera.rois {
            let Some(ids) = self.config.zone_class_map.get(zone) else {
                continue;
            };
            if !self.machines.contains_key(zone) {
                continue;
            }

            let (observed, score, roi_frame) = match observe_zone(
                &self.metis,
                &sample.frame,
                roi,
                ids,
                self.config.state_conf_threshold,
            ) {
                Ok((observed, score, roi_frame)) => {
                    self.warned_zones.remove(zone);
                    (observed, score, Some(roi_frame))
                }
                Err(err) => {
                    if self.warned_zones.insert(zone.clone()) {
                        log::warn!(
                            "Inference error camera={} zone={} err={:#}",
                            self.camera.name,
                            zone,
                            err
                        );
                    } else {
                        log::debug!(
                            "Inference error camera={} zone={} err={:#}",
                            self.camera.name,
                            zone,
                            err
                        );
                    }
                    (ZoneState::Unknown, 0.0, None)
                }
            };

            let Some(machine) = self.machines.get_mut(zone) else {
                continue;
            };
            let out = machine.update(observed, now);
            let current_state = machine.state();

            self.debug_counter += 1;
            if self.config.debug_state_every > 0
                && self.debug_counter % self.config.debug_state_every == 0
            {
                log::info!(
                    "State debug camera={} zone={} observed={} score={:.3} threshold={:.3} current_state={}",
                    self.camera.name,
                    zone,
                    observed,
                    score,
                    self.config.state_conf_threshold,
                    current_state
                );
            }

            let media = EventMedia {
                roi_frame: roi_frame.as_ref(),
                frame: Some(&sample.frame),
                roi: Some(roi),
            };

            if let Some(label) = out.transition_event {
                self.emitter.emit(
                    &self.camera.name,
                    label,
                    score,
                    TRANSITION_DURATION_S,
                    &format!("zone={} state={}", zone, observed),
                    media,
                );
            }
            if let Some(label) = out.left_open_event {
                self.emitter.emit(
                    &self.camera.name,
                    label,
                    score.max(0.5),
                    LEFT_OPEN_DURATION_S,
                    &format!("zone={} open_for={}m", zone, self.config.left_open_minutes),
                    media,
                );
            }

            if self.config.demo_emit_interval_s > 0
                && zone == &self.config.demo_zone
                && observed != ZoneState::Unknown
                && now - self.last_demo_emit_ts >= self.config.demo_emit_interval_s as f64
            {
                let label = format!("{}_{}_status", zone, observed);
                let duration = self.config.demo_emit_interval_s.max(5) as i64;
                self.emitter.emit(
                    &self.camera.name,
                    &label,
                    score,
                    duration,
                    &format!("demo=true zone={} observed={}", zone, observed),
                    media,
                );
                self.last_demo_emit_ts = now;
            }
        }

        E2E_MS.observe((crate::unix_now_secs() - sample.captured_ts) * 1000.0);
    }

    #[cfg(test)]
    pub(crate) fn zone_count(&self) -> usize {
        self.machines.len()
    }
}

/// Crop, detect, and reduce one zone of one frame.
fn observe_zone(
    metis: &MetisClient,
    frame: &Frame,
    roi: &Roi,
    ids: &ZoneClassIds,
    conf_threshold: f64,
) -> Result<(ZoneState, f64, Frame)> {
    let roi_frame = crop_roi(frame, roi);
    let jpeg = roi_frame.to_jpeg()?;
    let detections = metis.detect(&jpeg)?;
    let (observed, score) = reduce_detections(&detections, ids, conf_threshold);
    Ok((observed, score, roi_frame))
}
