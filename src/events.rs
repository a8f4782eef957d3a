//! Semantic event emission and evidence capture.
//!
//! Every fired event is counted, formatted into a Frigate event (sub-label,
//! optional draw overlay), POSTed, and backed by local evidence JPEGs: the
//! raw ROI crop and the full frame with the ROI outlined. When Frigate
//! returns an event id, its recorded snapshot/clip are fetched best-effort
//! into the same directory.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{AppConfig, Roi};
use crate::frame::{self, Frame, EVIDENCE_GREEN};
use crate::frigate::{DrawBox, DrawPayload, FrigateClient};
use crate::metrics::SEMANTIC_EVENTS;

/// Event labels for one zone kind.
#[derive(Debug)]
pub struct ZoneSpec {
    pub open_event: &'static str,
    pub close_event: &'static str,
    pub left_open_event: &'static str,
}

/// The static zone table. Zones not listed here are ignored by the pipeline
/// even when a camera configures an ROI for them.
pub fn zone_spec(zone: &str) -> Option<&'static ZoneSpec> {
    match zone {
        "garage" => Some(&ZoneSpec {
            open_event: "garage_opened",
            close_event: "garage_closed",
            left_open_event: "garage_left_open",
        }),
        "gate" => Some(&ZoneSpec {
            open_event: "gate_ajar",
            close_event: "gate_closed",
            left_open_event: "gate_left_open",
        }),
        "latch" => Some(&ZoneSpec {
            open_event: "latch_unlocked",
            close_event: "latch_locked",
            left_open_event: "latch_left_open",
        }),
        _ => None,
    }
}

/// Optional evidence inputs for one emission.
#[derive(Clone, Copy, Default)]
pub struct EventMedia<'a> {
    pub roi_frame: Option<&'a Frame>,
    pub frame: Option<&'a Frame>,
    pub roi: Option<&'a Roi>,
}

impl EventMedia<'_> {
    pub fn none() -> Self {
        Self::default()
    }
}

#[derive(Clone)]
pub struct EventEmitter {
    config: Arc<AppConfig>,
    frigate: Arc<FrigateClient>,
}

impl EventEmitter {
    pub fn new(config: Arc<AppConfig>, frigate: Arc<FrigateClient>) -> Self {
        Self { config, frigate }
    }

    /// Emit one semantic event for `camera`.
    pub fn emit(
        &self,
        camera: &str,
        label: &str,
        score: f64,
        duration: i64,
        extra: &str,
        media: EventMedia<'_>,
    ) {
        SEMANTIC_EVENTS.with_label_values(&[camera, label]).inc();
        let sub_label = sub_label(extra, score);
        log::info!(
            "Semantic event camera={} label={} score={:.3} duration={} subLabel={}",
            camera,
            label,
            score,
            duration,
            sub_label
        );
        let draw = media.roi.map(|roi| draw_payload(roi, score));
        let event_id = self.frigate.create_event(
            camera,
            label,
            &sub_label,
            Some(score),
            Some(duration),
            true,
            draw,
        );

        if !self.config.save_event_media {
            return;
        }
        let event_dir = self.event_dir(camera, label);
        if let Some(roi_frame) = media.roi_frame {
            self.save_local_evidence(&event_dir, label, score, roi_frame, media);
        }
        if let Some(event_id) = &event_id {
            self.frigate.fetch_event_media(event_id, &event_dir);
        }
    }

    fn event_dir(&self, camera: &str, label: &str) -> PathBuf {
        self.config.evidence_dir.join(camera).join(label)
    }

    fn save_local_evidence(
        &self,
        event_dir: &PathBuf,
        label: &str,
        score: f64,
        roi_frame: &Frame,
        media: EventMedia<'_>,
    ) {
        if let Err(err) = std::fs::create_dir_all(event_dir) {
            log::warn!(
                "Evidence directory create failed dir={} err={}",
                event_dir.display(),
                err
            );
            return;
        }
        let ts = crate::unix_now_secs() as i64;

        let roi_path = event_dir.join(format!("{ts}_roi.jpg"));
        match roi_frame.to_jpeg() {
            Ok(jpeg) => match std::fs::write(&roi_path, jpeg) {
                Ok(()) => log::info!("Saved local ROI evidence {}", roi_path.display()),
                Err(err) => {
                    log::warn!("Evidence write failed path={} err={}", roi_path.display(), err)
                }
            },
            Err(err) => log::warn!("Evidence encode failed path={} err={:#}", roi_path.display(), err),
        }

        let (Some(full_frame), Some(roi)) = (media.frame, media.roi) else {
            return;
        };
        let mut snap = full_frame.clone();
        let rect = frame::roi_pixel_rect(roi, snap.width(), snap.height());
        frame::draw_rect(&mut snap, rect, 2, EVIDENCE_GREEN);
        frame::draw_label(&mut snap, &format!("{label} {score:.2}"), 20, 20, EVIDENCE_GREEN);
        let full_path = event_dir.join(format!("{ts}_full.jpg"));
        match snap.to_jpeg() {
            Ok(jpeg) => match std::fs::write(&full_path, jpeg) {
                Ok(()) => log::info!("Saved local full-frame evidence {}", full_path.display()),
                Err(err) => {
                    log::warn!("Evidence write failed path={} err={}", full_path.display(), err)
                }
            },
            Err(err) => log::warn!(
                "Evidence encode failed path={} err={:#}",
                full_path.display(),
                err
            ),
        }
    }
}

/// Frigate sub-label for an emission; pure formatting.
pub(crate) fn sub_label(extra: &str, score: f64) -> String {
    format!("{extra} conf={score:.2} source=metis")
}

/// Draw overlay for the zone ROI: one normalized green box whose score is an
/// integer percentage.
pub fn draw_payload(roi: &Roi, score: f64) -> DrawPayload {
    DrawPayload {
        boxes: vec![DrawBox {
            rect: [roi.x, roi.y, roi.w, roi.h],
            color: EVIDENCE_GREEN,
            score: (score * 100.0).round() as i64,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_table_has_three_distinct_labels_per_zone() {
        for zone in ["garage", "gate", "latch"] {
            let spec = zone_spec(zone).expect("known zone");
            assert_ne!(spec.open_event, spec.close_event);
            assert_ne!(spec.open_event, spec.left_open_event);
            assert_ne!(spec.close_event, spec.left_open_event);
        }
        assert!(zone_spec("driveway").is_none());
    }

    #[test]
    fn zone_table_uses_domain_labels() {
        assert_eq!(zone_spec("garage").unwrap().open_event, "garage_opened");
        assert_eq!(zone_spec("gate").unwrap().open_event, "gate_ajar");
        assert_eq!(zone_spec("latch").unwrap().close_event, "latch_locked");
    }

    #[test]
    fn sub_label_formats_score_to_two_decimals() {
        assert_eq!(
            sub_label("zone=gate state=open", 0.876),
            "zone=gate state=open conf=0.88 source=metis"
        );
    }

    #[test]
    fn draw_payload_rounds_to_integer_percentage() {
        let roi = Roi { x: 0.1, y: 0.2, w: 0.3, h: 0.4 };
        let draw = draw_payload(&roi, 0.876);
        assert_eq!(draw.boxes.len(), 1);
        assert_eq!(draw.boxes[0].rect, [0.1, 0.2, 0.3, 0.4]);
        assert_eq!(draw.boxes[0].color, [0, 255, 0]);
        assert_eq!(draw.boxes[0].score, 88);
    }
}
