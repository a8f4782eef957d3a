//! SafeHaven-Core
//!
//! This crate implements a per-camera semantic-state surveillance daemon.
//!
//! # Architecture
//!
//! Each configured camera runs a two-stage pipeline connected by a bounded
//! latest-frame queue:
//!
//! 1. **Sampler**: reads frames from the camera stream at a target rate,
//!    reconnecting with exponential backoff on transport failures, and
//!    enqueues `(frame, captured_ts)` samples. When the queue is full the
//!    oldest samples are evicted so the worker always sees fresh frames.
//! 2. **Worker**: drains the queue; for each configured zone ROI it crops the
//!    frame, submits the crop to the external Metis detector, reduces the
//!    detections to an `open`/`closed`/`unknown` observation, and feeds a
//!    debounced per-zone state machine. Committed transitions and one-shot
//!    left-open conditions become Frigate events with local evidence media.
//!
//! Alongside the pipelines run a dependency probe (Frigate + Metis health),
//! an HTTP health surface (`/healthz`, `/readyz`) and a Prometheus metrics
//! endpoint.
//!
//! # Module Structure
//!
//! - `config`: YAML + env configuration (`AppConfig`)
//! - `stream`: stream transports and the sampling loop
//! - `queue`: bounded latest-frame queue
//! - `frame`: RGB frame buffer, ROI cropping, JPEG codec, evidence drawing
//! - `metis`: detector client and state reduction
//! - `state`: debounced per-zone state machine
//! - `frigate`: Frigate event API client
//! - `events`: zone event table and the event emitter / evidence writer
//! - `worker`: per-camera inference-and-decision loop
//! - `health`: readiness state, dependency probe, health endpoints
//! - `metrics`: Prometheus metrics and exposition server
//! - `daemon`: top-level run loop

use std::time::{SystemTime, UNIX_EPOCH};

pub mod config;
pub mod daemon;
pub mod events;
pub mod frame;
pub mod frigate;
pub mod health;
pub mod httpd;
pub mod logging;
pub mod metis;
pub mod metrics;
pub mod queue;
pub mod state;
pub mod stream;
pub mod worker;

pub use config::{AppConfig, CameraConfig, LogFormat, Roi, ZoneClassIds};
pub use events::{zone_spec, EventEmitter, EventMedia, ZoneSpec};
pub use frame::{crop_roi, Frame, Sample};
pub use frigate::FrigateClient;
pub use health::{shared_readiness, ReadinessState};
pub use metis::{reduce_detections, Detection, MetisClient};
pub use queue::SampleQueue;
pub use state::{DebouncedStateMachine, StateOutput, ZoneState};

/// Current wall-clock time as fractional seconds since the Unix epoch.
///
/// Sample timestamps and state-machine timestamps use this representation so
/// end-to-end latency is a plain subtraction.
pub fn unix_now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
