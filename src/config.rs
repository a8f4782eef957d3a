//! Daemon configuration.
//!
//! Configuration is loaded from a YAML file (path in `SAFEHAVEN_CONFIG`,
//! default `/config/safehaven.yml`; a missing file means "all defaults") and
//! then overridden field-by-field from the environment. The `CAMERAS` and
//! `ZONE_CLASS_MAP` environment variables carry JSON blobs that wholly
//! replace the corresponding YAML sections; partial merging is not supported.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "/config/safehaven.yml";
const DEFAULT_FRIGATE_BASE_URL: &str = "http://frigate:5000";
const DEFAULT_METIS_DETECTOR_URL: &str = "http://metis-detector:8090/detect";
const DEFAULT_SAMPLE_FPS: f64 = 1.0;
const DEFAULT_LEFT_OPEN_MINUTES: u32 = 7;
const DEFAULT_QUEUE_MAX: usize = 50;
const DEFAULT_METRICS_PORT: u16 = 9108;
const DEFAULT_HEALTH_PORT: u16 = 9109;
const DEFAULT_LOG_LEVEL: &str = "INFO";
const DEFAULT_STATE_CONF_THRESHOLD: f64 = 0.5;
const DEFAULT_METIS_TIMEOUT_S: f64 = 2.5;
const DEFAULT_EVIDENCE_DIR: &str = "/tmp/safehaven_evidence";
const DEFAULT_DEMO_ZONE: &str = "latch";

/// A region of interest on a camera frame.
///
/// Values in `0..=1` are normalized to the frame dimensions; larger values
/// are absolute pixels. The interpretation is per component, and out-of-range
/// rectangles are clamped at crop time rather than rejected here.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct Roi {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "full_extent")]
    pub w: f64,
    #[serde(default = "full_extent")]
    pub h: f64,
}

fn full_extent() -> f64 {
    1.0
}

/// One configured camera with its named zone ROIs.
#[derive(Clone, Debug, Deserialize)]
pub struct CameraConfig {
    pub name: String,
    pub stream_url: String,
    #[serde(default)]
    pub rois: BTreeMap<String, Roi>,
}

/// Detector class ids for a zone's open and closed appearance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZoneClassIds {
    pub open: i64,
    pub closed: i64,
}

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(anyhow!(
                "unsupported log format '{}'; expected 'text' or 'json'",
                other
            )),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct AppConfigFile {
    frigate_base_url: Option<String>,
    metis_detector_url: Option<String>,
    mqtt_broker: Option<String>,
    sample_fps: Option<f64>,
    left_open_minutes: Option<u32>,
    queue_max: Option<usize>,
    metrics_port: Option<u16>,
    health_port: Option<u16>,
    log_format: Option<String>,
    log_level: Option<String>,
    state_conf_threshold: Option<f64>,
    metis_timeout_s: Option<f64>,
    debug_state_every: Option<u64>,
    emit_boot_event: Option<bool>,
    evidence_dir: Option<PathBuf>,
    save_event_media: Option<bool>,
    demo_emit_interval_s: Option<u64>,
    demo_zone: Option<String>,
    zone_class_map: Option<serde_json::Value>,
    cameras: Option<serde_json::Value>,
}

/// Validated runtime configuration. Immutable after `load()`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub frigate_base_url: String,
    pub metis_detector_url: String,
    /// Reserved for a future MQTT transport; parsed but unused by the core.
    pub mqtt_broker: Option<String>,
    pub sample_fps: f64,
    pub left_open_minutes: u32,
    pub queue_max: usize,
    pub metrics_port: u16,
    pub health_port: u16,
    pub log_format: LogFormat,
    pub log_level: String,
    pub state_conf_threshold: f64,
    pub metis_timeout_s: f64,
    pub debug_state_every: u64,
    pub emit_boot_event: bool,
    pub evidence_dir: PathBuf,
    pub save_event_media: bool,
    pub demo_emit_interval_s: u64,
    pub demo_zone: String,
    pub zone_class_map: BTreeMap<String, ZoneClassIds>,
    pub cameras: Vec<CameraConfig>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let path = env_var("SAFEHAVEN_CONFIG").unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        let path = Path::new(&path);
        let file_cfg = if path.exists() {
            read_config_file(path)?
        } else {
            AppConfigFile::default()
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AppConfigFile) -> Result<Self> {
        let cameras = match file.cameras {
            Some(raw) => parse_cameras(raw)?,
            None => Vec::new(),
        };
        Ok(Self {
            frigate_base_url: file
                .frigate_base_url
                .unwrap_or_else(|| DEFAULT_FRIGATE_BASE_URL.to_string()),
            metis_detector_url: file
                .metis_detector_url
                .unwrap_or_else(|| DEFAULT_METIS_DETECTOR_URL.to_string()),
            mqtt_broker: file.mqtt_broker,
            sample_fps: file.sample_fps.unwrap_or(DEFAULT_SAMPLE_FPS),
            left_open_minutes: file.left_open_minutes.unwrap_or(DEFAULT_LEFT_OPEN_MINUTES),
            queue_max: file.queue_max.unwrap_or(DEFAULT_QUEUE_MAX),
            metrics_port: file.metrics_port.unwrap_or(DEFAULT_METRICS_PORT),
            health_port: file.health_port.unwrap_or(DEFAULT_HEALTH_PORT),
            log_format: LogFormat::parse(file.log_format.as_deref().unwrap_or("text"))?,
            log_level: file
                .log_level
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            state_conf_threshold: file
                .state_conf_threshold
                .unwrap_or(DEFAULT_STATE_CONF_THRESHOLD),
            metis_timeout_s: file.metis_timeout_s.unwrap_or(DEFAULT_METIS_TIMEOUT_S),
            debug_state_every: file.debug_state_every.unwrap_or(0),
            emit_boot_event: file.emit_boot_event.unwrap_or(false),
            evidence_dir: file
                .evidence_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_EVIDENCE_DIR)),
            save_event_media: file.save_event_media.unwrap_or(true),
            demo_emit_interval_s: file.demo_emit_interval_s.unwrap_or(0),
            demo_zone: file
                .demo_zone
                .unwrap_or_else(|| DEFAULT_DEMO_ZONE.to_string()),
            zone_class_map: parse_zone_class_map(file.zone_class_map),
            cameras,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(url) = env_var("FRIGATE_BASE_URL") {
            self.frigate_base_url = url;
        }
        if let Some(url) = env_var("METIS_DETECTOR_URL") {
            self.metis_detector_url = url;
        }
        if let Some(broker) = env_var("MQTT_BROKER") {
            self.mqtt_broker = Some(broker);
        }
        if let Some(fps) = env_var("SAMPLE_FPS") {
            self.sample_fps = fps
                .parse()
                .map_err(|_| anyhow!("SAMPLE_FPS must be a number"))?;
        }
        if let Some(minutes) = env_var("LEFT_OPEN_MINUTES") {
            self.left_open_minutes = minutes
                .parse()
                .map_err(|_| anyhow!("LEFT_OPEN_MINUTES must be an integer"))?;
        }
        if let Some(max) = env_var("QUEUE_MAX") {
            self.queue_max = max
                .parse()
                .map_err(|_| anyhow!("QUEUE_MAX must be an integer"))?;
        }
        if let Some(port) = env_var("METRICS_PORT") {
            self.metrics_port = port
                .parse()
                .map_err(|_| anyhow!("METRICS_PORT must be a port number"))?;
        }
        if let Some(port) = env_var("HEALTH_PORT") {
            self.health_port = port
                .parse()
                .map_err(|_| anyhow!("HEALTH_PORT must be a port number"))?;
        }
        if let Some(format) = env_var("LOG_FORMAT") {
            self.log_format = LogFormat::parse(&format)?;
        }
        if let Some(level) = env_var("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(threshold) = env_var("STATE_CONF_THRESHOLD") {
            self.state_conf_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("STATE_CONF_THRESHOLD must be a number"))?;
        }
        if let Some(timeout) = env_var("METIS_TIMEOUT_S") {
            self.metis_timeout_s = timeout
                .parse()
                .map_err(|_| anyhow!("METIS_TIMEOUT_S must be a number"))?;
        }
        if let Some(every) = env_var("DEBUG_STATE_EVERY") {
            self.debug_state_every = every
                .parse()
                .map_err(|_| anyhow!("DEBUG_STATE_EVERY must be an integer"))?;
        }
        if let Some(flag) = env_var("EMIT_BOOT_EVENT") {
            self.emit_boot_event = parse_bool_flag(&flag);
        }
        if let Some(dir) = env_var("EVIDENCE_DIR") {
            self.evidence_dir = PathBuf::from(dir);
        }
        if let Some(flag) = env_var("SAVE_EVENT_MEDIA") {
            self.save_event_media = parse_bool_flag(&flag);
        }
        if let Some(interval) = env_var("DEMO_EMIT_INTERVAL_S") {
            self.demo_emit_interval_s = interval
                .parse()
                .map_err(|_| anyhow!("DEMO_EMIT_INTERVAL_S must be an integer"))?;
        }
        if let Some(zone) = env_var("DEMO_ZONE") {
            self.demo_zone = zone;
        }
        if let Some(raw) = env_var("CAMERAS") {
            let value: serde_json::Value =
                serde_json::from_str(&raw).context("CAMERAS env must be a JSON array")?;
            self.cameras = parse_cameras(value)?;
        }
        if let Some(raw) = env_var("ZONE_CLASS_MAP") {
            let value: serde_json::Value =
                serde_json::from_str(&raw).context("ZONE_CLASS_MAP env must be a JSON object")?;
            self.zone_class_map = parse_zone_class_map(Some(value));
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.cameras.is_empty() {
            return Err(anyhow!(
                "no cameras configured; set the CAMERAS env or the cameras list in SAFEHAVEN_CONFIG"
            ));
        }
        let mut names = BTreeSet::new();
        for camera in &self.cameras {
            if camera.name.trim().is_empty() {
                return Err(anyhow!("camera name must not be empty"));
            }
            if camera.stream_url.trim().is_empty() {
                return Err(anyhow!(
                    "camera '{}' has an empty stream_url",
                    camera.name
                ));
            }
            if !names.insert(camera.name.as_str()) {
                return Err(anyhow!("duplicate camera name '{}'", camera.name));
            }
        }
        Ok(())
    }

    /// Left-open alert threshold in seconds.
    pub fn left_open_seconds(&self) -> f64 {
        f64::from(self.left_open_minutes) * 60.0
    }
}

fn read_config_file(path: &Path) -> Result<AppConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    serde_yaml::from_str(&raw)
        .map_err(|e| anyhow!("invalid YAML config file {}: {}", path.display(), e))
}

fn parse_cameras(value: serde_json::Value) -> Result<Vec<CameraConfig>> {
    serde_json::from_value(value).context("invalid cameras section")
}

/// Parse the per-zone detector class-id table.
///
/// Entries that are not mappings or are missing either class id are skipped;
/// an absent or entirely unusable table falls back to the built-in default.
fn parse_zone_class_map(raw: Option<serde_json::Value>) -> BTreeMap<String, ZoneClassIds> {
    let mut out = BTreeMap::new();
    if let Some(serde_json::Value::Object(zones)) = raw {
        for (zone, mapping) in zones {
            let Some(mapping) = mapping.as_object() else {
                continue;
            };
            let open = mapping.get("open").and_then(class_id);
            let closed = mapping.get("closed").and_then(class_id);
            if let (Some(open), Some(closed)) = (open, closed) {
                out.insert(zone, ZoneClassIds { open, closed });
            }
        }
    }
    if out.is_empty() {
        out = default_zone_class_map();
    }
    out
}

fn class_id(value: &serde_json::Value) -> Option<i64> {
    value.as_f64().map(|v| v as i64)
}

pub(crate) fn default_zone_class_map() -> BTreeMap<String, ZoneClassIds> {
    BTreeMap::from([
        ("garage".to_string(), ZoneClassIds { open: 0, closed: 1 }),
        ("gate".to_string(), ZoneClassIds { open: 2, closed: 3 }),
        ("latch".to_string(), ZoneClassIds { open: 4, closed: 5 }),
    ])
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool_flag(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "True")
}
