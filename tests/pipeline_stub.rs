//! End-to-end pipeline test: stub camera -> sampler -> queue -> worker ->
//! mock Metis -> mock Frigate.
//!
//! The mock detector always reports the garage open class with high
//! confidence, so after three consumed samples the worker must commit an
//! open transition; with a zero left-open threshold the left-open alert
//! follows immediately.

mod common;

use std::collections::BTreeMap;
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use safehaven_core::config::{AppConfig, CameraConfig, LogFormat, Roi, ZoneClassIds};
use safehaven_core::events::EventEmitter;
use safehaven_core::stream;
use safehaven_core::worker::DecisionWorker;
use safehaven_core::{FrigateClient, SampleQueue};

/// Mock Metis: every POST yields one high-confidence garage-open detection.
fn spawn_mock_metis() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind metis");
    let addr = listener.local_addr().expect("addr");
    std::thread::spawn(move || loop {
        let Ok((mut stream, _)) = listener.accept() else {
            break;
        };
        let _request = common::read_request(&mut stream);
        common::respond_json(&mut stream, 200, "[[0, 0.93, 0.05, 0.05, 0.95, 0.95]]");
    });
    format!("http://{addr}/detect")
}

/// Mock Frigate: records created event labels, never returns an event id.
fn spawn_mock_frigate(events: Arc<Mutex<Vec<String>>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind frigate");
    let addr = listener.local_addr().expect("addr");
    std::thread::spawn(move || loop {
        let Ok((mut stream, _)) = listener.accept() else {
            break;
        };
        let request = common::read_request(&mut stream);
        // Path shape: /api/events/{camera}/{label}/create
        if let Some(label) = request.path.split('/').nth(4) {
            events.lock().expect("events lock").push(label.to_string());
        }
        common::respond_json(&mut stream, 200, "{}");
    });
    format!("http://{addr}")
}

fn pipeline_config(metis_url: String, frigate_url: String, evidence_dir: PathBuf) -> AppConfig {
    let camera = CameraConfig {
        name: "front".to_string(),
        stream_url: "stub://64x48".to_string(),
        rois: BTreeMap::from([(
            "garage".to_string(),
            Roi { x: 0.1, y: 0.1, w: 0.8, h: 0.8 },
        )]),
    };
    AppConfig {
        frigate_base_url: frigate_url,
        metis_detector_url: metis_url,
        mqtt_broker: None,
        sample_fps: 50.0,
        left_open_minutes: 0,
        queue_max: 8,
        metrics_port: 0,
        health_port: 0,
        log_format: LogFormat::Text,
        log_level: "INFO".to_string(),
        state_conf_threshold: 0.5,
        metis_timeout_s: 2.0,
        debug_state_every: 0,
        emit_boot_event: false,
        evidence_dir,
        save_event_media: true,
        demo_emit_interval_s: 0,
        demo_zone: "latch".to_string(),
        zone_class_map: BTreeMap::from([(
            "garage".to_string(),
            ZoneClassIds { open: 0, closed: 1 },
        )]),
        cameras: vec![camera],
    }
}

#[test]
fn stub_camera_produces_open_and_left_open_events() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let metis_url = spawn_mock_metis();
    let frigate_url = spawn_mock_frigate(events.clone());
    let evidence = tempfile::tempdir().expect("tempdir");

    let config = Arc::new(pipeline_config(
        metis_url,
        frigate_url,
        evidence.path().to_path_buf(),
    ));
    let camera = config.cameras[0].clone();
    let queue = Arc::new(SampleQueue::new(camera.name.clone(), config.queue_max));

    let stop = Arc::new(AtomicBool::new(false));
    {
        let camera = camera.clone();
        let queue = queue.clone();
        let stop = stop.clone();
        let sample_fps = config.sample_fps;
        std::thread::spawn(move || {
            stream::run_sampler(&camera, sample_fps, &queue, &stop);
        });
    }

    let frigate = Arc::new(FrigateClient::new(&config.frigate_base_url));
    let emitter = EventEmitter::new(config.clone(), frigate);
    let worker = DecisionWorker::new(config.clone(), camera, queue, emitter);
    // The worker blocks on the queue forever; leak the thread.
    std::thread::spawn(move || {
        let _ = worker.run();
    });

    let deadline = Instant::now() + Duration::from_secs(15);
    loop {
        {
            let seen = events.lock().expect("events lock");
            let opened = seen.iter().any(|label| label == "garage_opened");
            let left_open = seen.iter().any(|label| label == "garage_left_open");
            if opened && left_open {
                assert!(
                    !seen.iter().any(|label| label == "garage_closed"),
                    "unexpected close event: {seen:?}"
                );
                break;
            }
        }
        assert!(Instant::now() < deadline, "timed out waiting for events");
        std::thread::sleep(Duration::from_millis(50));
    }
    stop.store(true, Ordering::Relaxed);

    // Local evidence for the open transition was written.
    let open_dir = evidence.path().join("front").join("garage_opened");
    let roi_evidence = std::fs::read_dir(&open_dir)
        .expect("evidence dir")
        .filter_map(|entry| entry.ok())
        .any(|entry| entry.file_name().to_string_lossy().ends_with("_roi.jpg"));
    assert!(roi_evidence, "missing ROI evidence under {open_dir:?}");
}
