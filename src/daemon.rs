//! Top-level daemon assembly.
//!
//! Spawns the health and metrics servers, the dependency probe, and one
//! sampler plus one worker thread per camera, then parks the main thread.
//! There is no shutdown path; all threads are detached and die with the
//! process.

use anyhow::{Context, Result};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::events::{EventEmitter, EventMedia};
use crate::frigate::FrigateClient;
use crate::health;
use crate::metrics;
use crate::queue::SampleQueue;
use crate::stream;
use crate::worker::DecisionWorker;

pub fn run(config: AppConfig) -> Result<()> {
    let config = Arc::new(config);

    let readiness = health::shared_readiness();
    let _health_server = health::spawn_health_server(config.health_port, readiness.clone())
        .context("start health server")?;
    health::spawn_dependency_probe(config.clone(), readiness);
    let _metrics_server =
        metrics::spawn_metrics_server(config.metrics_port).context("start metrics server")?;

    let frigate = Arc::new(FrigateClient::new(&config.frigate_base_url));
    let emitter = EventEmitter::new(config.clone(), frigate);

    if config.emit_boot_event {
        if let Some(first) = config.cameras.first() {
            let roi = first.rois.get(&config.demo_zone);
            emitter.emit(
                &first.name,
                "safehaven_boot",
                1.0,
                5,
                "source=safehaven-core",
                EventMedia {
                    roi_frame: None,
                    frame: None,
                    roi,
                },
            );
        }
    }

    // Detached threads; the stop flag exists for the sampler loop contract
    // and is never set here.
    let stop = Arc::new(AtomicBool::new(false));
    for camera in &config.cameras {
        let queue = Arc::new(SampleQueue::new(camera.name.clone(), config.queue_max));

        let sampler_camera = camera.clone();
        let sampler_queue = queue.clone();
        let sampler_stop = stop.clone();
        let sample_fps = config.sample_fps;
        std::thread::Builder::new()
            .name(format!("sampler-{}", camera.name))
            .spawn(move || {
                stream::run_sampler(&sampler_camera, sample_fps, &sampler_queue, &sampler_stop);
            })
            .with_context(|| format!("spawn sampler thread for {}", camera.name))?;

        let worker = DecisionWorker::new(
            config.clone(),
            camera.clone(),
            queue,
            emitter.clone(),
        );
        let worker_name = camera.name.clone();
        std::thread::Builder::new()
            .name(format!("worker-{}", camera.name))
            .spawn(move || {
                if let Err(err) = worker.run() {
                    log::error!("worker {} stopped: {:#}", worker_name, err);
                }
            })
            .with_context(|| format!("spawn worker thread for {}", camera.name))?;
    }

    log::info!(
        "safehaven-core started cameras={:?} metrics_port={} health_port={} log_format={:?} pid={}",
        config.cameras.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        config.metrics_port,
        config.health_port,
        config.log_format,
        std::process::id()
    );

    loop {
        std::thread::sleep(Duration::from_secs(1));
    }
}
