//! safehavend - SafeHaven-Core daemon
//!
//! This daemon:
//! 1. Samples frames from the configured camera streams
//! 2. Crops each frame to its zone ROIs and runs remote detection via Metis
//! 3. Debounces per-zone open/closed state and emits Frigate events
//! 4. Saves local evidence media per emitted event
//! 5. Exposes /healthz, /readyz, and Prometheus metrics over HTTP

use anyhow::Result;

fn main() -> Result<()> {
    let config = safehaven_core::AppConfig::load()?;
    safehaven_core::logging::init(&config.log_level, config.log_format);
    safehaven_core::daemon::run(config)
}
