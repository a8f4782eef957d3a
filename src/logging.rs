//! Log output configuration.
//!
//! The daemon logs through the `log` facade; this module wires up
//! `env_logger` with the configured level and one of two record formats:
//! a plain text line, or one JSON object per record for log shippers.

use log::LevelFilter;
use std::io::Write;
use std::str::FromStr;

use crate::config::LogFormat;

/// Initialize process-wide logging.
///
/// Unknown level names fall back to INFO rather than failing startup.
pub fn init(log_level: &str, log_format: LogFormat) {
    let level = LevelFilter::from_str(log_level.trim()).unwrap_or(LevelFilter::Info);
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    match log_format {
        LogFormat::Text => {
            builder.format(|buf, record| {
                writeln!(
                    buf,
                    "{} {} {} - {}",
                    buf.timestamp_millis(),
                    record.level(),
                    record.target(),
                    record.args()
                )
            });
        }
        LogFormat::Json => {
            builder.format(|buf, record| {
                let thread = std::thread::current();
                let payload = serde_json::json!({
                    "ts": buf.timestamp_millis().to_string(),
                    "level": record.level().to_string(),
                    "logger": record.target(),
                    "msg": record.args().to_string(),
                    "thread": thread.name().unwrap_or("main"),
                });
                writeln!(buf, "{}", payload)
            });
        }
    }
    let _ = builder.try_init();
}
