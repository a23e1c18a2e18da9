use log::{LevelFilter, Log, Metadata, Record};
use std::sync::OnceLock;

use xplay_lib::tools::time::relative_seconds;

struct StderrLogger {
    level: LevelFilter,
    timestamps: bool,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        if self.timestamps {
            eprintln!(
                "[{:>9.3}s] [{}] {}",
                relative_seconds(),
                record.level(),
                record.args()
            );
        } else {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

fn parse_level(value: Option<&str>) -> LevelFilter {
    match value.map(str::to_lowercase).as_deref() {
        Some("off") => LevelFilter::Off,
        Some("error") => LevelFilter::Error,
        Some("warn") => LevelFilter::Warn,
        Some("debug") => LevelFilter::Debug,
        Some("trace") => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Install the stderr logger. Level comes from `RUST_LOG`.
pub fn init() {
    let level = parse_level(std::env::var("RUST_LOG").ok().as_deref());
    let timestamps = std::env::var("XPLAY_LOG_TIMESTAMPS")
        .map(|value| value != "0")
        .unwrap_or(false);

    let logger_ref = LOGGER.get_or_init(|| StderrLogger { level, timestamps });
    if log::set_logger(logger_ref).is_ok() {
        log::set_max_level(level);
    }
}
