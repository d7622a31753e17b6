//! Stderr logger for hosts without their own `log` backend.
//!
//! Lines read `[elapsed LEVEL tag] message`. Records from the `marker_calib`
//! crates are tagged with their last module segment (`hybrid`, `pose`, ...)
//! and honour the configured level; records from any other crate are only
//! shown at `Warn` or above, tagged with their full target.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

const OWN_PREFIX: &str = "marker_calib";

fn is_own(target: &str) -> bool {
    target.starts_with(OWN_PREFIX)
}

/// Short tag for `target`.
fn tag(target: &str) -> &str {
    if is_own(target) {
        target.rsplit("::").next().unwrap_or(target)
    } else {
        target
    }
}

fn passes(filter: LevelFilter, level: Level, target: &str) -> bool {
    let limit = if is_own(target) {
        filter
    } else {
        filter.min(LevelFilter::Warn)
    };
    level <= limit
}

struct TaggedStderrLogger {
    level: LevelFilter,
    started: Instant,
}

impl Log for TaggedStderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        passes(self.level, metadata.level(), metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "[{:8.3}s {:>5} {}] {}",
            self.started.elapsed().as_secs_f64(),
            record.level(),
            tag(record.target()),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<TaggedStderrLogger> = OnceLock::new();

/// Install the stderr logger with the given level filter.
///
/// Only the first call installs anything; later calls return `Ok(())`.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let logger = LOGGER.get_or_init(|| TaggedStderrLogger {
        level,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// Install a `tracing` subscriber filtered by `RUST_LOG` (default `info`).
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE);
    if json {
        let _ = builder.json().flatten_event(true).finish().try_init();
    } else {
        let _ = builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init();
    }
}
