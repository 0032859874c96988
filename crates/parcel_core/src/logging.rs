//! Process-wide logging for the parcel tracker.
//!
//! # Responsibility
//! - Start the rolling file logger at most once per process.
//! - Keep log lines as `event=... module=... status=...` key/value records.
//!
//! # Invariants
//! - Initialization never panics.
//! - A second call must match the active level and directory, otherwise it is
//!   rejected instead of silently reconfiguring.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

const PARCEL_LOG_BASENAME: &str = "parcel";
const ROTATE_AT_BYTES: u64 = 4 * 1024 * 1024;
const KEEP_ROTATED_FILES: usize = 3;
const PANIC_PAYLOAD_LIMIT: usize = 160;

/// Accepted spellings and the level each one selects.
const LEVEL_NAMES: &[(&str, &str)] = &[
    ("trace", "trace"),
    ("debug", "debug"),
    ("info", "info"),
    ("warn", "warn"),
    ("warning", "warn"),
    ("error", "error"),
];

static LOGGING: OnceCell<ActiveLogging> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

struct ActiveLogging {
    level: &'static str,
    log_dir: PathBuf,
    _handle: LoggerHandle,
}

impl ActiveLogging {
    fn ensure_matches(&self, level: &str, log_dir: &Path) -> Result<(), String> {
        if self.log_dir == log_dir && self.level == level {
            return Ok(());
        }
        Err(format!(
            "parcel logging is already active ({} in `{}`); cannot restart as {level} in `{}`",
            self.level,
            self.log_dir.display(),
            log_dir.display()
        ))
    }
}

/// Starts file logging at `level` under `log_dir`.
///
/// A relative `log_dir` is resolved against the current working directory.
///
/// # Errors
/// - Unknown level, or an empty directory.
/// - The directory cannot be created or the logger backend fails to start.
/// - Logging is already active with a different level or directory.
pub fn init_logging(level: &str, log_dir: impl AsRef<Path>) -> Result<(), String> {
    let level = normalize_level(level)?;
    let log_dir = normalize_log_dir(log_dir.as_ref())?;

    if let Some(active) = LOGGING.get() {
        return active.ensure_matches(level, &log_dir);
    }

    let active = LOGGING.get_or_try_init(|| start_logger(level, log_dir.clone()))?;
    active.ensure_matches(level, &log_dir)
}

/// Active `(level, log_dir)`, or `None` before `init_logging` succeeded.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    LOGGING
        .get()
        .map(|active| (active.level, active.log_dir.clone()))
}

/// `debug` for debug builds, `info` for release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start_logger(level: &'static str, log_dir: PathBuf) -> Result<ActiveLogging, String> {
    std::fs::create_dir_all(&log_dir)
        .map_err(|err| format!("cannot create parcel log dir `{}`: {err}", log_dir.display()))?;

    let files = FileSpec::default()
        .directory(log_dir.as_path())
        .basename(PARCEL_LOG_BASENAME)
        .suppress_timestamp();
    let handle = Logger::try_with_str(level)
        .map_err(|err| format!("log spec `{level}` rejected: {err}"))?
        .log_to_file(files)
        .append()
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Timestamps,
            Cleanup::KeepLogFiles(KEEP_ROTATED_FILES),
        )
        .format_for_files(flexi_logger::detailed_format)
        .write_mode(WriteMode::BufferAndFlush)
        .start()
        .map_err(|err| format!("parcel logger did not start: {err}"))?;

    install_panic_hook_once();
    info!(
        "event=logging_init module=logging status=ok level={level} log_dir={} version={}",
        log_dir.display(),
        env!("CARGO_PKG_VERSION")
    );

    Ok(ActiveLogging {
        level,
        log_dir,
        _handle: handle,
    })
}

fn normalize_level(level: &str) -> Result<&'static str, String> {
    let wanted = level.trim();
    LEVEL_NAMES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
        .map(|(_, level)| *level)
        .ok_or_else(|| {
            format!("`{wanted}` is not a parcel log level (trace, debug, info, warn, error)")
        })
}

fn normalize_log_dir(log_dir: &Path) -> Result<PathBuf, String> {
    if log_dir.as_os_str().is_empty() {
        return Err("parcel log dir is empty".to_string());
    }
    if log_dir.is_absolute() {
        return Ok(log_dir.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(log_dir))
        .map_err(|err| format!("cannot resolve parcel log dir `{}`: {err}", log_dir.display()))
}

fn install_panic_hook_once() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        // Payload text may come from user input; flatten and cap it.
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = if let Some(message) = info.payload().downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = info.payload().downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        };
        error!(
            "event=panic_captured module=logging status=error location={location} payload={}",
            sanitize_message(&payload, PANIC_PAYLOAD_LIMIT)
        );
        previous(info);
    }));
}

fn sanitize_message(value: &str, max_chars: usize) -> String {
    let flat = value.replace(['\n', '\r'], " ");
    let mut out: String = flat.chars().take(max_chars).collect();
    if flat.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}
