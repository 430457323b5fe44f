use std::fs::{self, OpenOptions};
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_LOG_DIR: &str = "logs";
const LOG_FILE: &str = "prono_desk.log";

/// File-only logging: the terminal belongs to the UI. Returns `None` (and logs
/// nothing) when the directory is not writable. Keep the guard alive for the
/// whole run or buffered lines are lost.
pub fn init_file_logging() -> Option<WorkerGuard> {
    let log_dir = std::env::var("PRONO_LOG_DIR").unwrap_or_else(|_| DEFAULT_LOG_DIR.to_string());

    // `rolling::daily` panics when it cannot create its first file.
    if !dir_is_writable(Path::new(&log_dir)) {
        return None;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,prono_desk=debug"));
    let appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let init = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .try_init();
    init.ok().map(|_| guard)
}

fn dir_is_writable(dir: &Path) -> bool {
    if fs::create_dir_all(dir).is_err() {
        return false;
    }
    let probe = dir.join(".prono_write_test");
    let ok = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&probe)
        .is_ok();
    let _ = fs::remove_file(&probe);
    ok
}
