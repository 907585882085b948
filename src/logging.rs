//! Logging Module
//!
//! Structured logging with file output for diagnostics.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, EnvFilter, prelude::*};
use std::path::{Path, PathBuf};

/// Initialize logging with console and file output.
///
/// Keep the returned guard alive for the life of the process so buffered
/// file output is flushed.
pub fn init(data_dir: Option<&Path>) -> WorkerGuard {
    let log_dir = get_log_directory(data_dir);

    // Ensure log directory exists
    let _ = std::fs::create_dir_all(&log_dir);

    // Daily rotation
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "hzn-courier.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(file_writer);

    // Console output in debug builds only, on stderr so command output stays clean
    #[cfg(debug_assertions)]
    let console_layer = Some(
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .pretty(),
    );

    #[cfg(not(debug_assertions))]
    let console_layer: Option<fmt::Layer<_>> = None;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        #[cfg(debug_assertions)]
        { EnvFilter::new("debug,hyper=warn,reqwest=warn") }
        #[cfg(not(debug_assertions))]
        { EnvFilter::new("info,hyper=warn,reqwest=warn") }
    });

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer);

    let _ = tracing::subscriber::set_global_default(subscriber);
    guard
}

fn get_log_directory(data_dir: Option<&Path>) -> PathBuf {
    match data_dir {
        Some(dir) => dir.join("logs"),
        None => dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("HznCourier")
            .join("logs"),
    }
}
