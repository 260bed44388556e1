//! Structured logging: console plus a daily-rotating file, correlated by
//! a per-run UUID.
//!
//! Environment variables:
//! - LOG_FORMAT=pretty|json (default: pretty)
//! - LOG_DIR=/path/to/logs (default: ./logs)
//! - RUN_ID=<uuid> (default: auto-generated)
//! - RUST_LOG=filter (default: info)

use std::io;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Initialize logging. The returned guard must be held for the program's
/// lifetime so the non-blocking file writer flushes on exit.
pub fn init_logging() -> WorkerGuard {
    let format = LogFormat::from_env();
    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string());

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("failed to create log directory {log_dir}: {e}");
    }
    let file_appender = tracing_appender::rolling::daily(&log_dir, "xarb.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,xarb=info"))
    };

    match format {
        LogFormat::Pretty => {
            let console_layer = fmt::layer()
                .with_writer(io::stdout)
                .with_target(false)
                .with_ansi(true)
                .with_filter(env_filter());
            let file_layer = fmt::layer()
                .with_writer(non_blocking_file)
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .compact()
                .with_filter(env_filter());
            tracing_subscriber::registry()
                .with(console_layer)
                .with(file_layer)
                .init();
        }
        LogFormat::Json => {
            let console_layer = fmt::layer()
                .with_writer(io::stdout)
                .with_ansi(false)
                .json()
                .flatten_event(true)
                .with_filter(env_filter());
            let file_layer = fmt::layer()
                .with_writer(non_blocking_file)
                .with_ansi(false)
                .json()
                .flatten_event(true)
                .with_filter(env_filter());
            tracing_subscriber::registry()
                .with(console_layer)
                .with(file_layer)
                .init();
        }
    }

    tracing::info!(
        run_id = %get_run_id(),
        format = ?format,
        log_dir = %log_dir,
        "logging initialized"
    );
    guard
}

/// Run correlation id: RUN_ID from the environment, or a fresh UUID.
pub fn get_run_id() -> Uuid {
    std::env::var("RUN_ID")
        .ok()
        .and_then(|s| Uuid::parse_str(&s).ok())
        .unwrap_or_else(Uuid::new_v4)
}
