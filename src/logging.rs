//! Two append-only JSON-lines log streams: one records every oracle
//! call, the other every minimax iteration event
//! (`stateEvaluation`/`minimaxIter`). Log writes are fire-and-forget —
//! `tracing_appender::non_blocking` hands the write off to a
//! background thread so the search is never blocked on log I/O.
//!
//! Both streams are carried by `tracing` events tagged with a
//! `target` (`"oracle_calls"` or `"minimax_iter"`); this module wires
//! up a `tracing_subscriber` registry with one JSON-formatted layer
//! per target plus a human-readable layer on stdout for everything
//! else.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Must be kept alive for the lifetime of the process — dropping a
/// guard flushes and stops its background writer thread.
pub struct LoggingGuards {
    _oracle: WorkerGuard,
    _minimax: WorkerGuard,
}

/// Initializes the global `tracing` subscriber with the two
/// JSON-lines streams plus a human-readable stdout layer for
/// everything else. Call once, near the top of `main`.
pub fn init(oracle_log_path: &Path, minimax_log_path: &Path) -> anyhow::Result<LoggingGuards> {
    if let Some(parent) = oracle_log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if let Some(parent) = minimax_log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let oracle_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(oracle_log_path)?;
    let minimax_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(minimax_log_path)?;

    let (oracle_writer, oracle_guard) = tracing_appender::non_blocking(oracle_file);
    let (minimax_writer, minimax_guard) = tracing_appender::non_blocking(minimax_file);

    let oracle_layer = fmt::layer()
        .json()
        .with_writer(oracle_writer)
        .with_filter(filter_fn(|meta| meta.target() == "oracle_calls"));

    let minimax_layer = fmt::layer()
        .json()
        .with_writer(minimax_writer)
        .with_filter(filter_fn(|meta| meta.target() == "minimax_iter"));

    let stdout_layer = fmt::layer()
        .with_target(true)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_filter(filter_fn(|meta| {
            meta.target() != "oracle_calls" && meta.target() != "minimax_iter"
        }));

    tracing_subscriber::registry()
        .with(oracle_layer)
        .with(minimax_layer)
        .with(stdout_layer)
        .init();

    Ok(LoggingGuards {
        _oracle: oracle_guard,
        _minimax: minimax_guard,
    })
}
