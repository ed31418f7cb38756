//! Logger module
//!
//! Provides logging utilities for the HTTP server including:
//! - Diagnostic logging through `tracing`, to stderr or a file
//! - Access logging with multiple formats
//! - Server lifecycle and upload outcome logging

mod format;
pub mod writer;

pub use format::{AccessLogEntry, AccessLogFormat};

use std::io;
use std::net::SocketAddr;
use std::sync::Mutex;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::upload::{human_bytes, SavedUpload, UploadError};

/// Initialize logging with configuration
///
/// `RUST_LOG` takes precedence over `logging.level`. Should be called once
/// at application startup.
pub fn init(config: &Config) -> io::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let (make_writer, ansi) = match config.logging.error_log_file {
        Some(ref path) => (
            BoxMakeWriter::new(Mutex::new(writer::open_log_file(path)?)),
            false,
        ),
        None => (BoxMakeWriter::new(io::stderr), true),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(make_writer)
                .with_ansi(ansi),
        )
        .try_init()
        .map_err(io::Error::other)?;

    writer::init(config.logging.access_log_file.as_deref())
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    tracing::info!("Listening on: http://{addr}");
    tracing::info!(
        "Serving {} at {}",
        config.storage.root,
        config.storage.prefix
    );
    tracing::info!(
        "Upload field `{}`, limit {}, in-memory up to {}",
        config.upload.field_name,
        human_bytes(config.upload.max_size),
        human_bytes(config.upload.max_memory as u64)
    );
    if let Some(workers) = config.server.workers {
        tracing::info!("Worker threads: {workers}");
    }
    if let Some(ref path) = config.logging.access_log_file {
        tracing::info!("Access log: {path}");
    }
    if let Some(ref path) = config.logging.error_log_file {
        tracing::info!("Error log: {path}");
    }
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    tracing::error!("Failed to serve connection: {err:?}");
}

pub fn log_error(message: &str) {
    tracing::error!("{message}");
}

pub fn log_warning(message: &str) {
    tracing::warn!("{message}");
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &AccessLogFormat) {
    writer::write_access(&entry.format(format));
}

/// Log the outcome of one upload: client mistakes at warn, server faults at error
pub fn log_upload(result: &Result<SavedUpload, UploadError>) {
    match result {
        Ok(saved) => tracing::info!(
            "Stored {} ({}) at {}",
            saved.filename,
            human_bytes(saved.size),
            saved.path.display()
        ),
        Err(e) if e.status_code().is_server_error() => tracing::error!("Upload failed: {e}"),
        Err(e) => tracing::warn!("Upload rejected: {e}"),
    }
}
